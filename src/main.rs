use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use tokio::signal;
use tokio::signal::unix::SignalKind;

use rwfc_bridge::backend::rwfc::SCAN_INTERVAL;
use rwfc_bridge::config;
use rwfc_bridge::error::BridgeResult;
use rwfc_bridge::server;

#[derive(Debug, Parser)]
#[command(version, about = "RetroWFC session sensors for Home Assistant")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: Utf8PathBuf,

    /// Poll once, print every derived sensor state as JSON and exit
    #[arg(long)]
    oneshot: bool,
}

/*
 * Formatter function to output in syslog format. This makes sense when running
 * as a service (where output might go to a log file, or the system journal)
 */
#[allow(clippy::match_same_arms)]
fn syslog_format(
    buf: &mut pretty_env_logger::env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "<{}>{}: {}",
        match record.level() {
            log::Level::Error => 3,
            log::Level::Warn => 4,
            log::Level::Info => 6,
            log::Level::Debug => 7,
            log::Level::Trace => 7,
        },
        record.target(),
        record.args()
    )
}

fn init_logging() -> BridgeResult<()> {
    /* Try to provide reasonable default filters, when RUST_LOG is not specified */
    const DEFAULT_LOG_FILTERS: &[&str] = &[
        "debug",
        "hyper=info",
        "hyper_util=info",
        "reqwest=info",
    ];

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTERS.join(","));

    /* Detect if we need syslog or human-readable formatting */
    if std::env::var("SYSTEMD_EXEC_PID").is_ok_and(|pid| pid == std::process::id().to_string()) {
        Ok(pretty_env_logger::env_logger::builder()
            .format(syslog_format)
            .parse_filters(&log_filters)
            .try_init()?)
    } else {
        Ok(pretty_env_logger::formatted_timed_builder()
            .parse_filters(&log_filters)
            .try_init()?)
    }
}

async fn wait_for_shutdown() -> BridgeResult<()> {
    let mut term = signal::unix::signal(SignalKind::terminate())?;

    tokio::select! {
        _ = signal::ctrl_c() => log::warn!("Ctrl-C pressed, exiting.."),
        _ = term.recv() => log::warn!("SIGTERM received, exiting.."),
    }
    let _ = std::io::stderr().flush();

    Ok(())
}

async fn run() -> BridgeResult<()> {
    init_logging()?;

    let args = Args::parse();

    #[cfg(feature = "server-banner")]
    server::banner::print()?;

    let config = config::parse(&args.config)?;
    log::debug!("Configuration loaded successfully");

    config.validate_entries()?;

    if args.oneshot {
        return server::run_once(&config).await;
    }

    if !config.has_sinks() {
        log::warn!("{}", "-".repeat(80));
        log::warn!("No Home Assistant servers configured in config!");
        log::warn!("The bridge will run, but sensor states only go to the log.");
        log::warn!("");
        log::warn!(" ** Please configure a hass server to push states somewhere **");
        log::warn!("{}", "-".repeat(80));
    }

    if config.entries.is_empty() {
        log::warn!("No entries configured, nothing to poll.");
    }

    let bridge = server::build(&config)?;
    log::info!(
        "{} entries up, polling every {}s",
        bridge.entry_count(),
        SCAN_INTERVAL.as_secs()
    );

    wait_for_shutdown().await?;

    drop(bridge);
    log::info!("Shutdown complete");

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        log::error!("rwfc-bridge error: {err}");
        log::error!("Fatal error encountered, cannot continue.");
    }
}
