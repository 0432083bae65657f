#[cfg(feature = "server-banner")]
pub mod banner;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::backend::rwfc::{RwfcClient, RwfcPoller};
use crate::config::AppConfig;
use crate::error::BridgeResult;
use crate::platform::{EntryHandle, Platform};
use crate::sink::{HassSink, LogSink, SensorReport, SinkSet, StateSink};
use crate::snapshot::SnapshotStore;

/// A fully assembled bridge: the platform with its shared poller slot
/// and one live handle per configured entry.
///
/// Dropping it tears every entry down and stops the poll loop.
pub struct Bridge {
    platform: Platform,
    entries: Vec<EntryHandle>,
}

impl Bridge {
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn platform(&self) -> &Platform {
        &self.platform
    }
}

/// Wire config -> sinks -> platform -> entries.
///
/// Must be called from within the tokio runtime; every entry spawns its
/// update task here and the first entry starts the shared poller.
pub fn build(config: &AppConfig) -> BridgeResult<Bridge> {
    let source = Arc::new(RwfcClient::new()?);
    let sink = build_sink(config)?;
    let platform = Platform::new(source, sink);

    let mut entries = Vec::new();
    for (entry_id, entry) in &config.entries {
        let handle = platform.setup_entry(entry_id, entry)?;
        log::info!("Entry [{entry_id}] ready: {}", handle.title());
        entries.push(handle);
    }

    Ok(Bridge { platform, entries })
}

fn build_sink(config: &AppConfig) -> BridgeResult<Arc<dyn StateSink>> {
    let mut sinks: Vec<Arc<dyn StateSink>> = Vec::new();
    for (name, server) in &config.hass.servers {
        log::info!("Pushing sensor states to Home Assistant [{name}] at {}", server.url);
        sinks.push(Arc::new(HassSink::new(name, server)?));
    }

    match sinks.len() {
        0 => Ok(Arc::new(LogSink)),
        1 => Ok(sinks.remove(0)),
        _ => Ok(Arc::new(SinkSet::new(sinks))),
    }
}

/// One-shot mode: poll the session list a single time, print every
/// derived sensor state as a JSON line, then the poll status, and exit.
pub async fn run_once(config: &AppConfig) -> BridgeResult<()> {
    let client = Arc::new(RwfcClient::new()?);
    let store = Arc::new(SnapshotStore::new());
    let poller = RwfcPoller::new(client, store.clone());

    poller.refresh().await?;

    let snapshot = store.current().await;
    let mut registered_groups = BTreeSet::new();

    for entry in config.entries.values() {
        for sensor in Platform::build_entry_sensors(entry, &mut registered_groups) {
            let report = SensorReport::compute(&sensor, snapshot.as_deref());
            println!("{}", serde_json::to_string(&report)?);
        }
    }

    println!("{}", serde_json::to_string(&store.status().await)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_accepts_an_empty_config() {
        let bridge = build(&AppConfig::default()).unwrap();

        assert_eq!(bridge.entry_count(), 0);
        // no entry acquired the poller, so none is running
        assert!(bridge.platform().store().is_none());
    }
}
