use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::error::BridgeResult;

/// Print the startup banner.
pub fn print() -> BridgeResult<()> {
    let mut out = StandardStream::stdout(ColorChoice::Auto);

    let lines = [
        ("█▀▄▀█▀▄▀█", String::new()),
        (
            "█▄▀▄█▄▀▄█",
            format!("  rwfc-bridge v{}", env!("CARGO_PKG_VERSION")),
        ),
        (
            "█▀▄▀█▀▄▀█",
            "  RetroWFC session sensors for Home Assistant".to_string(),
        ),
    ];

    for (flag, text) in &lines {
        out.set_color(ColorSpec::new().set_fg(Some(Color::White)).set_bold(true))?;
        write!(out, " {flag}")?;
        out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        writeln!(out, "{text}")?;
    }

    out.reset()?;
    writeln!(out)?;

    Ok(())
}
