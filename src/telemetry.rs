//! Logging bootstrap for pingsink binaries.

use crate::{Error, Result};

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Install the global `tracing` subscriber.
///
/// `json` switches to one JSON object per event, for log shippers.
pub fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = parse_log_level(log_level)?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed
        .map_err(|e| Error::Config(format!("failed to initialize tracing subscriber: {e}")))?;

    info!(level = %level, json, "Tracing initialized");
    Ok(())
}

pub fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(Error::Config(format!(
            "invalid log level '{other}', expected one of [trace, debug, info, warn, error]"
        ))),
    }
}
