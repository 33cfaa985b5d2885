//! Structured Logging Setup
//!
//! Builds the `tracing` subscriber used by the CLI. `RUST_LOG` refines the
//! configured default level.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber
///
/// `verbose` forces DEBUG as the default level regardless of configuration.
pub fn init(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow!("Failed to parse log level: {}", e))?
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match logging.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };
    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}
