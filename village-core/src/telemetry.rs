//! Log subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::GeneralConfig;
use crate::error::{Result, VillageError};

fn configured_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| VillageError::Config(format!("invalid log level '{level}': {e}")))
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`. With
/// `config.json_logs` set, events are written as JSON lines.
///
/// # Errors
///
/// Returns [`VillageError::Config`] if the level cannot be parsed or a
/// global subscriber is already installed.
pub fn init(config: &GeneralConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => configured_filter(&config.log_level)?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| VillageError::Config(format!("failed to install log subscriber: {e}")))
}
