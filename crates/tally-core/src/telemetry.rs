//! Tracing subscriber installation.
//!
//! Libraries in this workspace only emit `tracing` events; applications
//! embedding the store call [`init`] once at startup to print them.
//! `RUST_LOG`, when set, takes precedence over the configured level.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::TallyError;

/// Install a global `fmt` subscriber configured by `config`.
///
/// # Errors
///
/// Returns [`TallyError::Telemetry`] if the level is not a valid filter
/// directive or a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), TallyError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| TallyError::Telemetry {
            message: format!("invalid log level {:?}: {e}", config.level),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| TallyError::Telemetry {
        message: e.to_string(),
    })
}
