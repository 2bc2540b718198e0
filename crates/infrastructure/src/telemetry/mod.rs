//! Tracing subscriber setup
//!
//! Installs a global `tracing` subscriber with an `EnvFilter` and a `fmt`
//! layer in text or JSON form. `RUST_LOG` overrides the configured filter.

use thiserror::Error;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, TelemetryConfig};

/// Error type for telemetry initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber is already installed
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}

/// The active filter: `RUST_LOG` if set, otherwise the configured one
pub fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
}

/// Install the global tracing subscriber
///
/// # Errors
///
/// Returns `TelemetryError::Init` if a global subscriber already exists.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    match config.format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(config.with_file)
                    .with_line_number(config.with_file),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_file(config.with_file)
                    .with_line_number(config.with_file),
            )
            .try_init(),
    }
    .map_err(|e| TelemetryError::Init(e.to_string()))?;

    info!(format = ?config.format, filter = %config.log_filter, "Tracing initialized");
    Ok(())
}
