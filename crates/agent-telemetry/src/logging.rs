//! Subscriber installation.
//!
//! Everything is written to stderr. Stdout belongs to the worker readiness
//! protocol and must stay free of log output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{LogFormat, TelemetryConfig, TelemetryError};

/// Install the global subscriber described by `config`.
///
/// Fails if the filter directive is invalid or a global subscriber was
/// already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(config.thread_ids),
            )
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))?,
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(config.thread_ids),
            )
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))?,
    }

    tracing::debug!(
        service = %config.service_name,
        format = %config.format,
        "Logging initialized"
    );

    Ok(())
}
