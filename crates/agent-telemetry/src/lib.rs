//! # Agent Telemetry
//!
//! Structured logging for the agent runtime binaries.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env("calculator-agent")?;
//! init_logging(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AGENT_LOG` / `RUST_LOG` | `info` | Log level filter |
//! | `AGENT_LOG_FORMAT` | `pretty` | `pretty` or `json` |

#![warn(clippy::all)]
#![deny(unsafe_code)]

mod config;
mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::init_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid telemetry configuration: {0}")]
    Config(String),

    #[error("Failed to install log subscriber: {0}")]
    Init(String),
}

/// Install logging from the environment for `service_name`.
pub fn init_from_env(service_name: &str) -> Result<(), TelemetryError> {
    let config = TelemetryConfig::from_env(service_name)?;
    init_logging(&config)
}
