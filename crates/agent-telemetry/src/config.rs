//! Telemetry configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::TelemetryError;

/// Output format for log lines written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, ANSI coloured when attached to a terminal.
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::Config(format!(
                "unknown log format '{}', expected 'pretty' or 'json'",
                other
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Configuration for process-wide logging.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Log filter directive (trace, debug, info, warn, error or a full EnvFilter string)
    pub log_level: String,

    /// Line format
    pub format: LogFormat,

    /// Include thread ids in each line
    pub thread_ids: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "agent-runtime".to_string(),
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
            thread_ids: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AGENT_LOG` or `RUST_LOG`: Log filter (default: info)
    /// - `AGENT_LOG_FORMAT`: `pretty` or `json` (default: pretty)
    pub fn from_env(service_name: &str) -> Result<Self, TelemetryError> {
        let format = match env::var("AGENT_LOG_FORMAT") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => LogFormat::default(),
        };

        Ok(Self {
            service_name: service_name.to_string(),
            log_level: env::var("AGENT_LOG")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            format,
            thread_ids: true,
        })
    }
}
