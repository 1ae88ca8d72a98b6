//! Domain types for the agent gateway.
//!
//! Configuration, error taxonomy and the wire types of the message route.

pub mod config;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use config::{
    AgentConfig, ApiPassword, BindHost, ConfigError, HttpConfig, LimitsConfig, TimeoutConfig,
};
pub use error::{codes, ApiError, ApiResult, GatewayError};
pub use types::*;
