// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Agent Gateway - authenticated A2A endpoint for a single agent.
//!
//! Wraps an opaque [`AgentHandler`] in an HTTP listener that publishes the
//! agent card and accepts JSON-RPC `message/send` calls behind a bearer
//! token.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     AGENT ENDPOINT                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │   GET /.well-known/agent-card.json     POST /   GET /health  │
//! │              │                            │          │       │
//! │              │                  ┌─────────┴──────────┴────┐  │
//! │              │                  │  Tracing → Auth →       │  │
//! │              │                  │  BodyLimit → Timeout    │  │
//! │              │                  └─────────┬───────────────┘  │
//! │              │                            │                  │
//! │              │                  ┌─────────┴───────────────┐  │
//! │              │                  │   Envelope validation   │  │
//! │              │                  └─────────┬───────────────┘  │
//! │              ▼                            ▼                  │
//! │        AgentCard (static)        dyn AgentHandler::handle    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The card route skips authentication (tracing still applies). Every other
//! path requires `Authorization: Bearer <API_PASSWORD>`; with no password
//! configured all of them answer 401.
//!
//! # Usage
//!
//! ```ignore
//! use agent_gateway::{AgentConfig, AgentEndpoint};
//!
//! let config = AgentConfig::from_env(9000)?;
//! let endpoint = AgentEndpoint::new(config, handler)?;
//! let listener = endpoint.bind().await?;
//! endpoint.serve(listener, shutdown_signal()).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod middleware;
pub mod ports;
pub mod service;

// Re-exports for public API
pub use domain::config::{AgentConfig, ApiPassword, BindHost, ConfigError};
pub use domain::error::{codes, ApiError, ApiResult, GatewayError};
pub use domain::types::*;
pub use ports::AgentHandler;
pub use service::{AgentEndpoint, AGENT_CARD_PATH};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
