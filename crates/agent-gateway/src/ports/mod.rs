//! Ports (hexagonal architecture).
//!
//! The gateway depends only on these traits; agents implement them.

pub mod handler;

pub use handler::AgentHandler;
