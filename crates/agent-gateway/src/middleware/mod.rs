//! Middleware stack for an agent endpoint.
//!
//! Layer order: Request → Tracing → Auth → BodyLimit → Timeout → Handler
//!
//! The timeout only wraps the protected routes and is absent unless a
//! request timeout is configured.

pub mod auth;
pub mod timeout;
pub mod tracing;

pub use auth::{constant_time_compare, AuthConfig, AuthLayer, AuthRejection};
pub use timeout::TimeoutLayer;
pub use tracing::TracingLayer;
