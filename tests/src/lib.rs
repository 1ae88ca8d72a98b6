//! # Agent Runtime Test Suite
//!
//! Cross-crate flows: the gateway serving the built-in agents over real
//! sockets.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs      # Running endpoints + call-counting handler
//!     ├── agent_flows.rs   # message/send through the calculator and factor agents
//!     └── auth_flows.rs    # Bearer credential and discovery behaviour
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p agent-tests
//! cargo test -p agent-tests integration::auth_flows
//! ```

pub mod integration;
