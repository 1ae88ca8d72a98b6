//! # Agent Runtime Library
//!
//! Process-level pieces of the runtime, exposed for the binary and for
//! integration tests.
//!
//! - `cli` - command line surface
//! - `worker` - one agent endpoint in the current process
//! - `supervisor` - one worker process per endpoint, with combined lifecycle
//! - `signal` - interrupt observation (Ctrl+C, SIGTERM)
//!
//! ```text
//!                  agent-runtime (supervisor)
//!                 ┌────────────┴────────────┐
//!                 ▼                         ▼
//!   agent-runtime calculator      agent-runtime factor
//!      --port 9000 --supervised      --port 9001 --supervised
//!                 │                         │
//!        AGENT_READY 0.0.0.0:9000   AGENT_READY 0.0.0.0:9001
//! ```

#![allow(missing_docs)]
#![allow(clippy::type_complexity)]
#![deny(unsafe_code)]

pub mod cli;
pub mod signal;
pub mod supervisor;
pub mod worker;

pub use cli::{AgentArgs, Cli, Command};
pub use supervisor::{
    run_from_env, EndpointDescriptor, ProcessSupervisor, RestartPolicy, SupervisorConfig,
    SupervisorError, SupervisorStatus, WorkerExit, WorkerInfo,
};
pub use worker::{run_worker, WorkerOptions, READY_PREFIX};

/// Process exit codes.
pub mod exit {
    /// Clean shutdown.
    pub const SUCCESS: i32 = 0;
    /// A worker failed or had to be force-killed.
    pub const FAILURE: i32 = 1;
    /// Invalid configuration or the listener could not be bound.
    pub const CONFIG: i32 = 2;
    /// In-flight requests outlived the shutdown grace period.
    pub const SHUTDOWN_TIMEOUT: i32 = 3;
}
