//! Single agent endpoint running in the current process.

use agent_gateway::{AgentConfig, AgentEndpoint, GatewayError};
use builtin_agents::AgentKind;
use std::net::SocketAddr;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};

use crate::exit;
use crate::signal::shutdown_signal;

/// Line printed on stdout once a supervised worker accepts connections.
pub const READY_PREFIX: &str = "AGENT_READY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOptions {
    pub kind: AgentKind,
    /// Overrides the kind's default port
    pub port: Option<u16>,
    pub supervised: bool,
}

/// `AGENT_READY <addr>`
pub fn ready_line(addr: SocketAddr) -> String {
    format!("{} {}", READY_PREFIX, addr)
}

/// Parse a readiness line written by [`ready_line`].
pub fn parse_ready_line(line: &str) -> Option<SocketAddr> {
    line.strip_prefix(READY_PREFIX)?.trim().parse().ok()
}

/// Run one endpoint until shutdown and return the process exit code.
pub async fn run_worker(options: WorkerOptions) -> i32 {
    let kind = options.kind;

    let mut config = match AgentConfig::from_env(kind.default_port()) {
        Ok(config) => config,
        Err(e) => {
            error!(agent = %kind, error = %e, "Invalid configuration");
            return exit::CONFIG;
        }
    };
    if let Some(port) = options.port {
        config.http.port = port;
    }
    if !config.api_password.is_configured() {
        warn!(
            agent = %kind,
            "API_PASSWORD is not set; every request except the agent card will be rejected"
        );
    }

    let handler = match kind.handler() {
        Ok(handler) => handler,
        Err(e) => {
            error!(agent = %kind, error = %e, "Agent initialisation failed");
            return exit::FAILURE;
        }
    };

    let endpoint = match AgentEndpoint::new(config, handler) {
        Ok(endpoint) => endpoint,
        Err(e) => {
            error!(agent = %kind, error = %e, "Invalid configuration");
            return exit::CONFIG;
        }
    };

    let listener = match endpoint.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            error!(agent = %kind, error = %e, "Cannot start endpoint");
            return exit::CONFIG;
        }
    };

    if options.supervised {
        match listener.local_addr() {
            Ok(addr) => println!("{}", ready_line(addr)),
            Err(e) => {
                error!(agent = %kind, error = %e, "Listener has no local address");
                return exit::FAILURE;
            }
        }
    }

    let result = if options.supervised {
        endpoint
            .serve(listener, async {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = stdin_closed() => info!("Supervisor requested shutdown"),
                }
            })
            .await
    } else {
        endpoint.serve(listener, shutdown_signal()).await
    };

    match result {
        Ok(()) => exit::SUCCESS,
        Err(GatewayError::ShutdownTimeout(grace)) => {
            error!(
                agent = %kind,
                grace_secs = grace.as_secs_f64(),
                "Shutdown grace period exceeded"
            );
            exit::SHUTDOWN_TIMEOUT
        }
        Err(e) => {
            error!(agent = %kind, error = %e, "Endpoint failed");
            exit::FAILURE
        }
    }
}

/// Resolves when stdin reaches end-of-file. The supervisor closes the pipe
/// to request a graceful stop.
async fn stdin_closed() {
    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 256];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => continue,
        }
    }
}
