//! One supervised worker process.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::config::EndpointDescriptor;
use super::SupervisorError;
use crate::worker::parse_ready_line;

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Exit code 0.
    Success,
    /// Non-zero exit code, or `None` when terminated by a signal.
    Failed(Option<i32>),
    /// Force-killed by the supervisor.
    Killed,
}

impl WorkerExit {
    pub fn is_success(self) -> bool {
        self == WorkerExit::Success
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Success => f.write_str("exit code 0"),
            WorkerExit::Failed(Some(code)) => write!(f, "exit code {}", code),
            WorkerExit::Failed(None) => f.write_str("terminated by signal"),
            WorkerExit::Killed => f.write_str("killed"),
        }
    }
}

/// Point-in-time view of a worker, published by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    pub name: &'static str,
    pub descriptor: EndpointDescriptor,
    pub pid: Option<u32>,
    /// Address announced on the readiness line
    pub addr: Option<SocketAddr>,
    pub restarts: u32,
    pub exit: Option<WorkerExit>,
}

pub(crate) struct WorkerProcess {
    descriptor: EndpointDescriptor,
    child: Child,
    // Held outside `child` so that waiting on the child does not close it.
    stdin: Option<ChildStdin>,
    ready: Option<oneshot::Receiver<SocketAddr>>,
    pid: Option<u32>,
    addr: Option<SocketAddr>,
    restarts: u32,
    exit: Option<WorkerExit>,
}

impl WorkerProcess {
    /// Start `<program> <kind> --port <port> --supervised`.
    pub(crate) fn spawn(
        descriptor: &EndpointDescriptor,
        program: &Path,
        env: &[(String, String)],
    ) -> Result<Self, SupervisorError> {
        let name = descriptor.name();

        let mut cmd = Command::new(program);
        cmd.arg(descriptor.kind.as_str())
            .arg("--port")
            .arg(descriptor.port.to_string())
            .arg("--supervised")
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            name: name.to_string(),
            source,
        })?;
        let pid = child.id();
        info!(agent = name, pid = ?pid, port = descriptor.port, "[Supervisor] Spawned worker");

        let (ready_tx, ready_rx) = oneshot::channel();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut ready_tx = Some(ready_tx);
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(addr) = parse_ready_line(&line) {
                        if let Some(tx) = ready_tx.take() {
                            let _ = tx.send(addr);
                            continue;
                        }
                    }
                    eprintln!("[{}] {}", name, line);
                }
            });
        }

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    eprintln!("[{}] {}", name, line);
                }
            });
        }

        Ok(Self {
            descriptor: descriptor.clone(),
            stdin: child.stdin.take(),
            child,
            ready: Some(ready_rx),
            pid,
            addr: None,
            restarts: 0,
            exit: None,
        })
    }

    /// Start a fresh process for the same descriptor, counting the restart.
    pub(crate) fn respawn(
        &self,
        program: &Path,
        env: &[(String, String)],
    ) -> Result<Self, SupervisorError> {
        let mut next = Self::spawn(&self.descriptor, program, env)?;
        next.restarts = self.restarts + 1;
        Ok(next)
    }

    pub(crate) fn name(&self) -> &'static str {
        self.descriptor.name()
    }

    pub(crate) fn restarts(&self) -> u32 {
        self.restarts
    }

    pub(crate) fn exit(&self) -> Option<WorkerExit> {
        self.exit
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.exit.is_none()
    }

    pub(crate) fn info(&self) -> WorkerInfo {
        WorkerInfo {
            name: self.name(),
            descriptor: self.descriptor.clone(),
            pid: self.pid,
            addr: self.addr,
            restarts: self.restarts,
            exit: self.exit,
        }
    }

    /// Wait for the readiness line. Fails if the process exits first or
    /// `deadline` passes.
    pub(crate) async fn wait_ready(
        &mut self,
        deadline: Instant,
    ) -> Result<SocketAddr, SupervisorError> {
        if let Some(addr) = self.addr {
            return Ok(addr);
        }
        let name = self.name();
        let Some(ready) = self.ready.take() else {
            return Err(SupervisorError::StartupFailed {
                name: name.to_string(),
                reason: "output closed before the readiness line".to_string(),
            });
        };

        tokio::select! {
            announced = ready => match announced {
                Ok(addr) => {
                    self.addr = Some(addr);
                    info!(agent = name, addr = %addr, "[Supervisor] Worker ready");
                    Ok(addr)
                }
                Err(_) => {
                    let exit = self.wait().await;
                    Err(SupervisorError::StartupFailed {
                        name: name.to_string(),
                        reason: exit.to_string(),
                    })
                }
            },
            exit = self.wait() => Err(SupervisorError::StartupFailed {
                name: name.to_string(),
                reason: exit.to_string(),
            }),
            _ = sleep_until(deadline) => Err(SupervisorError::StartupTimeout {
                name: name.to_string(),
            }),
        }
    }

    /// Wait for the process to end. Cancel safe; the result is cached.
    pub(crate) async fn wait(&mut self) -> WorkerExit {
        if let Some(exit) = self.exit {
            return exit;
        }
        let exit = match self.child.wait().await {
            Ok(status) if status.success() => WorkerExit::Success,
            Ok(status) => WorkerExit::Failed(status.code()),
            Err(e) => {
                warn!(agent = self.name(), error = %e, "[Supervisor] Cannot wait on worker");
                WorkerExit::Failed(None)
            }
        };
        self.exit = Some(exit);
        exit
    }

    /// Ask the worker to stop by closing its stdin.
    pub(crate) fn request_stop(&mut self) {
        if self.stdin.take().is_some() {
            debug!(agent = self.name(), "[Supervisor] Closed worker stdin");
        }
    }

    pub(crate) async fn kill(&mut self) {
        if !self.is_alive() {
            return;
        }
        match self.child.kill().await {
            Ok(()) => {
                warn!(agent = self.name(), pid = ?self.pid, "[Supervisor] Worker force-killed");
                self.exit = Some(WorkerExit::Killed);
            }
            Err(e) => {
                debug!(agent = self.name(), error = %e, "[Supervisor] Kill failed, reaping");
                self.wait().await;
            }
        }
    }
}
