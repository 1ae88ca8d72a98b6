//! # Process Supervisor
//!
//! Runs every configured endpoint as its own worker process and owns their
//! combined lifecycle.
//!
//! ```text
//!   Idle ──► Starting ──► Running ──► ShuttingDown ──► Stopped
//!               │                          ▲
//!               └──────────────────────────┘
//!            (startup failure or interrupt)
//! ```
//!
//! Workers are the current executable re-run as
//! `agent-runtime <kind> --port <port> --supervised`. A worker counts as
//! ready once it prints `AGENT_READY <addr>` on stdout; everything else it
//! writes is forwarded to our stderr prefixed with its name. Closing a
//! worker's stdin asks it to stop gracefully.

pub mod config;
pub mod process;

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{error, info, warn};

pub use config::{EndpointDescriptor, RestartPolicy, SupervisorConfig};
pub use process::{WorkerExit, WorkerInfo};

use crate::exit;
use process::WorkerProcess;

/// Supervisor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorStatus {
    /// Created, not started.
    Idle,
    /// Spawning workers and waiting for readiness.
    Starting,
    /// Every worker announced readiness.
    Running,
    /// Stopping workers.
    ShuttingDown,
    /// All workers gone.
    Stopped,
}

impl SupervisorStatus {
    pub fn can_transition_to(self, next: SupervisorStatus) -> bool {
        use SupervisorStatus::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Running)
                | (Starting, ShuttingDown)
                | (Running, ShuttingDown)
                | (ShuttingDown, Stopped)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("invalid supervisor transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: SupervisorStatus,
        to: SupervisorStatus,
    },
    #[error("failed to spawn worker {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("worker {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },
    #[error("worker {name} did not become ready in time")]
    StartupTimeout { name: String },
    #[error("cannot locate the worker executable: {0}")]
    Program(#[source] std::io::Error),
}

/// How the startup phase ended.
enum Startup {
    Ready,
    Interrupted,
    Failed,
}

/// What woke the running loop.
enum Event {
    Interrupt,
    Exited(usize, WorkerExit),
    AllExited,
}

pub struct ProcessSupervisor {
    config: SupervisorConfig,
    status: RwLock<SupervisorStatus>,
    workers: RwLock<Vec<WorkerInfo>>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            status: RwLock::new(SupervisorStatus::Idle),
            workers: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn status(&self) -> SupervisorStatus {
        *self.status.read()
    }

    /// Latest view of every worker, in endpoint order.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.workers.read().clone()
    }

    fn transition(&self, to: SupervisorStatus) -> Result<(), SupervisorError> {
        let mut status = self.status.write();
        if !status.can_transition_to(to) {
            return Err(SupervisorError::InvalidTransition { from: *status, to });
        }
        info!("[Supervisor] {:?} -> {:?}", *status, to);
        *status = to;
        Ok(())
    }

    fn publish(&self, workers: &[WorkerProcess]) {
        *self.workers.write() = workers.iter().map(WorkerProcess::info).collect();
    }

    fn program(&self) -> Result<PathBuf, SupervisorError> {
        match &self.config.program {
            Some(program) => Ok(program.clone()),
            None => std::env::current_exe().map_err(SupervisorError::Program),
        }
    }

    /// Run until every worker has stopped and return the process exit code.
    ///
    /// Each message on `interrupts` is one interrupt: the first starts a
    /// graceful shutdown, the next one force-kills whatever is left.
    pub async fn run(&self, mut interrupts: mpsc::Receiver<()>) -> i32 {
        if let Err(e) = self.transition(SupervisorStatus::Starting) {
            error!(error = %e, "[Supervisor] Cannot start");
            return exit::FAILURE;
        }

        let program = match self.program() {
            Ok(program) => program,
            Err(e) => {
                error!(error = %e, "[Supervisor] Cannot start");
                self.finish_without_workers();
                return exit::FAILURE;
            }
        };

        let mut workers = Vec::with_capacity(self.config.endpoints.len());
        let startup = self.start_workers(&program, &mut workers, &mut interrupts).await;
        self.publish(&workers);

        let mut clean = match startup {
            Startup::Ready => {
                if let Err(e) = self.transition(SupervisorStatus::Running) {
                    error!(error = %e, "[Supervisor] Unexpected state");
                }
                info!(workers = workers.len(), "[Supervisor] All workers ready");
                self.supervise(&program, &mut workers, &mut interrupts).await
            }
            Startup::Interrupted => true,
            Startup::Failed => false,
        };

        if let Err(e) = self.transition(SupervisorStatus::ShuttingDown) {
            error!(error = %e, "[Supervisor] Unexpected state");
        }
        self.shutdown(&mut workers, &mut interrupts).await;

        clean &= workers
            .iter()
            .all(|w| w.exit().is_some_and(WorkerExit::is_success));
        self.publish(&workers);

        if let Err(e) = self.transition(SupervisorStatus::Stopped) {
            error!(error = %e, "[Supervisor] Unexpected state");
        }

        if clean {
            info!("[Supervisor] All workers stopped");
            exit::SUCCESS
        } else {
            warn!("[Supervisor] Stopped with failed or killed workers");
            exit::FAILURE
        }
    }

    fn finish_without_workers(&self) {
        let _ = self.transition(SupervisorStatus::ShuttingDown);
        let _ = self.transition(SupervisorStatus::Stopped);
    }

    /// Spawn every endpoint in order, then wait for all of them to be ready.
    async fn start_workers(
        &self,
        program: &Path,
        workers: &mut Vec<WorkerProcess>,
        interrupts: &mut mpsc::Receiver<()>,
    ) -> Startup {
        for (i, descriptor) in self.config.endpoints.iter().enumerate() {
            if i > 0 && !self.config.stagger.is_zero() {
                tokio::select! {
                    _ = sleep(self.config.stagger) => {}
                    _ = next_interrupt(interrupts) => {
                        info!("[Supervisor] Interrupted during startup");
                        return Startup::Interrupted;
                    }
                }
            }

            match WorkerProcess::spawn(descriptor, program, &self.config.worker_env) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    error!(agent = descriptor.name(), error = %e, "[Supervisor] Startup failed");
                    return Startup::Failed;
                }
            }
            self.publish(workers);
        }

        let deadline = Instant::now() + self.config.startup_timeout;
        for worker in workers.iter_mut() {
            tokio::select! {
                ready = worker.wait_ready(deadline) => {
                    if let Err(e) = ready {
                        error!(agent = worker.name(), error = %e, "[Supervisor] Startup failed");
                        return Startup::Failed;
                    }
                }
                _ = next_interrupt(interrupts) => {
                    info!("[Supervisor] Interrupted during startup");
                    return Startup::Interrupted;
                }
            }
        }
        Startup::Ready
    }

    /// Watch running workers until an interrupt arrives or none is left.
    /// Returns `false` when the last worker exited on its own with a failure.
    async fn supervise(
        &self,
        program: &Path,
        workers: &mut [WorkerProcess],
        interrupts: &mut mpsc::Receiver<()>,
    ) -> bool {
        loop {
            let event = {
                let waits: Vec<_> = workers
                    .iter_mut()
                    .enumerate()
                    .filter(|(_, w)| w.is_alive())
                    .map(|(i, w)| Box::pin(async move { (i, w.wait().await) }))
                    .collect();

                if waits.is_empty() {
                    Event::AllExited
                } else {
                    tokio::select! {
                        _ = next_interrupt(interrupts) => Event::Interrupt,
                        ((i, exit), _, _) = futures::future::select_all(waits) => {
                            Event::Exited(i, exit)
                        }
                    }
                }
            };

            match event {
                Event::Interrupt => {
                    info!("[Supervisor] Shutting down");
                    return true;
                }
                Event::AllExited => {
                    warn!("[Supervisor] No workers left");
                    return workers
                        .iter()
                        .all(|w| w.exit().is_some_and(WorkerExit::is_success));
                }
                Event::Exited(i, exit) => {
                    let worker = &workers[i];
                    warn!(
                        agent = worker.name(),
                        exit = %exit,
                        restarts = worker.restarts(),
                        "[Supervisor] Worker exited unexpectedly"
                    );

                    if self.should_restart(worker.restarts(), exit) {
                        match self.restart(program, &mut workers[i], interrupts).await {
                            Ok(true) => {}
                            Ok(false) => return true,
                            Err(e) => {
                                error!(
                                    agent = workers[i].name(),
                                    error = %e,
                                    "[Supervisor] Restart failed"
                                );
                            }
                        }
                    }
                    self.publish(workers);
                }
            }
        }
    }

    fn should_restart(&self, restarts: u32, exit: WorkerExit) -> bool {
        self.config.restart_policy == RestartPolicy::OnFailure
            && !exit.is_success()
            && restarts < self.config.max_restarts
    }

    /// Replace `worker` with a fresh process. `Ok(false)` means an interrupt
    /// arrived while waiting for readiness.
    async fn restart(
        &self,
        program: &Path,
        worker: &mut WorkerProcess,
        interrupts: &mut mpsc::Receiver<()>,
    ) -> Result<bool, SupervisorError> {
        let mut next = worker.respawn(program, &self.config.worker_env)?;
        info!(
            agent = next.name(),
            restart = next.restarts(),
            max = self.config.max_restarts,
            "[Supervisor] Restarting worker"
        );

        let deadline = Instant::now() + self.config.startup_timeout;
        let outcome = tokio::select! {
            ready = next.wait_ready(deadline) => ready.map(|_| true),
            _ = next_interrupt(interrupts) => Ok(false),
        };

        // Even a failed replacement is tracked so shutdown reaps it.
        *worker = next;
        outcome
    }

    /// Close every worker's stdin, then wait for each one until the shared
    /// grace deadline. A further interrupt kills everything left at once.
    async fn shutdown(&self, workers: &mut [WorkerProcess], interrupts: &mut mpsc::Receiver<()>) {
        for worker in workers.iter_mut().filter(|w| w.is_alive()) {
            worker.request_stop();
        }

        let grace = self.config.shutdown_grace;
        let deadline = Instant::now() + grace;
        let mut escalated = false;

        for worker in workers.iter_mut() {
            if !worker.is_alive() {
                continue;
            }
            if escalated {
                worker.kill().await;
                continue;
            }

            tokio::select! {
                exit = worker.wait() => {
                    info!(agent = worker.name(), exit = %exit, "[Supervisor] Worker stopped");
                }
                _ = sleep_until(deadline) => {
                    warn!(
                        agent = worker.name(),
                        grace_secs = grace.as_secs_f64(),
                        "[Supervisor] Worker did not stop within the grace period"
                    );
                    worker.kill().await;
                }
                _ = next_interrupt(interrupts) => {
                    warn!("[Supervisor] Second interrupt, killing remaining workers");
                    escalated = true;
                    worker.kill().await;
                }
            }
        }
    }
}

/// Next interrupt. A closed channel never delivers one.
async fn next_interrupt(interrupts: &mut mpsc::Receiver<()>) {
    if interrupts.recv().await.is_none() {
        std::future::pending::<()>().await;
    }
}

/// Load [`SupervisorConfig`] from the environment and run until interrupted.
pub async fn run_from_env() -> i32 {
    let config = match SupervisorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return exit::CONFIG;
        }
    };

    let interrupts = match crate::signal::forward_interrupts() {
        Ok(interrupts) => interrupts,
        Err(e) => {
            error!(error = %e, "Cannot install signal handlers");
            return exit::FAILURE;
        }
    };

    ProcessSupervisor::new(config).run(interrupts).await
}
