//! Interrupt handling.
//!
//! Signals are observed here and nowhere else. Ctrl+C and, on unix, SIGTERM
//! both count as an interrupt.

use std::io;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Repeatable source of interrupts.
pub struct Interrupts {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Interrupts {
    /// Install the handlers. Must be called inside a tokio runtime.
    pub fn new() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next interrupt and return its name.
    pub async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => "SIGINT",
                _ = self.terminate.recv() => "SIGTERM",
            }
        }
        #[cfg(not(unix))]
        {
            match tokio::signal::ctrl_c().await {
                Ok(()) => "Ctrl+C",
                Err(_) => std::future::pending().await,
            }
        }
    }
}

/// Resolves on the first interrupt.
pub async fn shutdown_signal() {
    match Interrupts::new() {
        Ok(mut interrupts) => {
            let name = interrupts.recv().await;
            info!(signal = name, "Interrupt received");
        }
        Err(e) => {
            warn!(error = %e, "Cannot install signal handlers, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

/// Forward every interrupt into a channel until the receiver is dropped.
pub fn forward_interrupts() -> io::Result<mpsc::Receiver<()>> {
    let mut interrupts = Interrupts::new()?;
    let (tx, rx) = mpsc::channel(4);

    tokio::spawn(async move {
        loop {
            let name = interrupts.recv().await;
            info!(signal = name, "Interrupt received");
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
