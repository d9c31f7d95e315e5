//! Termination signals
//!
//! The first SIGINT or SIGTERM starts a graceful shutdown. A second one
//! force-exits while the pipeline is still draining.

use anyhow::Result;
use std::future::Future;
use tracing::{info, warn};

#[cfg(unix)]
struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> Result<Self> {
        use anyhow::Context;
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?,
            terminate: signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?,
        })
    }

    async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => {}
            _ = self.terminate.recv() => {}
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn register() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Register the signal listeners and return a future that resolves on the
/// first signal
///
/// Handlers are installed before this returns, so a signal that arrives
/// while the monitor is still starting up is held until the future is
/// polled instead of killing the process.
pub fn install() -> Result<impl Future<Output = ()>> {
    let mut signals = Signals::register()?;

    Ok(async move {
        signals.recv().await;

        info!("Received shutdown signal, draining pending uploads...");
        info!("Press Ctrl+C again to force exit");

        tokio::spawn(async move {
            signals.recv().await;
            warn!("Force exit requested");
            std::process::exit(130);
        });
    })
}
