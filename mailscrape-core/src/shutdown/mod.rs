//! Graceful shutdown coordinator
//!
//! The serve loop stops reading commands once shutdown begins, then drains
//! in-flight request tasks for up to `drain_timeout` before aborting the
//! rest.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Shutdown signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Graceful,
    Immediate,
}

/// Shutdown state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Shutdown,
}

/// What happened to the in-flight tasks during a drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub completed: usize,
    pub aborted: usize,
}

/// Graceful shutdown coordinator
pub struct ShutdownCoordinator {
    state: Arc<RwLock<ShutdownState>>,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(drain_timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            state: Arc::new(RwLock::new(ShutdownState::Running)),
            shutdown_tx,
            drain_timeout,
        }
    }

    /// Subscribe to shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.shutdown_tx.subscribe()
    }

    /// Stop accepting work and notify subscribers
    pub async fn begin_shutdown(&self, signal: ShutdownSignal) {
        let mut state = self.state.write().await;
        if *state != ShutdownState::Running {
            warn!("Shutdown already in progress");
            return;
        }
        *state = ShutdownState::Draining;
        drop(state);

        info!(?signal, "Shutdown requested");
        // No receivers just means nobody is listening yet
        let _ = self.shutdown_tx.send(signal);
    }

    /// Wait for `tasks` to finish, aborting whatever outlives the timeout
    pub async fn drain<T: 'static>(&self, mut tasks: JoinSet<T>) -> DrainReport {
        let mut report = DrainReport::default();
        let in_flight = tasks.len();
        if in_flight > 0 {
            info!(in_flight, timeout = ?self.drain_timeout, "Waiting for in-flight requests");
        }

        let deadline = tokio::time::Instant::now() + self.drain_timeout;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(_))) => report.completed += 1,
                Ok(Some(Err(e))) => {
                    error!(error = %e, "Request task failed");
                    report.completed += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    report.aborted = tasks.len();
                    warn!(remaining = report.aborted, "Drain timeout reached, aborting requests");
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    break;
                }
            }
        }

        *self.state.write().await = ShutdownState::Shutdown;
        info!(completed = report.completed, aborted = report.aborted, "Shutdown complete");
        report
    }

    pub async fn is_shutting_down(&self) -> bool {
        *self.state.read().await != ShutdownState::Running
    }

    /// Wait for the shutdown signal
    pub async fn wait_for_shutdown(&self) -> ShutdownSignal {
        let mut rx = self.subscribe();
        if self.is_shutting_down().await {
            return ShutdownSignal::Graceful;
        }
        rx.recv().await.unwrap_or(ShutdownSignal::Immediate)
    }
}

/// Begin a graceful shutdown on SIGINT or SIGTERM
#[cfg(unix)]
pub fn install_signal_handlers(coordinator: Arc<ShutdownCoordinator>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!(error = %e, "Failed to install signal handlers");
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
        coordinator.begin_shutdown(ShutdownSignal::Graceful).await;
    });
}

/// Begin a graceful shutdown on Ctrl+C
#[cfg(windows)]
pub fn install_signal_handlers(coordinator: Arc<ShutdownCoordinator>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }
        info!("Received Ctrl+C");
        coordinator.begin_shutdown(ShutdownSignal::Graceful).await;
    });
}
