//! Graceful shutdown handling for clonemond.
//!
//! Stops the sampling scheduler and closes the history database when the
//! daemon receives SIGTERM or SIGINT.

use clonemon_core::{SchedulerHandle, StateManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Manages graceful shutdown of the daemon.
pub struct ShutdownManager {
    scheduler: SchedulerHandle,
    state: Option<Arc<StateManager>>,
    /// How long an in-flight cycle may keep running after the stop request
    graceful_timeout: Duration,
}

impl ShutdownManager {
    pub fn new(scheduler: SchedulerHandle, state: Option<Arc<StateManager>>) -> Self {
        Self { scheduler, state, graceful_timeout: Duration::from_secs(30) }
    }

    pub fn with_timeout(mut self, graceful_timeout: Duration) -> Self {
        self.graceful_timeout = graceful_timeout;
        self
    }

    /// Stop the scheduler, then close the history database.
    ///
    /// A cycle still running when the timeout expires is aborted before the
    /// database closes.
    pub async fn shutdown(self) {
        info!("Starting graceful shutdown...");

        let completed = self.scheduler.stats().completed();
        let failed = self.scheduler.stats().failed();
        match self.scheduler.shutdown_within(self.graceful_timeout).await {
            Ok(true) => {
                info!(completed, failed, "Scheduler stopped");
            }
            Ok(false) => {
                warn!(
                    timeout_secs = self.graceful_timeout.as_secs(),
                    "Timed out waiting for the in-flight cycle, aborted it"
                );
            }
            Err(e) => {
                error!("Scheduler did not stop cleanly: {}", e);
            }
        }

        if let Some(state) = self.state {
            state.close().await;
            info!("History database closed");
        }

        info!("Graceful shutdown complete");
    }
}

/// Create a shutdown signal receiver.
///
/// Returns a broadcast receiver that will receive a signal when
/// SIGTERM or SIGINT is received.
pub fn shutdown_signal() -> broadcast::Receiver<()> {
    let (tx, rx) = broadcast::channel(1);

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C)");
            }
            _ = terminate => {
                info!("Received SIGTERM");
            }
        }

        let _ = tx.send(());
    });

    rx
}
