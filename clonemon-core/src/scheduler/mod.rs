//! Periodic sampling scheduler.
//!
//! One background task drives `Idle -> Sampling -> Idle` on a fixed period.
//! The next fire time is always measured from the end of the previous cycle,
//! so an overrunning cycle delays the schedule instead of piling up ticks,
//! and at most one scheduled cycle is ever in flight.

use crate::error::{MonitorError, Result};
use crate::monitor::{CycleTrigger, Monitor};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// Waiting for the next fire time.
    #[default]
    Idle,
    /// A scheduled cycle is running.
    Sampling,
    /// The loop has exited; no further ticks.
    Stopped,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Sampling => "sampling",
            SchedulerState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cycle counters for the scheduled path.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    completed: AtomicU64,
    failed: AtomicU64,
}

impl SchedulerStats {
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Drives [`Monitor::run_cycle`] on a fixed period.
pub struct SamplingScheduler {
    monitor: Arc<Monitor>,
    period: Duration,
}

impl SamplingScheduler {
    pub fn new(monitor: Arc<Monitor>, period: Duration) -> Self {
        Self { monitor, period }
    }

    /// Spawn the sampling loop. The first cycle fires immediately.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let state_tx = Arc::new(state_tx);
        let stats = Arc::new(SchedulerStats::default());

        let task = tokio::spawn(run_loop(
            self.monitor,
            self.period,
            shutdown_rx,
            state_tx.clone(),
            stats.clone(),
        ));

        SchedulerHandle { shutdown_tx, state_tx, state_rx, stats, task }
    }
}

async fn run_loop(
    monitor: Arc<Monitor>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    state_tx: Arc<watch::Sender<SchedulerState>>,
    stats: Arc<SchedulerStats>,
) {
    info!(period_secs = period.as_secs_f64(), "Sampling scheduler started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        state_tx.send_replace(SchedulerState::Sampling);
        match monitor.run_cycle(CycleTrigger::Scheduled).await {
            Ok(_) => {
                stats.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Scheduled cycle failed, retrying on next tick");
            }
        }
        state_tx.send_replace(SchedulerState::Idle);

        let next_fire = Instant::now() + period;
        debug!(?next_fire, "Scheduler idle");

        tokio::select! {
            _ = tokio::time::sleep_until(next_fire) => {}
            changed = shutdown_rx.changed() => {
                // A dropped handle can no longer stop us, so treat it as a stop
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    state_tx.send_replace(SchedulerState::Stopped);
    info!(
        completed = stats.completed(),
        failed = stats.failed(),
        "Sampling scheduler stopped"
    );
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    state_tx: Arc<watch::Sender<SchedulerState>>,
    state_rx: watch::Receiver<SchedulerState>,
    stats: Arc<SchedulerStats>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state_rx.clone()
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Stop accepting ticks, let an in-flight cycle finish, and wait for the loop to exit.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.task
            .await
            .map_err(|e| MonitorError::Internal(format!("Scheduler task failed: {}", e)))
    }

    /// Like [`shutdown`](Self::shutdown), but an in-flight cycle gets at most `grace`.
    ///
    /// Returns `Ok(false)` when the cycle had to be aborted. Either way the task
    /// is gone when this returns, so no further append can happen.
    pub async fn shutdown_within(mut self, grace: Duration) -> Result<bool> {
        let _ = self.shutdown_tx.send(true);
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(joined) => joined
                .map(|_| true)
                .map_err(|e| MonitorError::Internal(format!("Scheduler task failed: {}", e))),
            Err(_) => {
                self.task.abort();
                let _ = (&mut self.task).await;
                self.state_tx.send_replace(SchedulerState::Stopped);
                warn!(grace_secs = grace.as_secs_f64(), "In-flight cycle aborted at shutdown");
                Ok(false)
            }
        }
    }
}
