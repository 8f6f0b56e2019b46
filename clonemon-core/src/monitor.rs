//! Query surface: the single entry point for sampling cycles and history reads.
//!
//! Scheduled ticks and on-demand requests both go through [`Monitor::run_cycle`],
//! so the two paths can never diverge in how a snapshot is produced or stored.

use crate::error::Result;
use crate::metrics::{HistoryStore, Sampler, SnapshotRecord};
use crate::observability::health::{
    HealthChecker, HealthStatus, SUBSYSTEM_HISTORY, SUBSYSTEM_SAMPLER,
};
use crate::observability::metrics as obs;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTrigger {
    Scheduled,
    OnDemand,
}

impl CycleTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleTrigger::Scheduled => "scheduled",
            CycleTrigger::OnDemand => "on_demand",
        }
    }
}

impl std::fmt::Display for CycleTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Owns the sampler and a handle to the history store.
pub struct Monitor {
    sampler: Sampler,
    history: Arc<dyn HistoryStore>,
    health: Option<HealthChecker>,
    /// Held from timestamp issue through append, so history timestamps never go back
    commit: Mutex<()>,
}

impl Monitor {
    pub fn new(sampler: Sampler, history: Arc<dyn HistoryStore>) -> Self {
        Self { sampler, history, health: None, commit: Mutex::new(()) }
    }

    /// Report cycle outcomes to `health`.
    pub fn with_health(mut self, health: HealthChecker) -> Self {
        self.health = Some(health);
        self
    }

    /// One `sample` + `append`. Nothing is appended unless the sample is complete,
    /// and nothing is retried here: the next tick or request is the retry.
    ///
    /// Queries run concurrently with other cycles; only stamping and appending
    /// are serialized.
    #[instrument(skip(self), fields(trigger = %trigger))]
    pub async fn run_cycle(&self, trigger: CycleTrigger) -> Result<SnapshotRecord> {
        let start = Instant::now();

        let result = match self.sampler.measure().await {
            Ok(measurement) => {
                let _commit = self.commit.lock().await;
                let snapshot = self.sampler.stamp(measurement);
                self.history.append(&snapshot).await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(record) => {
                obs::record_cycle(trigger.as_str(), start.elapsed().as_secs_f64());
                obs::set_collection_records(&record.snapshot.counts);
                info!(
                    id = %record.id,
                    files = record.snapshot.counts.files,
                    chunks = record.snapshot.counts.chunks,
                    candidates = record.snapshot.counts.candidates,
                    clones = record.snapshot.counts.clones,
                    "Snapshot recorded"
                );
            }
            Err(e) => {
                obs::record_cycle_failure(trigger.as_str(), e.kind());
                warn!(error = %e, kind = e.kind(), "Sampling cycle failed");
            }
        }

        self.report_health(&result).await;
        result
    }

    /// Take a fresh sample, store it, and return it.
    pub async fn get_latest(&self) -> Result<SnapshotRecord> {
        self.run_cycle(CycleTrigger::OnDemand).await
    }

    /// Every stored snapshot in append order.
    pub async fn get_history(&self) -> Result<Vec<SnapshotRecord>> {
        self.history.read_all().await
    }

    /// Stored snapshots within the inclusive time bounds.
    pub async fn get_history_range(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<SnapshotRecord>> {
        self.history.read_range(since, until).await
    }

    async fn report_health(&self, result: &Result<SnapshotRecord>) {
        let Some(health) = &self.health else {
            return;
        };

        match result {
            Ok(_) => {
                health.update_subsystem(SUBSYSTEM_SAMPLER, HealthStatus::Healthy, None).await;
                health.update_subsystem(SUBSYSTEM_HISTORY, HealthStatus::Healthy, None).await;
            }
            Err(e) if e.is_store_failure() => {
                let message = Some(e.to_string());
                health.update_subsystem(SUBSYSTEM_HISTORY, HealthStatus::Unhealthy, message).await;
            }
            Err(e) => {
                let message = Some(e.to_string());
                health.update_subsystem(SUBSYSTEM_SAMPLER, HealthStatus::Degraded, message).await;
            }
        }
    }
}
