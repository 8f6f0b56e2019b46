//! clonemon core library
//!
//! Sampling and history engine for the clone-detector monitor: counts records
//! in the pipeline's collections, derives secondary metrics, appends timestamped
//! snapshots to an append-only history, and serves that history back.

pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod observability;
pub mod paths;
pub mod ports;
pub mod scheduler;
pub mod source;
pub mod state;

// Re-export commonly used items
pub use config::Config;
pub use error::{MonitorError, Result};
pub use crate::metrics::{
    Collection, Counts, DerivedMetrics, HistoryStore, Measurement, MemoryHistoryStore, Sampler,
    SamplerConfig, Snapshot, SnapshotRecord, SqliteHistoryStore,
};
pub use monitor::{CycleTrigger, Monitor};
pub use observability::{
    health::HealthChecker, init as init_observability, shutdown as shutdown_observability,
};
pub use scheduler::{SamplingScheduler, SchedulerHandle, SchedulerState};
pub use source::{CounterSource, RecordFilter, SqliteCounterSource};
pub use state::StateManager;
