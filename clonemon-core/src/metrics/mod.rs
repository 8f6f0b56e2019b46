//! Clone-detector metrics: snapshots, sampling and history.
//!
//! # Architecture
//!
//! ```text
//! +---------------+  count / sum   +---------------+
//! | CounterSource | <------------- |    Sampler    |
//! | (pipeline db) |                |  measure()    |
//! +---------------+                |  stamp()      |
//!                                  +-------+-------+
//!                                          | Snapshot
//!                                  +-------v-------+
//!                                  | HistoryStore  |
//!                                  |  append()     |
//!                                  |  read_all()   |
//!                                  +---------------+
//! ```

mod history;
mod sampler;
mod snapshot;

pub use history::{HistoryStore, MemoryHistoryStore, SqliteHistoryStore};
pub use sampler::{Measurement, Sampler, SamplerConfig};
pub use snapshot::{
    Collection, Counts, DerivedMetrics, Snapshot, SnapshotRecord, Timings, CLONES_SIZE_STAGE,
};
