//! Snapshot data model: one timestamped sample of collection counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Collections maintained by the clone-detection pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Files,
    Chunks,
    Candidates,
    Clones,
}

impl Collection {
    /// Every tracked collection, in declaration order.
    pub const ALL: [Collection; 4] =
        [Collection::Files, Collection::Chunks, Collection::Candidates, Collection::Clones];

    /// Collection (and table) name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Files => "files",
            Collection::Chunks => "chunks",
            Collection::Candidates => "candidates",
            Collection::Clones => "clones",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw record counts, one per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub files: u64,
    pub chunks: u64,
    pub candidates: u64,
    pub clones: u64,
}

impl Counts {
    pub fn get(&self, collection: Collection) -> u64 {
        match collection {
            Collection::Files => self.files,
            Collection::Chunks => self.chunks,
            Collection::Candidates => self.candidates,
            Collection::Clones => self.clones,
        }
    }

    pub fn set(&mut self, collection: Collection, value: u64) {
        match collection {
            Collection::Files => self.files = value,
            Collection::Chunks => self.chunks = value,
            Collection::Candidates => self.candidates = value,
            Collection::Clones => self.clones = value,
        }
    }

    /// `(collection, count)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Collection, u64)> + '_ {
        Collection::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

/// Metrics derived from a complete [`Counts`] set.
///
/// Computed once at sample time and stored, so a later change to a formula
/// never rewrites history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Sum of the size field across all clone records.
    pub clones_size: f64,
    /// `chunks / files`, `0` when there are no files.
    pub chunks_per_file: f64,
}

impl DerivedMetrics {
    pub fn compute(counts: &Counts, clones_size_sum: f64) -> Self {
        let clones_size = if clones_size_sum.is_finite() { clones_size_sum } else { 0.0 };
        let chunks_per_file = if counts.files > 0 {
            counts.chunks as f64 / counts.files as f64
        } else {
            0.0
        };

        Self { clones_size, chunks_per_file }
    }
}

/// Elapsed seconds per sampling stage, for operational diagnosis only.
pub type Timings = BTreeMap<String, f64>;

/// Stage name of the clone size aggregate query.
pub const CLONES_SIZE_STAGE: &str = "clones_size";

/// One point-in-time sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub counts: Counts,
    #[serde(flatten)]
    pub derived: DerivedMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<Timings>,
}

impl Snapshot {
    /// Build a snapshot from completed counts, deriving every secondary metric.
    pub fn new(
        timestamp: DateTime<Utc>,
        counts: Counts,
        clones_size_sum: f64,
        timings: Option<Timings>,
    ) -> Self {
        let derived = DerivedMetrics::compute(&counts, clones_size_sum);
        Self { timestamp, counts, derived, timings }
    }
}

/// A snapshot as persisted by a history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Opaque identifier assigned by the store at append time.
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub snapshot: Snapshot,
}
