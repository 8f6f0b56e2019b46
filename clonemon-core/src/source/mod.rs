//! Counter sources: read-only access to the clone-detection pipeline's store.
//!
//! The sampler never talks to a database directly. It asks a [`CounterSource`]
//! for record counts and numeric aggregates, so the pipeline's store can be
//! swapped (or mocked in tests) without touching sampling logic.

use crate::error::Result;
use crate::metrics::Collection;
use async_trait::async_trait;

mod sqlite;

pub use sqlite::SqliteCounterSource;

/// A filter value for an equality condition.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

/// Conjunction of `field = value` conditions. Empty matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    conditions: Vec<(String, FilterValue)>,
}

impl RecordFilter {
    /// Match every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an equality condition.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, FilterValue)] {
        &self.conditions
    }
}

/// Capability to count and aggregate records in a named collection.
///
/// Implementations report failures as `SourceUnavailable`; timeouts are
/// enforced by the caller.
#[async_trait]
pub trait CounterSource: Send + Sync {
    /// Number of records in `collection` matching `filter`.
    async fn count(&self, collection: Collection, filter: &RecordFilter) -> Result<u64>;

    /// Sum of numeric `field` across records in `collection` matching `filter`.
    /// An empty collection sums to `0`.
    async fn sum(&self, collection: Collection, field: &str, filter: &RecordFilter)
        -> Result<f64>;

    /// Source name for logs.
    fn name(&self) -> &str;
}
