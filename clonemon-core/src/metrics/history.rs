//! Snapshot history storage and retrieval.
//!
//! History is append-only: snapshots are appended exactly once and never
//! updated or removed. There is no retention policy, so the store grows for
//! as long as the process (or the database file) lives.

use super::snapshot::{Counts, DerivedMetrics, Snapshot, SnapshotRecord, Timings};
use crate::error::{MonitorError, Result};
use crate::StateManager;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Append-only ordered sequence of snapshots.
///
/// `append` is safe to call from any number of tasks at once; every read
/// returns a prefix-consistent view in which each snapshot is either
/// complete or absent.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist `snapshot` and return it with its store-assigned identifier.
    async fn append(&self, snapshot: &Snapshot) -> Result<SnapshotRecord>;

    /// All snapshots in append order.
    async fn read_all(&self) -> Result<Vec<SnapshotRecord>>;

    /// Snapshots whose timestamp lies within the inclusive bounds, in append order.
    async fn read_range(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<SnapshotRecord>>;

    /// Number of stored snapshots.
    async fn count(&self) -> Result<usize>;

    /// Store name for logs.
    fn name(&self) -> &str;
}

fn in_range(
    snapshot: &Snapshot,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> bool {
    since.map_or(true, |s| snapshot.timestamp >= s)
        && until.map_or(true, |u| snapshot.timestamp <= u)
}

/// Process-local history.
#[derive(Default)]
pub struct MemoryHistoryStore {
    records: RwLock<Vec<SnapshotRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, snapshot: &Snapshot) -> Result<SnapshotRecord> {
        let record = SnapshotRecord { id: Uuid::new_v4().to_string(), snapshot: snapshot.clone() };
        self.records.write().await.push(record.clone());
        metrics::counter!("clonemon_history_appends_total", "store" => "memory").increment(1);
        Ok(record)
    }

    async fn read_all(&self) -> Result<Vec<SnapshotRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn read_range(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<SnapshotRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| in_range(&r.snapshot, since, until)).cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// History persisted in the `historical_counts` table.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    state: Arc<StateManager>,
    /// Serializes appends within this process.
    append_lock: Arc<Mutex<()>>,
}

impl SqliteHistoryStore {
    pub fn new(state: Arc<StateManager>) -> Self {
        Self { state, append_lock: Arc::new(Mutex::new(())) }
    }

    fn store_err(e: impl std::fmt::Display) -> MonitorError {
        MonitorError::StoreUnavailable(e.to_string())
    }

    fn row_to_record(row: SqliteRow) -> Result<SnapshotRecord> {
        let count = |column: &str| -> Result<u64> {
            let value: i64 = row.try_get(column).map_err(Self::store_err)?;
            u64::try_from(value)
                .map_err(|_| Self::store_err(format!("negative {} in history row", column)))
        };

        let counts = Counts {
            files: count("files")?,
            chunks: count("chunks")?,
            candidates: count("candidates")?,
            clones: count("clones")?,
        };

        let timestamp_ms: i64 = row.try_get("timestamp_ms").map_err(Self::store_err)?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
            .ok_or_else(|| Self::store_err(format!("timestamp {} out of range", timestamp_ms)))?;

        let timings: Option<String> = row.try_get("timings").map_err(Self::store_err)?;
        let timings = timings
            .map(|json| serde_json::from_str::<Timings>(&json))
            .transpose()
            .map_err(Self::store_err)?;

        Ok(SnapshotRecord {
            id: row.try_get("id").map_err(Self::store_err)?,
            snapshot: Snapshot {
                timestamp,
                counts,
                derived: DerivedMetrics {
                    clones_size: row.try_get("clones_size").map_err(Self::store_err)?,
                    chunks_per_file: row.try_get("chunks_per_file").map_err(Self::store_err)?,
                },
                timings,
            },
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, timestamp_ms, files, chunks, candidates, clones,
           clones_size, chunks_per_file, timings
    FROM historical_counts
"#;

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    #[instrument(skip(self, snapshot), fields(timestamp = %snapshot.timestamp))]
    async fn append(&self, snapshot: &Snapshot) -> Result<SnapshotRecord> {
        let id = Uuid::new_v4().to_string();
        let timings = snapshot
            .timings
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| MonitorError::Internal(format!("Failed to serialize timings: {}", e)))?;

        let _guard = self.append_lock.lock().await;

        sqlx::query(
            r#"
            INSERT INTO historical_counts (id, timestamp_ms, files, chunks, candidates, clones,
                                           clones_size, chunks_per_file, timings)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(snapshot.timestamp.timestamp_millis())
        .bind(snapshot.counts.files as i64)
        .bind(snapshot.counts.chunks as i64)
        .bind(snapshot.counts.candidates as i64)
        .bind(snapshot.counts.clones as i64)
        .bind(snapshot.derived.clones_size)
        .bind(snapshot.derived.chunks_per_file)
        .bind(timings)
        .execute(self.state.pool())
        .await
        .map_err(|e| {
            metrics::counter!("clonemon_db_errors_total", "operation" => "append").increment(1);
            Self::store_err(e)
        })?;

        metrics::counter!("clonemon_history_appends_total", "store" => "sqlite").increment(1);
        debug!(id = %id, "Appended snapshot");

        Ok(SnapshotRecord { id, snapshot: snapshot.clone() })
    }

    #[instrument(skip(self))]
    async fn read_all(&self) -> Result<Vec<SnapshotRecord>> {
        let rows = sqlx::query(&format!("{} ORDER BY seq", SELECT_COLUMNS))
            .fetch_all(self.state.pool())
            .await
            .map_err(|e| {
                metrics::counter!("clonemon_db_errors_total", "operation" => "read_all")
                    .increment(1);
                Self::store_err(e)
            })?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    #[instrument(skip(self))]
    async fn read_range(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<SnapshotRecord>> {
        let since_ms = since.map(|t| t.timestamp_millis());
        let until_ms = until.map(|t| t.timestamp_millis());

        let rows = sqlx::query(&format!(
            "{} WHERE (? IS NULL OR timestamp_ms >= ?) \
             AND (? IS NULL OR timestamp_ms <= ?) ORDER BY seq",
            SELECT_COLUMNS
        ))
        .bind(since_ms)
        .bind(since_ms)
        .bind(until_ms)
        .bind(until_ms)
        .fetch_all(self.state.pool())
        .await
        .map_err(|e| {
            metrics::counter!("clonemon_db_errors_total", "operation" => "read_range").increment(1);
            Self::store_err(e)
        })?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM historical_counts")
            .fetch_one(self.state.pool())
            .await
            .map_err(Self::store_err)?;
        Ok(count as usize)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
