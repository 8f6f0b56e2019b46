//! Counter source backed by the pipeline's SQLite database.
//!
//! Each collection is a table of the same name. The pool is opened read-only
//! and lazily, so the daemon starts (and answers health checks) even while the
//! pipeline database does not exist yet.

use super::{CounterSource, FilterValue, RecordFilter};
use crate::config::is_identifier;
use crate::error::{MonitorError, Result};
use crate::metrics::Collection;
use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteArguments, SqlitePool, SqlitePoolOptions};
use sqlx::query::QueryScalar;
use sqlx::ConnectOptions;
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

/// Counter source reading one table per collection.
#[derive(Clone)]
pub struct SqliteCounterSource {
    pool: SqlitePool,
}

impl SqliteCounterSource {
    /// Open the pipeline database at `path` without creating it.
    pub fn open(path: impl AsRef<Path>, acquire_timeout: Duration) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .read_only(true)
            .create_if_missing(false)
            .log_statements(tracing::log::LevelFilter::Debug);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(acquire_timeout)
            .connect_lazy_with(options);

        Self { pool }
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn where_clause(collection: Collection, filter: &RecordFilter) -> Result<String> {
        if filter.is_empty() {
            return Ok(String::new());
        }

        let mut parts = Vec::with_capacity(filter.conditions().len());
        for (field, _) in filter.conditions() {
            if !is_identifier(field) {
                return Err(MonitorError::SourceUnavailable {
                    collection: collection.to_string(),
                    reason: format!("invalid filter field '{}'", field),
                });
            }
            parts.push(format!("{} = ?", field));
        }
        Ok(format!(" WHERE {}", parts.join(" AND ")))
    }

    fn bind_filter<'q, O>(
        mut query: QueryScalar<'q, Sqlite, O, SqliteArguments<'q>>,
        filter: &'q RecordFilter,
    ) -> QueryScalar<'q, Sqlite, O, SqliteArguments<'q>> {
        for (_, value) in filter.conditions() {
            query = match value {
                FilterValue::Text(s) => query.bind(s.as_str()),
                FilterValue::Integer(i) => query.bind(*i),
            };
        }
        query
    }

    fn unavailable(collection: Collection, err: sqlx::Error) -> MonitorError {
        MonitorError::SourceUnavailable {
            collection: collection.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl CounterSource for SqliteCounterSource {
    #[instrument(skip(self, filter))]
    async fn count(&self, collection: Collection, filter: &RecordFilter) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            collection.as_str(),
            Self::where_clause(collection, filter)?
        );

        let count: i64 = Self::bind_filter(sqlx::query_scalar(&sql), filter)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::unavailable(collection, e))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    #[instrument(skip(self, filter))]
    async fn sum(&self, collection: Collection, field: &str, filter: &RecordFilter) -> Result<f64> {
        if !is_identifier(field) {
            return Err(MonitorError::SourceUnavailable {
                collection: collection.to_string(),
                reason: format!("invalid aggregate field '{}'", field),
            });
        }

        // TOTAL() is always REAL and yields 0.0 over an empty table
        let sql = format!(
            "SELECT TOTAL({}) FROM {}{}",
            field,
            collection.as_str(),
            Self::where_clause(collection, filter)?
        );

        Self::bind_filter(sqlx::query_scalar(&sql), filter)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::unavailable(collection, e))
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
