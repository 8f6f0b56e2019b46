//! Database migrations for the history database.

use crate::error::{MonitorError, Result};
use sqlx::SqlitePool;
use tracing::{info, instrument};

const SCHEMA_VERSION: i64 = 1;

#[instrument(skip(pool))]
pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| MonitorError::MigrationFailed { reason: e.to_string() })?;

    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(pool)
            .await
            .map_err(|e| MonitorError::MigrationFailed { reason: e.to_string() })?;

    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    info!("Migrating database from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        migrate_to_v1(pool).await?;
    }

    Ok(())
}

/// Schema version 1: append-only `historical_counts`.
///
/// `seq` carries append order; `id` is the opaque identifier handed to clients.
#[instrument(skip(pool))]
async fn migrate_to_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration to schema version 1");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS historical_counts (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            timestamp_ms INTEGER NOT NULL,
            files INTEGER NOT NULL,
            chunks INTEGER NOT NULL,
            candidates INTEGER NOT NULL,
            clones INTEGER NOT NULL,
            clones_size REAL NOT NULL,
            chunks_per_file REAL NOT NULL,
            timings TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| MonitorError::MigrationFailed { reason: e.to_string() })?;

    // Range reads
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_historical_counts_time ON historical_counts(timestamp_ms)",
    )
    .execute(pool)
    .await
    .map_err(|e| MonitorError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("DELETE FROM schema_version")
        .execute(pool)
        .await
        .map_err(|e| MonitorError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(1i64)
        .execute(pool)
        .await
        .map_err(|e| MonitorError::MigrationFailed { reason: e.to_string() })?;

    info!("Migration to schema version 1 complete");
    Ok(())
}
