//! Error types for clonemon.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.
//! Every variant is scoped to a single sampling cycle or a single request; none of
//! them is fatal to a running daemon.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for clonemon operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Main error type for clonemon.
#[derive(Error, Debug)]
pub enum MonitorError {
    // Counter source errors
    #[error("Counter source unavailable for {collection}: {reason}")]
    SourceUnavailable { collection: String, reason: String },

    #[error("Counter source query for {collection} timed out after {timeout:?}")]
    SourceTimeout { collection: String, timeout: Duration },

    // History store errors
    #[error("History store unavailable: {0}")]
    StoreUnavailable(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database migration failed: {reason}")]
    MigrationFailed { reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Counter source query failed or timed out.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. } | Self::SourceTimeout { .. })
    }

    /// Append or read against the history store failed.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::SourceTimeout { .. } => "source_timeout",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::DatabaseError(_) => "database",
            Self::MigrationFailed { .. } => "migration",
            Self::InvalidConfig { .. } => "config",
            Self::IoError { .. } => "io",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = MonitorError::SourceTimeout {
            collection: "chunks".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert!(err.is_source_failure());
        assert!(!err.is_store_failure());
        assert_eq!(err.kind(), "source_timeout");

        let err = MonitorError::StoreUnavailable("disk full".to_string());
        assert!(err.is_store_failure());
        assert!(!err.is_source_failure());
    }

    #[test]
    fn test_error_display() {
        let err = MonitorError::SourceUnavailable {
            collection: "files".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Counter source unavailable for files: connection refused");
    }
}
