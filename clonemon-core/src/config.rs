//! Configuration management.

use crate::error::{MonitorError, Result};
use crate::paths;
use crate::ports;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persistent configuration for the monitor daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    /// Port of the Prometheus exporter; 0 disables it.
    pub metrics_port: u16,
    pub sample_interval_secs: u64,
    pub query_timeout_secs: u64,
    pub source_db_path: String,
    pub history_db_path: String,
    /// Numeric column summed across clone records to produce `clones_size`.
    pub clones_size_field: String,
    pub record_timings: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", ports::PORT_MONITOR_HTTP),
            metrics_port: ports::PORT_MONITOR_METRICS,
            sample_interval_secs: 60,
            query_timeout_secs: 10,
            source_db_path: paths::source_db_path().to_string_lossy().to_string(),
            history_db_path: paths::history_db_path().to_string_lossy().to_string(),
            clones_size_field: "size".to_string(),
            record_timings: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_dir().join("config.json")
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the file is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| MonitorError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| MonitorError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Apply `CLONEMON_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("CLONEMON_SOURCE_DB") {
            self.source_db_path = v;
        }
        if let Ok(v) = std::env::var("CLONEMON_HISTORY_DB") {
            self.history_db_path = v;
        }
        if let Ok(v) = std::env::var("CLONEMON_LISTEN") {
            self.listen_addr = v;
        }
        self
    }

    /// Reject values the sampler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_secs == 0 {
            return Err(MonitorError::InvalidConfig {
                reason: "sample_interval_secs must be greater than zero".to_string(),
            });
        }
        if self.query_timeout_secs == 0 {
            return Err(MonitorError::InvalidConfig {
                reason: "query_timeout_secs must be greater than zero".to_string(),
            });
        }
        if !is_identifier(&self.clones_size_field) {
            return Err(MonitorError::InvalidConfig {
                reason: format!(
                    "clones_size_field '{}' is not a column name",
                    self.clones_size_field
                ),
            });
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// Plain SQL identifier: ASCII letter or underscore, then letters, digits, underscores.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_interval(), Duration::from_secs(60));
        assert_eq!(config.clones_size_field, "size");
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = Config { sample_interval_secs: 0, ..Config::default() };
        assert!(matches!(config.validate(), Err(MonitorError::InvalidConfig { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_field() {
        let config = Config {
            clones_size_field: "size; DROP TABLE clones".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("size"));
        assert!(is_identifier("_line_count2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2size"));
        assert!(!is_identifier("a-b"));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"sample_interval_secs": 5, "clones_size_field": "lines"}"#)
            .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.sample_interval_secs, 5);
        assert_eq!(config.clones_size_field, "lines");
        assert_eq!(config.query_timeout_secs, 10);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(MonitorError::InvalidConfig { .. })));
    }
}
