//! Centralized path configuration for clonemon.
//!
//! All data paths should go through this module so the daemon and its tests
//! agree on where databases and configuration live.

use std::path::PathBuf;

/// Get the clonemon data directory.
///
/// Resolution order:
/// 1. `CLONEMON_DATA_DIR` environment variable
/// 2. `/var/lib/clonemon` if it exists (system install)
/// 3. `~/.clonemon` for user-only installs
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CLONEMON_DATA_DIR") {
        return PathBuf::from(dir);
    }

    let system_dir = PathBuf::from("/var/lib/clonemon");
    if system_dir.exists() {
        return system_dir;
    }

    dirs::home_dir().map(|h| h.join(".clonemon")).unwrap_or(system_dir)
}

/// Get the configuration directory.
///
/// `CLONEMON_CONFIG_DIR` wins, then the platform config dir, then the data dir.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CLONEMON_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    dirs::config_dir().map(|c| c.join("clonemon")).unwrap_or_else(data_dir)
}

/// Get the history database path.
pub fn history_db_path() -> PathBuf {
    data_dir().join("history.db")
}

/// Get the default path of the clone-detector pipeline database.
pub fn source_db_path() -> PathBuf {
    data_dir().join("clone-detector.db")
}
