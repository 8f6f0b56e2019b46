//! clonemon default ports.
//!
//! The HTTP port matches the one the monitor dashboard has always been served on,
//! so existing presentation layers keep working without reconfiguration.

/// HTTP query endpoints (`/data`, `/historical-data`, `/health`)
pub const PORT_MONITOR_HTTP: u16 = 5000;

/// Prometheus /metrics endpoint
pub const PORT_MONITOR_METRICS: u16 = 5001;
