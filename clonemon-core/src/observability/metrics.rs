//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - `_seconds` suffix for histograms measuring duration

use crate::metrics::Counts;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Register all core metrics with descriptions.
///
/// This ensures metrics appear in `/metrics` with proper metadata.
pub fn register_core_metrics() {
    // Cycle metrics
    describe_counter!("clonemon_cycles_total", "Completed sample+append cycles (by trigger)");
    describe_counter!(
        "clonemon_cycle_failures_total",
        "Failed sample+append cycles (by trigger, kind)"
    );
    describe_histogram!(
        "clonemon_cycle_duration_seconds",
        "Sample+append cycle duration (by trigger)"
    );

    // Counter source metrics
    describe_histogram!(
        "clonemon_query_duration_seconds",
        "Counter source query duration (by stage)"
    );
    describe_gauge!("clonemon_collection_records", "Records per collection at the last sample");

    // History metrics
    describe_counter!("clonemon_history_appends_total", "Snapshots appended to history (by store)");
    describe_counter!("clonemon_db_errors_total", "History database failures (by operation)");
}

pub fn record_cycle(trigger: &str, duration_secs: f64) {
    histogram!("clonemon_cycle_duration_seconds", "trigger" => trigger.to_string())
        .record(duration_secs);
    counter!("clonemon_cycles_total", "trigger" => trigger.to_string()).increment(1);
}

pub fn record_cycle_failure(trigger: &str, kind: &str) {
    counter!(
        "clonemon_cycle_failures_total",
        "trigger" => trigger.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

pub fn record_query(stage: &str, duration_secs: f64) {
    histogram!("clonemon_query_duration_seconds", "stage" => stage.to_string())
        .record(duration_secs);
}

pub fn set_collection_records(counts: &Counts) {
    for (collection, count) in counts.iter() {
        gauge!("clonemon_collection_records", "collection" => collection.as_str())
            .set(count as f64);
    }
}
