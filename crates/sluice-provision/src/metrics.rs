//! Provisioner metrics.
//!
//! Counters and histograms for facade operations and failing cloud calls.
//! Recording is a no-op until a `metrics` recorder is installed.

use metrics::{counter, describe_counter, describe_histogram, histogram};

// ============================================================================
// Operation Metrics
// ============================================================================

/// Facade operations counter, labelled by operation, kind and outcome.
pub const OPERATIONS_TOTAL: &str = "sluice_operations_total";

/// Facade operation duration histogram.
pub const OPERATION_DURATION: &str = "sluice_operation_duration_seconds";

// ============================================================================
// Cloud Call Metrics
// ============================================================================

/// Failed cloud calls counter, labelled by call.
pub const CLOUD_CALL_FAILURES: &str = "sluice_cloud_call_failures_total";

// ============================================================================
// Metric Registration
// ============================================================================

/// Registers all provisioner metric descriptions.
///
/// Call this once at application startup after initializing the metrics recorder.
pub fn register_metrics() {
    describe_counter!(OPERATIONS_TOTAL, "Total provisioner operations by outcome");
    describe_histogram!(
        OPERATION_DURATION,
        "Duration of provisioner operations in seconds"
    );
    describe_counter!(CLOUD_CALL_FAILURES, "Total failed warehouse and registry calls");
}

// ============================================================================
// Metric Recording
// ============================================================================

/// Records the completion of a facade operation.
pub fn record_operation(operation: &str, kind: &str, outcome: &str, duration_secs: f64) {
    counter!(
        OPERATIONS_TOTAL,
        "operation" => operation.to_string(),
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!(
        OPERATION_DURATION,
        "operation" => operation.to_string(),
        "kind" => kind.to_string()
    )
    .record(duration_secs);
}

/// Records a failed cloud call.
pub fn record_cloud_call_failure(call: &str) {
    counter!(CLOUD_CALL_FAILURES, "call" => call.to_string()).increment(1);
}
