/// Metrics and telemetry for Courtline
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - Waitlist transitions per event kind
/// - Swallowed notification failures
/// - Background job execution

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ========== Waitlist Metrics ==========

    /// Waitlist state transitions by event kind and transition name
    pub static ref WAITLIST_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "waitlist_transitions_total",
        "Total number of waitlist state transitions",
        &["kind", "transition"]
    )
    .unwrap();

    /// Notifications that failed to send and were discarded
    pub static ref NOTIFICATIONS_FAILED_TOTAL: IntCounter = register_int_counter!(
        "notifications_failed_total",
        "Total number of notifications that failed to send"
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration in seconds
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap();
}

/// Record a waitlist transition
pub fn record_transition(kind: &str, transition: &str) {
    WAITLIST_TRANSITIONS_TOTAL
        .with_label_values(&[kind, transition])
        .inc();
}

/// Record a discarded notification failure
pub fn record_notification_failure() {
    NOTIFICATIONS_FAILED_TOTAL.inc();
}

/// Record a background job run
pub fn record_job(job_type: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "failure" };
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration_secs);
}

/// Render all registered metrics in the Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}
