//! Metrics and observability utilities
//!
//! Prometheus metrics for the paper workflow, all under one prefix.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::{Duration, Instant};

/// Metrics prefix for all ExamFlow metrics
pub const METRICS_PREFIX: &str = "examflow";

/// Histogram buckets for request and transition latency (in seconds).
/// Attachment writes dominate the upper range.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Paper actions by outcome"
    );

    describe_histogram!(
        format!("{}_transition_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Paper action latency in seconds, attachment I/O included"
    );

    describe_counter!(
        format!("{}_papers_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total papers created"
    );

    describe_counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        Unit::Count,
        "Change events published"
    );

    describe_counter!(
        format!("{}_orphaned_blobs_total", METRICS_PREFIX),
        Unit::Count,
        "Attachment blobs whose cleanup failed"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// `outcome` is one of `ok`, `denied`, `invalid`, `error`
pub fn record_transition(action: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!(
        format!("{}_transitions_total", METRICS_PREFIX),
        "action" => action,
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        format!("{}_transition_duration_seconds", METRICS_PREFIX),
        "action" => action
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_paper_created() {
    counter!(format!("{}_papers_created_total", METRICS_PREFIX)).increment(1);
}

pub fn record_notification(event: &'static str) {
    counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        "event" => event
    )
    .increment(1);
}

pub fn record_orphaned_blob() {
    counter!(format!("{}_orphaned_blobs_total", METRICS_PREFIX)).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every call is a no-op
        let metrics = RequestMetrics::start("PATCH", "/api/papers/{id}/submit");
        metrics.finish(200);
        record_transition("submit", "ok", Duration::from_millis(3));
        record_paper_created();
        record_notification("paperUpdated");
        record_orphaned_blob();
    }
}
