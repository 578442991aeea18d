//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with latency-aligned histograms
//! and standardized naming conventions.

use crate::pipeline::StageStats;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all AnswerForge metrics
pub const METRICS_PREFIX: &str = "answerforge";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for pipeline and stage latency (dominated by upstream calls)
pub const PIPELINE_BUCKETS: &[f64] = &[
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s
    30.00,  // 30s
    60.00,  // 60s
    120.0,  // 2min
];

pub fn request_duration_metric() -> String {
    format!("{}_request_duration_seconds", METRICS_PREFIX)
}

pub fn pipeline_duration_metric() -> String {
    format!("{}_pipeline_duration_seconds", METRICS_PREFIX)
}

pub fn stage_duration_metric() -> String {
    format!("{}_stage_duration_seconds", METRICS_PREFIX)
}

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        request_duration_metric(),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Pipeline metrics
    describe_counter!(
        format!("{}_pipeline_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Pipeline runs by outcome"
    );

    describe_histogram!(
        pipeline_duration_metric(),
        Unit::Seconds,
        "End-to-end pipeline latency in seconds"
    );

    describe_gauge!(
        format!("{}_candidates_returned", METRICS_PREFIX),
        Unit::Count,
        "Candidates returned by the last successful run"
    );

    // Stage metrics
    describe_counter!(
        format!("{}_stage_items_total", METRICS_PREFIX),
        Unit::Count,
        "Fan-out items by stage and status"
    );

    describe_histogram!(
        stage_duration_metric(),
        Unit::Seconds,
        "Fan-out stage latency in seconds"
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
            request_duration_metric(),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record one fan-out stage
pub fn record_stage(stage: &'static str, stats: &StageStats) {
    let timed_out = stats.timed_out as u64;
    let failed = (stats.failed - stats.timed_out) as u64;

    for (status, count) in [
        ("success", stats.succeeded as u64),
        ("error", failed),
        ("timeout", timed_out),
    ] {
        if count > 0 {
            counter!(
                format!("{}_stage_items_total", METRICS_PREFIX),
                "stage" => stage,
                "status" => status
            )
            .increment(count);
        }
    }

    histogram!(stage_duration_metric(), "stage" => stage).record(stats.elapsed_ms as f64 / 1000.0);
}

/// Helper to record a finished pipeline run
pub fn record_pipeline(outcome: &'static str, duration_secs: f64, candidates: usize) {
    counter!(
        format!("{}_pipeline_runs_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(pipeline_duration_metric()).record(duration_secs);

    if outcome == "success" {
        gauge!(format!("{}_candidates_returned", METRICS_PREFIX)).set(candidates as f64);
    }
}
