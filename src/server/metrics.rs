use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

use crate::download_queue::{EntityKind, QueueCounts};

/// Metric name prefix for all queue server metrics
const PREFIX: &str = "orpheus_queue";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Queue Metrics
    pub static ref QUEUE_ENTRIES: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_entries"), "Entries currently queued"),
        &["kind"]
    ).expect("Failed to create entries metric");

    // Scheduler Metrics
    pub static ref SCHEDULER_DISPATCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_scheduler_dispatches_total"),
            "Completed downloader dispatches"
        ),
        &["kind", "outcome"]
    ).expect("Failed to create scheduler_dispatches_total metric");

    pub static ref SCHEDULER_CAPTCHA_RETRIES_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_scheduler_captcha_retries_total"),
        "Dispatches retried because of a captcha challenge"
    ).expect("Failed to create scheduler_captcha_retries_total metric");
}

pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(QUEUE_ENTRIES.clone()));
    let _ = REGISTRY.register(Box::new(SCHEDULER_DISPATCHES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SCHEDULER_CAPTCHA_RETRIES_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Publish queue sizes
pub fn set_queue_counts(counts: &QueueCounts) {
    for kind in EntityKind::ALL {
        QUEUE_ENTRIES
            .with_label_values(&[kind.as_str()])
            .set(counts.get(kind) as f64);
    }
}

/// Record an HTTP request
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, endpoint])
        .observe(duration.as_secs_f64());
}

/// Record a finished dispatch, `outcome` is "success" or "failure"
pub fn record_dispatch(kind: EntityKind, outcome: &str) {
    SCHEDULER_DISPATCHES_TOTAL
        .with_label_values(&[kind.as_str(), outcome])
        .inc();
}

pub fn record_captcha_retry() {
    SCHEDULER_CAPTCHA_RETRIES_TOTAL.inc();
}

/// Collapses a request path into a low-cardinality label.
pub fn categorize_endpoint(path: &str) -> &'static str {
    if path.starts_with("/api/queue") {
        "queue"
    } else if path.ends_with("-search") {
        "search"
    } else if path.ends_with("-select") {
        "select"
    } else if path.starts_with("/photos/") || path.starts_with("/api/photos") {
        "photos"
    } else if path == "/api/status" {
        "status"
    } else if path == "/metrics" {
        "metrics"
    } else if path.starts_with("/api/") {
        "api_other"
    } else {
        "static"
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
