use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all kanban MCP metrics
const PREFIX: &str = "kanban_mcp";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Request Metrics
    pub static ref REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_requests_total"), "Total number of MCP requests"),
        &["method", "outcome"]
    ).expect("Failed to create requests_total metric");

    pub static ref REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_request_duration_seconds"),
            "MCP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["method"]
    ).expect("Failed to create request_duration_seconds metric");

    // Connection Metrics
    pub static ref ACTIVE_CONNECTIONS: Gauge = Gauge::new(
        format!("{PREFIX}_active_connections"),
        "Number of open MCP connections"
    ).expect("Failed to create active_connections metric");

    pub static ref CONNECTION_REJECTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_connection_rejections_total"),
            "MCP connections refused at handshake"
        ),
        &["reason"]
    ).expect("Failed to create connection_rejections_total metric");

    // Rate Limiting Metrics
    pub static ref RATE_LIMIT_HITS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_rate_limit_hits_total"), "Rate limit violations"),
        &["category"]
    ).expect("Failed to create rate_limit_hits_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ACTIVE_CONNECTIONS.clone()));
    let _ = REGISTRY.register(Box::new(CONNECTION_REJECTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RATE_LIMIT_HITS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record one handled MCP frame
pub fn record_request(method: &str, outcome: &str, duration: Duration) {
    REQUESTS_TOTAL.with_label_values(&[method, outcome]).inc();

    REQUEST_DURATION_SECONDS
        .with_label_values(&[method])
        .observe(duration.as_secs_f64());
}

pub fn connection_opened() {
    ACTIVE_CONNECTIONS.inc();
}

pub fn connection_closed() {
    ACTIVE_CONNECTIONS.dec();
}

/// Record a connection refused before upgrade
pub fn record_connection_rejection(reason: &str) {
    CONNECTION_REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a rate limit hit
pub fn record_rate_limit_hit(category: &str) {
    RATE_LIMIT_HITS_TOTAL.with_label_values(&[category]).inc();
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
