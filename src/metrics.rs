//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sublinks_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "sublinks_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Queue Metrics
    pub static ref QUEUE_MESSAGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sublinks_queue_messages_total", "Total number of queue deliveries by outcome"),
        &["routing_key", "outcome"]
    ).expect("metric can be created");
    pub static ref QUEUE_PROCESSING_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sublinks_queue_processing_errors_total",
            "Total number of worker processing failures"
        ),
        &["kind"]
    ).expect("metric can be created");
    pub static ref QUEUE_PROCESSING_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "sublinks_queue_processing_duration_seconds",
            "Worker processing duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["routing_key"]
    ).expect("metric can be created");
    pub static ref QUEUE_ACK_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "sublinks_queue_ack_failures_total",
        "Total number of failed Ack/Nack calls"
    ).expect("metric can be created");
    pub static ref QUEUE_RECONNECTS_TOTAL: IntCounter = IntCounter::new(
        "sublinks_queue_reconnects_total",
        "Total number of consumer reconnect attempts"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sublinks_errors_total", "Total number of errors returned to HTTP clients"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(register_all);
}

fn register_all() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(QUEUE_MESSAGES_TOTAL.clone()))
        .expect("QUEUE_MESSAGES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(QUEUE_PROCESSING_ERRORS_TOTAL.clone()))
        .expect("QUEUE_PROCESSING_ERRORS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(QUEUE_PROCESSING_DURATION_SECONDS.clone()))
        .expect("QUEUE_PROCESSING_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(QUEUE_ACK_FAILURES_TOTAL.clone()))
        .expect("QUEUE_ACK_FAILURES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(QUEUE_RECONNECTS_TOTAL.clone()))
        .expect("QUEUE_RECONNECTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
