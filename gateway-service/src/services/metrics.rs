use prometheus::{Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static GATE_REJECTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub fn init_metrics() {
    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("http_requests_total metric definition is static");

    let request_duration = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )
    .expect("http_request_duration_seconds metric definition is static");

    let gate_rejections = IntCounterVec::new(
        Opts::new(
            "gateway_gate_rejections_total",
            "Requests rejected by a gateway gate",
        ),
        &["gate"],
    )
    .expect("gateway_gate_rejections_total metric definition is static");

    registry
        .register(Box::new(requests_total.clone()))
        .expect("metrics registered once at startup");
    registry
        .register(Box::new(request_duration.clone()))
        .expect("metrics registered once at startup");
    registry
        .register(Box::new(gate_rejections.clone()))
        .expect("metrics registered once at startup");

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = GATE_REJECTIONS_TOTAL.set(gate_rejections);
}

/// Count a rejection at one of the pipeline's gates
/// (`rate_limit`, `policy`, `token`).
pub fn gate_rejection(gate: &str) {
    if let Some(counter) = GATE_REJECTIONS_TOTAL.get() {
        counter.with_label_values(&[gate]).inc();
    }
}

pub fn get_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return String::new();
    };

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
