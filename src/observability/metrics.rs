//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, branch
//! - `proxy_request_duration_seconds` (histogram): time to response head, by branch
//! - `proxy_rewrites_total` (counter): documents rewritten, by format
//! - `proxy_stream_errors_total` (counter): passthrough bodies cut mid-stream
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus endpoint is opt-in

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished proxied request.
pub fn record_request(method: &str, status: u16, branch: &'static str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "branch" => branch
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "branch" => branch)
        .record(start.elapsed().as_secs_f64());
}

/// Record one rewritten document.
pub fn record_rewrite(format: &'static str) {
    counter!("proxy_rewrites_total", "format" => format).increment(1);
}

/// Record a passthrough body that failed mid-stream.
pub fn record_stream_error() {
    counter!("proxy_stream_errors_total").increment(1);
}
