//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxit_requests_successful_total` (counter): mirrors the dashboard
//!   success counter
//! - `proxit_requests_errored_total` (counter): mirrors the dashboard error
//!   counter
//! - `proxit_requests_total` (counter): requests by outcome and status
//! - `proxit_request_duration_seconds` (histogram): latency by outcome
//!
//! # Design Decisions
//! - The `metrics` macros are no-ops until an exporter is installed, so the
//!   request path records unconditionally
//! - The Prometheus endpoint is opt-in

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_success() {
    counter!("proxit_requests_successful_total").increment(1);
}

pub fn record_error() {
    counter!("proxit_requests_errored_total").increment(1);
}

/// Record a finished request. `outcome` is one of `forwarded`,
/// `not_found` or `dashboard`.
pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    counter!(
        "proxit_requests_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxit_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}
