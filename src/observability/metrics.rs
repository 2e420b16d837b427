//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_http_requests_total` (counter): requests by method, status
//! - `guard_http_request_duration_seconds` (histogram): handler latency
//! - `guard_rate_limit_decisions_total` (counter): by prefix, outcome
//! - `guard_rate_limit_store_errors_total` (counter): by prefix
//! - `guard_url_rejections_total` (counter): by reason
//! - `guard_csrf_rejections_total` (counter)
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus recorder.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "guard_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("guard_http_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limit_decision(prefix: &str, allowed: bool) {
    let outcome = if allowed { "allowed" } else { "denied" };
    metrics::counter!(
        "guard_rate_limit_decisions_total",
        "prefix" => prefix.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_rate_limit_store_error(prefix: &str) {
    metrics::counter!("guard_rate_limit_store_errors_total", "prefix" => prefix.to_string())
        .increment(1);
}

pub fn record_url_rejection(reason: &'static str) {
    metrics::counter!("guard_url_rejections_total", "reason" => reason).increment(1);
}

pub fn record_csrf_rejection() {
    metrics::counter!("guard_csrf_rejections_total").increment(1);
}
