//! Metrics collection and exposition.
//!
//! # Metrics
//! - `nutri_requests_total` (counter): requests by route, status
//! - `nutri_request_duration_seconds` (histogram): latency by route
//! - `nutri_rate_limited_total` (counter): rejections by scope
//! - `nutri_security_violations_total` (counter): rejections by reason
//! - `nutri_upstream_errors_total` (counter): completion provider failures
//! - `nutri_store_entries` (gauge): live entries per limiter/suspicion store

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics endpoint listening");
    Ok(())
}

/// Record a completed request.
pub fn record_request(route: &str, status: u16, start: Instant) {
    let route = route.to_string();
    ::metrics::counter!(
        "nutri_requests_total",
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("nutri_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(scope: &'static str) {
    ::metrics::counter!("nutri_rate_limited_total", "scope" => scope).increment(1);
}

pub fn record_security_violation(reason: &'static str) {
    ::metrics::counter!("nutri_security_violations_total", "reason" => reason).increment(1);
}

pub fn record_upstream_error() {
    ::metrics::counter!("nutri_upstream_errors_total").increment(1);
}

pub fn record_store_size(store: &'static str, entries: usize) {
    ::metrics::gauge!("nutri_store_entries", "store" => store).set(entries as f64);
}
