//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mobile_proxy_requests_total` (counter): requests by method, status
//! - `mobile_proxy_request_duration_seconds` (histogram): latency distribution
//! - `mobile_view_resolutions_total` (counter): resolved mode by deciding tier
//! - `mobile_redirects_rewritten_total` (counter): upstream redirects sent to the mobile host
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::mobile::Resolution;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!(
        "mobile_proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(
        "mobile_proxy_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_resolution(resolution: &Resolution) {
    counter!(
        "mobile_view_resolutions_total",
        "mode" => resolution.mode.as_str(),
        "decided_by" => resolution.decided_by
    )
    .increment(1);
}

pub fn record_redirect_rewrite() {
    counter!("mobile_redirects_rewritten_total").increment(1);
}
