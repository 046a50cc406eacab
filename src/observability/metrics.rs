//! Metrics collection and exposition.
//!
//! # Metrics
//! - `addon_proxy_requests_total` (counter): requests by route and status
//! - `addon_proxy_request_duration_seconds` (histogram): handler latency by route
//! - `addon_proxy_upstream_fetches_total` (counter): fetches by outcome
//! - `addon_proxy_upstream_fetch_duration_seconds` (histogram): fetch latency
//! - `addon_proxy_cache_lookups_total` (counter): cache lookups by state
//! - `addon_proxy_catalog_entries` (gauge): entries in the cached catalog
//! - `addon_proxy_filtered_entries` (histogram): entries served per response

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must run inside the tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    counter!(
        "addon_proxy_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("addon_proxy_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_fetch(outcome: &'static str, start: Instant) {
    counter!("addon_proxy_upstream_fetches_total", "outcome" => outcome).increment(1);
    histogram!("addon_proxy_upstream_fetch_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(state: &'static str) {
    counter!("addon_proxy_cache_lookups_total", "state" => state).increment(1);
}

pub fn record_catalog_size(entries: usize) {
    gauge!("addon_proxy_catalog_entries").set(entries as f64);
}

pub fn record_filtered(entries: usize) {
    histogram!("addon_proxy_filtered_entries").record(entries as f64);
}
