//! Metrics collection and exposition.
//!
//! # Metrics
//! - `vhost_dns_queries_total` (counter): DNS messages by outcome, questions by ownership
//! - `vhost_dns_upstream_failures_total` (counter): forwarded questions with no answer
//! - `vhost_http_requests_total` (counter): HTTP requests by outcome and status
//! - `vhost_http_request_duration_seconds` (histogram): end-to-end HTTP latency
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(%addr, "Prometheus metrics exporter started");
    Ok(())
}

/// One DNS datagram handled: `answered`, `empty` or `malformed`.
pub fn record_dns_message(kind: &'static str) {
    counter!("vhost_dns_queries_total", "kind" => kind).increment(1);
}

/// One question classified as `owned` or `foreign`.
pub fn record_dns_question(kind: &'static str) {
    counter!("vhost_dns_queries_total", "kind" => kind).increment(1);
}

pub fn record_upstream_failure() {
    counter!("vhost_dns_upstream_failures_total").increment(1);
}

/// One HTTP request finished with `outcome` (`proxied`, `directory`, `refused`, `error`).
pub fn record_http_request(outcome: &'static str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("vhost_http_requests_total", "outcome" => outcome, "status" => status).increment(1);
    histogram!("vhost_http_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}
