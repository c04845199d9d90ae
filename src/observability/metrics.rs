//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_admissions_total` (counter): admission outcomes by `outcome`
//! - `gateway_deliveries_total` (counter): per-recipient sends by `result`
//! - `gateway_active_sessions` (gauge): registered sessions
//! - `gateway_admin_requests_total` (counter): admin calls by `operation`
//! - `gateway_admin_request_duration_seconds` (histogram): admin latency
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests free of global state

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_admission(outcome: &'static str) {
    counter!("gateway_admissions_total", "outcome" => outcome).increment(1);
}

pub fn record_delivery(result: &'static str) {
    counter!("gateway_deliveries_total", "result" => result).increment(1);
}

pub fn set_active_sessions(count: usize) {
    gauge!("gateway_active_sessions").set(count as f64);
}

pub fn record_admin_request(operation: &'static str, start: Instant) {
    counter!("gateway_admin_requests_total", "operation" => operation).increment(1);
    histogram!("gateway_admin_request_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}
