//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_invocations_total` (counter): invocations by outcome
//! - `bridge_invocation_duration_seconds` (histogram): end-to-end latency
//! - `bridge_server_binds_total` (counter): successful bind+listen sequences
//! - `bridge_server_restarts_total` (counter): conflict-driven address changes
//! - `bridge_server_listening` (gauge): 1 while the backing server listens
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing for it.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished invocation.
pub fn record_invocation(outcome: &'static str, start: Instant) {
    metrics::counter!("bridge_invocations_total", "outcome" => outcome).increment(1);
    metrics::histogram!("bridge_invocation_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_bind() {
    metrics::counter!("bridge_server_binds_total").increment(1);
}

pub fn record_restart() {
    metrics::counter!("bridge_server_restarts_total").increment(1);
}

pub fn set_listening(listening: bool) {
    metrics::gauge!("bridge_server_listening").set(if listening { 1.0 } else { 0.0 });
}
