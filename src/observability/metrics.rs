//! Metrics collection and exposition.
//!
//! # Metrics
//! - `livenessd_liveness_checks_total` (counter): checks by verdict
//! - `livenessd_leniency_grants_total` (counter): checks passed on leniency
//! - `livenessd_oom_sweeps_total` (counter): sweeps by outcome
//! - `livenessd_memory_available_bytes` (gauge): last MemAvailable reading
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_liveness(verdict: &'static str) {
    counter!("livenessd_liveness_checks_total", "verdict" => verdict).increment(1);
}

pub fn record_leniency_grant() {
    counter!("livenessd_leniency_grants_total").increment(1);
}

pub fn record_sweep(outcome: &'static str) {
    counter!("livenessd_oom_sweeps_total", "outcome" => outcome).increment(1);
}

pub fn record_memory_available(bytes: u64) {
    gauge!("livenessd_memory_available_bytes").set(bytes as f64);
}
