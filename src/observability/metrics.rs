//! Metrics collection and exposition.
//!
//! # Metrics
//! - `consensus_latest_block`, `consensus_safe_block`, `consensus_finalized_block` (gauges)
//! - `consensus_group_size` (gauge): backends currently in agreement
//! - `consensus_fallback_mode` (gauge): 1 while in fallback mode
//! - `backend_banned`, `backend_latest_block`, `backend_peer_count` (gauges, per backend)
//! - `backend_probe_errors_total` (counter, per backend)
//! - `proxy_requests_total` (counter) and `proxy_request_duration_seconds` (histogram)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::consensus::ConsensusSnapshot;
use crate::health::BackendHealth;

/// Install the Prometheus exporter listening on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one backend's health after a probe.
pub fn record_backend_health(backend: &str, health: &BackendHealth) {
    let labels = [("backend", backend.to_string())];
    gauge!("backend_banned", &labels).set(if health.is_banned() { 1.0 } else { 0.0 });
    if let Some(latest) = &health.latest {
        gauge!("backend_latest_block", &labels).set(latest.number.as_u64() as f64);
    }
    if let Some(peers) = health.peer_count {
        gauge!("backend_peer_count", &labels).set(peers as f64);
    }
    if health.last_error.is_some() {
        counter!("backend_probe_errors_total", &labels).increment(1);
    }
}

/// Record a freshly published consensus snapshot.
pub fn record_consensus(snapshot: &ConsensusSnapshot) {
    gauge!("consensus_latest_block").set(snapshot.heights.latest.as_u64() as f64);
    gauge!("consensus_safe_block").set(snapshot.heights.safe.as_u64() as f64);
    gauge!("consensus_finalized_block").set(snapshot.heights.finalized.as_u64() as f64);
    gauge!("consensus_group_size").set(snapshot.consensus_group.len() as f64);
    gauge!("consensus_fallback_mode").set(if snapshot.fallback_mode { 1.0 } else { 0.0 });
}

/// Record a proxied request.
pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("backend", backend.to_string()),
    ];
    counter!("proxy_requests_total", &labels).increment(1);
    histogram!("proxy_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}
