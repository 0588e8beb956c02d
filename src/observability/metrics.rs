//! Metrics collection and exposition.
//!
//! # Metrics
//! - `echo_stream_uploads_total` (counter): uploads by outcome
//! - `echo_stream_upload_bytes_total` (counter): bytes drained from uploads
//! - `echo_stream_downloads_total` (counter): downloads by outcome
//! - `echo_stream_download_bytes_total` (counter): bytes handed to the transport
//! - `echo_stream_health_checks_total` (counter): liveness probes served
//! - `echo_stream_active_connections` (gauge): open client connections
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_upload(outcome: &'static str, bytes: u64) {
    counter!("echo_stream_uploads_total", "outcome" => outcome).increment(1);
    counter!("echo_stream_upload_bytes_total").increment(bytes);
}

pub fn record_download(outcome: &'static str, bytes: u64) {
    counter!("echo_stream_downloads_total", "outcome" => outcome).increment(1);
    counter!("echo_stream_download_bytes_total").increment(bytes);
}

pub fn record_health_check() {
    counter!("echo_stream_health_checks_total").increment(1);
}

pub fn set_active_connections(count: u64) {
    gauge!("echo_stream_active_connections").set(count as f64);
}
