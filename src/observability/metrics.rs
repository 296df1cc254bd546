//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_connections_total` (counter): accepted connections by handler mode
//! - `balancer_routed_total` (counter): routing decisions by backend
//! - `balancer_connection_errors_total` (counter): aborted connections by error kind
//! - `balancer_task_failures_total` (counter): failed or panicked pool tasks
//! - `balancer_queue_depth` (gauge): tasks waiting in a pool queue
//!
//! Recording goes through the `metrics` facade and is a no-op until an
//! exporter is installed with [`init_metrics`].

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_connection(mode: &'static str) {
    metrics::counter!("balancer_connections_total", "mode" => mode).increment(1);
}

pub fn record_route(backend: &str) {
    metrics::counter!("balancer_routed_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_connection_error(kind: &'static str) {
    metrics::counter!("balancer_connection_errors_total", "kind" => kind).increment(1);
}

pub fn record_task_failure(pool: &str) {
    metrics::counter!("balancer_task_failures_total", "pool" => pool.to_string()).increment(1);
}

pub fn record_queue_depth(pool: &str, depth: usize) {
    metrics::gauge!("balancer_queue_depth", "pool" => pool.to_string()).set(depth as f64);
}
