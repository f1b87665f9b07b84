//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wallet_rpc_requests_total` (counter): RPC calls by method, outcome
//! - `wallet_rpc_rate_limited_total` (counter): calls refused by the token bucket
//! - `wallet_broadcast_total` (counter): broadcast attempts by outcome
//! - `wallet_tx_status_total` (counter): tracker transitions by target status
//! - `wallet_tracked_transactions` (gauge): records held by the tracker

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rpc_call(method: &'static str, outcome: &'static str) {
    counter!("wallet_rpc_requests_total", "method" => method, "outcome" => outcome).increment(1);
}

pub fn record_rate_limited(method: &'static str) {
    counter!("wallet_rpc_rate_limited_total", "method" => method).increment(1);
}

pub fn record_broadcast(outcome: &'static str) {
    counter!("wallet_broadcast_total", "outcome" => outcome).increment(1);
}

pub fn record_status_transition(status: &'static str) {
    counter!("wallet_tx_status_total", "status" => status).increment(1);
}

pub fn record_tracked_count(count: usize) {
    gauge!("wallet_tracked_transactions").set(count as f64);
}
