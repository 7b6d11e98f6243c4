//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Wallet requests
//! - Submissions and confirmation latency
//! - Failures by operation and kind
//! - History size and pending confirmations

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref WALLET_REQUESTS: CounterVec = register_counter_vec!(
        "wallet_session_wallet_requests_total",
        "Wallet JSON-RPC requests by method",
        &["method"]
    ).unwrap();

    pub static ref SUBMISSIONS: CounterVec = register_counter_vec!(
        "wallet_session_submissions_total",
        "Confirmed transaction submissions",
        &[]
    ).unwrap();

    pub static ref FAILURES: CounterVec = register_counter_vec!(
        "wallet_session_failures_total",
        "Failed session operations by operation and error kind",
        &["operation", "kind"]
    ).unwrap();

    pub static ref HISTORY_SIZE: Gauge = register_gauge!(
        "wallet_session_history_size",
        "Transfers returned by the last history refresh"
    ).unwrap();

    pub static ref PENDING_CONFIRMATIONS: Gauge = register_gauge!(
        "wallet_session_pending_confirmations",
        "Submissions awaiting confirmation (0=idle)"
    ).unwrap();

    pub static ref CONFIRMATION_LATENCY: Histogram = register_histogram!(
        "wallet_session_confirmation_latency_seconds",
        "Time spent waiting for record confirmation",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_wallet_request(method: &str) {
    WALLET_REQUESTS.with_label_values(&[method]).inc();
}

pub fn record_submission() {
    SUBMISSIONS.with_label_values(&[]).inc();
}

pub fn record_failure(operation: &str, kind: &str) {
    FAILURES.with_label_values(&[operation, kind]).inc();
}

pub fn record_history_size(size: usize) {
    HISTORY_SIZE.set(size as f64);
}

pub fn record_pending(pending: usize) {
    PENDING_CONFIRMATIONS.set(pending as f64);
}

pub fn record_confirmation_latency(latency_secs: f64) {
    CONFIRMATION_LATENCY.observe(latency_secs);
}
