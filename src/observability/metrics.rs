//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by role, method, status
//! - `relay_request_duration_seconds` (histogram): latency by role, method
//! - `relay_store_operations_total` (counter): store calls by role, op, outcome
//!
//! Recording is a no-op until a recorder is installed, so handlers call these
//! unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

use crate::config::Role;
use crate::observability::TelemetryError;

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), TelemetryError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("relay_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(role: Role, method: &str, status: u16, start: Instant) {
    let latency = start.elapsed().as_secs_f64();

    metrics::counter!(
        "relay_requests_total",
        "role" => role.as_str(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "relay_request_duration_seconds",
        "role" => role.as_str(),
        "method" => method.to_string()
    )
    .record(latency);
}

pub fn record_store_op(role: Role, op: &'static str, outcome: &'static str) {
    metrics::counter!(
        "relay_store_operations_total",
        "role" => role.as_str(),
        "op" => op,
        "outcome" => outcome
    )
    .increment(1);
}

/// Middleware recording one request sample per response.
pub async fn track_metrics(State(role): State<Role>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();

    let response = next.run(req).await;

    record_request(role, &method, response.status().as_u16(), start);
    response
}
