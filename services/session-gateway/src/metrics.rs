//! Prometheus metrics exposition
//!
//! - `gateway_requests_total` (counter): labels `route`, `method`, `status`
//! - `gateway_request_duration_seconds` (histogram): label `route`
//! - `gateway_upstream_errors_total` (counter): label `error_type`
//! - `gateway_session_registration_failures_total` (counter): label `reason`
//! - `gateway_session_rejections_total` (counter): label `reason`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::{MatchedPath, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::{Instrument, info_span};

const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

fn builder() -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("gateway_request_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )
        .context("failed to set histogram buckets")
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Counters surfaced by `/health`.
#[derive(Debug)]
pub struct ServiceStats {
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
    pub started_at: Instant,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }
}

pub fn record_request(route: &str, method: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(duration_secs);
}

pub fn record_upstream_error(error_type: &'static str) {
    metrics::counter!("gateway_upstream_errors_total", "error_type" => error_type).increment(1);
}

pub fn record_registration_failure(reason: &'static str) {
    metrics::counter!("gateway_session_registration_failures_total", "reason" => reason)
        .increment(1);
}

pub fn record_session_rejection(reason: &'static str) {
    metrics::counter!("gateway_session_rejections_total", "reason" => reason).increment(1);
}

/// Route-level middleware: tags each request with an id, wraps it in a span,
/// and records its outcome.
pub async fn track_requests(
    State(stats): State<Arc<ServiceStats>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let span = info_span!("request", request_id = %request_id, method = %method, route = %route);
    let mut response = next.run(request).instrument(span).await;

    let status = response.status();
    stats.requests_total.fetch_add(1, Ordering::Relaxed);
    if status.is_server_error() {
        stats.errors_total.fetch_add(1, Ordering::Relaxed);
    }
    record_request(&route, &method, status.as_u16(), started.elapsed().as_secs_f64());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}
