//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count requests received and responses sent, per status code
//! - Accumulate processing time in microseconds
//! - Mirror the counters into the `metrics` facade for Prometheus
//!
//! # Metrics
//! - `api_requests_total` (counter): responses by method, status
//! - `api_request_duration_seconds` (histogram): latency distribution
//! - `api_rate_limited_total` (counter): rate-limit rejections
//! - `api_panics_total` (counter): recovered handler panics
//! - `api_rate_limiter_clients` (gauge): clients tracked after each sweep
//!
//! # Design Decisions
//! - Process counters live in [`MetricsState`], injected into the chain at
//!   build time; there is no reset
//! - Every counter is an atomic; no registry-wide lock

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use dashmap::DashMap;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;

/// Process-wide request/response counters.
#[derive(Debug, Default)]
pub struct MetricsState {
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    processing_time_us: AtomicU64,
    responses_by_status: DashMap<u16, AtomicU64>,
}

/// Point-in-time copy of [`MetricsState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests_received: u64,
    pub total_responses_sent: u64,
    pub total_processing_time_us: u64,
    pub total_responses_sent_by_status: BTreeMap<u16, u64>,
}

impl MetricsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self, status: StatusCode, elapsed: Duration) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        self.responses_by_status
            .entry(status.as_u16())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.processing_time_us.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn requests_received(&self) -> u64 {
        self.requests_received.load(Ordering::Relaxed)
    }

    pub fn responses_sent(&self) -> u64 {
        self.responses_sent.load(Ordering::Relaxed)
    }

    pub fn responses_with_status(&self, status: StatusCode) -> u64 {
        self.responses_by_status
            .get(&status.as_u16())
            .map(|r| r.value().load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests_received: self.requests_received(),
            total_responses_sent: self.responses_sent(),
            total_processing_time_us: self.processing_time_us.load(Ordering::Relaxed),
            total_responses_sent_by_status: self
                .responses_by_status
                .iter()
                .map(|r| (*r.key(), r.value().load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

/// Middleware counting every request that enters the chain below it.
///
/// The status observed is the one on the response the inner stages return,
/// which is 200 unless a stage set something else.
pub async fn track_metrics(
    State(state): State<Arc<MetricsState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    state.record_received();
    let method = request.method().clone();

    let response = next.run(request).await;

    let status = response.status();
    state.record_sent(status, start.elapsed());
    record_request(method.as_str(), status.as_u16(), start);
    response
}

/// Handler returning the current counters as JSON.
pub async fn debug_vars(State(state): State<Arc<MetricsState>>) -> Json<MetricsSnapshot> {
    Json(state.snapshot())
}

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "api_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("api_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    metrics::counter!("api_rate_limited_total").increment(1);
}

pub fn record_panic() {
    metrics::counter!("api_panics_total").increment(1);
}

pub fn record_tracked_clients(count: usize) {
    metrics::gauge!("api_rate_limiter_clients").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let state = MetricsState::new();

        state.record_received();
        state.record_received();
        state.record_sent(StatusCode::OK, Duration::from_micros(150));
        state.record_sent(StatusCode::TOO_MANY_REQUESTS, Duration::from_micros(50));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.total_requests_received, 2);
        assert_eq!(snapshot.total_responses_sent, 2);
        assert_eq!(snapshot.total_processing_time_us, 200);
        assert_eq!(snapshot.total_responses_sent_by_status[&200u16], 1);
        assert_eq!(snapshot.total_responses_sent_by_status[&429u16], 1);
        assert_eq!(state.responses_with_status(StatusCode::NOT_FOUND), 0);
    }

    #[test]
    fn test_snapshot_serializes_status_keys_as_strings() {
        let state = MetricsState::new();
        state.record_received();
        state.record_sent(StatusCode::CREATED, Duration::ZERO);

        let json = serde_json::to_value(state.snapshot()).unwrap();
        assert_eq!(json["total_responses_sent_by_status"]["201"], 1);
        assert_eq!(json["total_requests_received"], 1);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_consistent() {
        let state = Arc::new(MetricsState::new());
        let mut handles = Vec::new();

        for i in 0..16u64 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    state.record_received();
                    let status = if i % 2 == 0 { StatusCode::OK } else { StatusCode::UNAUTHORIZED };
                    state.record_sent(status, Duration::from_micros(1));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = state.snapshot();
        assert_eq!(snapshot.total_requests_received, 1600);
        assert_eq!(snapshot.total_responses_sent, 1600);
        assert_eq!(snapshot.total_responses_sent_by_status.values().sum::<u64>(), 1600);
        assert_eq!(snapshot.total_processing_time_us, 1600);
    }
}
