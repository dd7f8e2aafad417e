//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in
//! middleware. Request counts per lifecycle stage are refreshed on each
//! `/metrics` scrape; see the metrics handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::core::Collector;
use prometheus::{Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    requests_by_stage: GaugeVec,
    events_retained: Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("jagedo_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "jagedo_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["method", "path"],
        )?;
        let http_errors_total = IntCounterVec::new(
            Opts::new("jagedo_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )?;
        let requests_by_stage = GaugeVec::new(
            Opts::new("jagedo_requests", "Requests by lifecycle stage"),
            &["stage"],
        )?;
        let events_retained = Gauge::new(
            "jagedo_events_retained",
            "Outbound events held in the in-memory window",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(requests_by_stage.clone()))?;
        registry.register(Box::new(events_retained.clone()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                requests_by_stage,
                events_retained,
            }),
        })
    }

    /// Total request count across all labels.
    pub fn requests(&self) -> u64 {
        sum_counter(&self.inner.http_requests_total)
    }

    /// Total error count across all labels.
    pub fn errors(&self) -> u64 {
        sum_counter(&self.inner.http_errors_total)
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    pub fn requests_by_stage(&self) -> &GaugeVec {
        &self.inner.requests_by_stage
    }

    pub fn events_retained(&self) -> &Gauge {
        &self.inner.events_retained
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

fn sum_counter(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Replace UUID path segments with `{id}` to keep label cardinality bounded.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record_request(
            &method,
            &path,
            response.status().as_u16(),
            start.elapsed().as_secs_f64(),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let m = ApiMetrics::new().unwrap();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.errors(), 0);
    }

    #[test]
    fn errors_are_counted_separately() {
        let m = ApiMetrics::new().unwrap();
        for _ in 0..3 {
            m.record_request("GET", "/v1/requests", 200, 0.01);
        }
        m.record_request("POST", "/v1/requests/{id}/begin", 409, 0.002);
        m.record_request("GET", "/v1/requests/{id}", 404, 0.001);
        assert_eq!(m.requests(), 5);
        assert_eq!(m.errors(), 2);
    }

    #[test]
    fn clone_shares_underlying_counters() {
        let m = ApiMetrics::new().unwrap();
        let clone = m.clone();
        m.record_request("GET", "/v1/events", 200, 0.01);
        assert_eq!(clone.requests(), 1);
    }

    #[test]
    fn gather_and_encode_produces_text() {
        let m = ApiMetrics::new().unwrap();
        m.record_request("GET", "/v1/requests", 200, 0.01);
        m.requests_by_stage().with_label_values(&["BIDDING"]).set(2.0);
        let output = m.gather_and_encode().unwrap();
        assert!(output.contains("jagedo_http_requests_total"));
        assert!(output.contains("jagedo_requests{stage=\"BIDDING\"} 2"));
    }

    #[test]
    fn normalize_path_replaces_uuids() {
        let path = "/v1/requests/550e8400-e29b-41d4-a716-446655440000/bids/660e8400-e29b-41d4-a716-446655440001/accept";
        assert_eq!(normalize_path(path), "/v1/requests/{id}/bids/{id}/accept");
        assert_eq!(normalize_path("/v1/events"), "/v1/events");
    }
}
