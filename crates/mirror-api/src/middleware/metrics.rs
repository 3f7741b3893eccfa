//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency) are recorded in middleware.
//! Cache lookups and enqueue failures are recorded by the download
//! orchestrator.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use mirror_core::AssetKind;
use prometheus::core::Collector;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    cache_lookups_total: IntCounterVec,
    population_enqueue_failures_total: IntCounter,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("enqueue_failures", &self.enqueue_failures())
            .finish()
    }
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("mirror_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mirror_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ]),
            &["method", "path"],
        )
        .expect("metric can be created");

        let cache_lookups_total = IntCounterVec::new(
            Opts::new(
                "mirror_cache_lookups_total",
                "Download cache lookups by asset kind and result",
            ),
            &["kind", "result"],
        )
        .expect("metric can be created");

        let population_enqueue_failures_total = IntCounter::new(
            "mirror_population_enqueue_failures_total",
            "Population tasks that could not be enqueued after a cache miss",
        )
        .expect("metric can be created");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(cache_lookups_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(population_enqueue_failures_total.clone()))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                cache_lookups_total,
                population_enqueue_failures_total,
            }),
        }
    }

    /// Total request count (sum across all labels).
    pub fn requests(&self) -> u64 {
        let mut total = 0u64;
        for mf in &self.inner.http_requests_total.collect() {
            for m in mf.get_metric() {
                total += m.get_counter().get_value() as u64;
            }
        }
        total
    }

    /// Cache lookups recorded for `kind` with `result` ("hit" or "miss").
    pub fn cache_lookups(&self, kind: AssetKind, result: &str) -> u64 {
        self.inner
            .cache_lookups_total
            .with_label_values(&[kind.as_str(), result])
            .get()
    }

    pub fn enqueue_failures(&self) -> u64 {
        self.inner.population_enqueue_failures_total.get()
    }

    pub(crate) fn record_cache_lookup(&self, kind: AssetKind, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.inner
            .cache_lookups_total
            .with_label_values(&[kind.as_str(), result])
            .inc();
    }

    pub(crate) fn record_enqueue_failure(&self) {
        self.inner.population_enqueue_failures_total.inc();
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

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse a request path to its route family.
///
/// Every slug and file name would otherwise become its own label value.
fn route_family(path: &str) -> &'static str {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["health", "liveness"] => "/health/liveness",
        ["health", "readiness"] => "/health/readiness",
        ["metrics"] => "/metrics",
        ["plugins", "info", _] => "/plugins/info/{version}",
        ["plugin", _] => "/plugin/{file}",
        ["theme", _] => "/theme/{file}",
        [_, "assets", _] => "/{slug}/assets/{file}",
        [_] => "/{file}",
        _ => "other",
    }
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = route_family(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        m.record_request(&method, path, response.status().as_u16(), duration);
    }

    response
}
