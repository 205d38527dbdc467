//! Prometheus metrics for the receipt service.
//!
//! All collectors live in one registry exposed in text format at `/metrics`.
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics registry instance
pub static METRICS: Lazy<Arc<MetricsCollector>> = Lazy::new(|| Arc::new(MetricsCollector::new()));

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    /// Route name (e.g., "process_receipt", "get_points")
    pub endpoint: String,
    /// Response status class ("success", "client_error", "server_error")
    pub status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EndpointLabels {
    pub endpoint: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub code: String,
}

pub struct MetricsCollector {
    registry: RwLock<Registry>,

    /// Total HTTP requests by endpoint and status class
    pub http_requests_total: Family<RequestLabels, Counter>,

    /// Request duration in seconds by endpoint
    pub http_request_duration_seconds: Family<EndpointLabels, Histogram>,

    /// Requests currently being processed by endpoint
    pub http_active_requests: Family<EndpointLabels, Gauge>,

    /// Errors returned to clients by error code
    pub errors_total: Family<ErrorLabels, Counter>,

    /// Receipts currently held in memory
    pub receipts_stored: Gauge,

    /// Receipts rejected by schema validation
    pub receipts_rejected_total: Counter,

    /// Distribution of points served
    pub points_awarded: Histogram,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests_total = Family::<RequestLabels, Counter>::default();
        // Counters get their `_total` suffix from the encoder.
        registry.register(
            "http_requests",
            "Total number of HTTP requests",
            http_requests_total.clone(),
        );

        let http_request_duration_seconds =
            Family::<EndpointLabels, Histogram>::new_with_constructor(|| {
                // 0.5ms .. ~1s
                Histogram::new(exponential_buckets(0.0005, 2.0, 12))
            });
        registry.register(
            "http_request_duration_seconds",
            "Request latency histogram in seconds",
            http_request_duration_seconds.clone(),
        );

        let http_active_requests = Family::<EndpointLabels, Gauge>::default();
        registry.register(
            "http_active_requests",
            "Number of requests currently being processed",
            http_active_requests.clone(),
        );

        let errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "errors",
            "Total number of error responses by error code",
            errors_total.clone(),
        );

        let receipts_stored = Gauge::default();
        registry.register(
            "receipts_stored",
            "Number of receipts held in memory",
            receipts_stored.clone(),
        );

        let receipts_rejected_total = Counter::default();
        registry.register(
            "receipts_rejected",
            "Total number of receipts rejected by schema validation",
            receipts_rejected_total.clone(),
        );

        let points_awarded = Histogram::new(exponential_buckets(1.0, 2.0, 12));
        registry.register(
            "points_awarded",
            "Points computed for stored receipts",
            points_awarded.clone(),
        );

        Self {
            registry: RwLock::new(registry),
            http_requests_total,
            http_request_duration_seconds,
            http_active_requests,
            errors_total,
            receipts_stored,
            receipts_rejected_total,
            points_awarded,
        }
    }

    /// Encode metrics in Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        let registry = self.registry.read();
        if let Err(error) = encode(&mut buffer, &registry) {
            tracing::warn!(%error, "failed to encode metrics");
        }
        buffer
    }

    pub fn record_request(&self, endpoint: &str, status: &str, duration: Duration) {
        self.http_requests_total
            .get_or_create(&RequestLabels {
                endpoint: endpoint.to_string(),
                status: status.to_string(),
            })
            .inc();

        self.http_request_duration_seconds
            .get_or_create(&EndpointLabels {
                endpoint: endpoint.to_string(),
            })
            .observe(duration.as_secs_f64());
    }

    pub fn record_error(&self, code: &str) {
        self.errors_total
            .get_or_create(&ErrorLabels {
                code: code.to_string(),
            })
            .inc();
    }

    pub fn record_receipt_stored(&self, stored: usize) {
        self.receipts_stored.set(stored as i64);
    }

    pub fn record_receipt_rejected(&self) {
        self.receipts_rejected_total.inc();
    }

    pub fn record_points(&self, points: u64) {
        self.points_awarded.observe(points as f64);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify an HTTP status code for the `status` request label.
pub fn status_class(status: axum::http::StatusCode) -> &'static str {
    if status.is_server_error() {
        "server_error"
    } else if status.is_client_error() {
        "client_error"
    } else {
        "success"
    }
}

/// RAII guard for request timing.
///
/// Tracks the active request gauge while alive. Call [`RequestMetrics::finish`]
/// with the response status; a guard dropped without finishing is recorded
/// as a server error.
pub struct RequestMetrics {
    endpoint: &'static str,
    start: Instant,
    completed: bool,
}

impl RequestMetrics {
    pub fn new(endpoint: &'static str) -> Self {
        METRICS
            .http_active_requests
            .get_or_create(&EndpointLabels {
                endpoint: endpoint.to_string(),
            })
            .inc();

        Self {
            endpoint,
            start: Instant::now(),
            completed: false,
        }
    }

    pub fn finish(mut self, status: axum::http::StatusCode) {
        self.complete(status_class(status));
    }

    fn complete(&mut self, status: &str) {
        METRICS.record_request(self.endpoint, status, self.start.elapsed());
        METRICS
            .http_active_requests
            .get_or_create(&EndpointLabels {
                endpoint: self.endpoint.to_string(),
            })
            .dec();
        self.completed = true;
    }
}

impl Drop for RequestMetrics {
    fn drop(&mut self) {
        if !self.completed {
            self.complete("server_error");
        }
    }
}
