//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "actsense_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "actsense_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "actsense_http_requests_in_flight";

    // Upload metrics
    pub const UPLOAD_BYTES: &str = "actsense_upload_bytes";
    pub const UPLOADS_REJECTED_TOTAL: &str = "actsense_uploads_rejected_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path).to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record the size of an accepted upload.
pub fn record_upload_bytes(bytes: u64) {
    histogram!(names::UPLOAD_BYTES).record(bytes as f64);
}

/// Record an upload rejected before analysis.
pub fn record_upload_rejected(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::UPLOADS_REJECTED_TOTAL, &labels).increment(1);
}

/// Collapse unknown paths so scanners can't blow up label cardinality.
fn sanitize_path(path: &str) -> &str {
    match path {
        "/analyze" | "/detect_motion" | "/test_motion" | "/health" | "/status" | "/metrics" => path,
        _ => "other",
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/analyze"), "/analyze");
        assert_eq!(sanitize_path("/wp-admin/setup.php"), "other");
    }
}
