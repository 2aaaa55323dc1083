//! API routes.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{analyze_video, health, status, test_motion};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Requests running longer than `timeout` are answered with 408.
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let analysis_routes = Router::new()
        .route("/analyze", post(analyze_video))
        // Alias kept for older clients
        .route("/detect_motion", post(analyze_video))
        .route("/test_motion", get(test_motion));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/status", get(status));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(analysis_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Uploads are bounded by the body limit below, not axum's 2MB default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(timeout_layer(state.config.request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
