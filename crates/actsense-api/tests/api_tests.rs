//! API integration tests.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use tower::ServiceExt;

use actsense_api::{create_router, ApiConfig, AppState};
use actsense_media::{ActivityAnalyzer, SamplingParams};

const BOUNDARY: &str = "actsense-test-boundary";

fn create_test_router() -> Router {
    let analyzer = ActivityAnalyzer::heuristic(SamplingParams::default()).unwrap();
    let state = AppState::new(ApiConfig::default(), analyzer);
    create_router(state, None)
}

fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Body {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn upload_request(uri: &str, field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart_body(field, filename, content))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Test health endpoint.
#[tokio::test]
async fn test_health_endpoint() {
    let response = create_test_router().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["analysis_method"], "heuristic");
    assert_eq!(body["model_loaded"], false);
}

/// Test capability query.
#[tokio::test]
async fn test_status_endpoint() {
    let response = create_test_router().oneshot(get("/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["model_active"], false);
    assert_eq!(body["method"], "heuristic");
    assert_eq!(
        body["labels"],
        serde_json::json!(["sleeping", "drinking", "eating", "idle"])
    );
    assert_eq!(body["sampling"]["max_samples"], 30);
}

/// Test scenario classification.
#[tokio::test]
async fn test_motion_scenarios() {
    let app = create_test_router();

    let response = app.clone().oneshot(get("/test_motion?scenario=laptop")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["scenario"], "laptop");
    assert_eq!(body["detected_activity"], "idle");
    assert_eq!(body["analysis_method"], "heuristic");
    assert_eq!(body["frames_analyzed"], 30);
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((confidence - 0.90).abs() < 1e-9);

    let all: f64 = body["all_activities"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_f64().unwrap())
        .sum();
    assert!((all - 1.0).abs() < 1e-6);

    let response = app.clone().oneshot(get("/test_motion")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["scenario"], "sleeping");
    assert_eq!(body["detected_activity"], "sleeping");
    assert!(body["movement_stats"]["mean"].is_number());

    let response = app.clone().oneshot(get("/test_motion?scenario=idle")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["scenario"], "idle");
    assert_eq!(body["detected_activity"], "idle");
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((confidence - 0.75).abs() < 1e-9);

    let response = app.oneshot(get("/test_motion?scenario=juggling")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "bad_request");
}

/// Test upload without the video field.
#[tokio::test]
async fn test_analyze_missing_field() {
    let response = create_test_router()
        .oneshot(upload_request("/analyze", "file", "clip.mp4", b"data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "bad_request");
}

/// Test upload with an unsupported extension.
#[tokio::test]
async fn test_analyze_rejects_extension() {
    let response = create_test_router()
        .oneshot(upload_request("/detect_motion", "video", "notes.txt", b"data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("Invalid video format"));
}

/// Test upload that cannot be decoded.
#[tokio::test]
async fn test_analyze_undecodable_video() {
    let response = create_test_router()
        .oneshot(upload_request("/analyze", "video", "clip.mp4", b"definitely not a video"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "source_unavailable");
}

/// Test metrics endpoint.
#[tokio::test]
async fn test_metrics_endpoint() {
    let response = create_test_router().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let handle = PrometheusBuilder::new().build_recorder().handle();
    let analyzer = ActivityAnalyzer::heuristic(SamplingParams::default()).unwrap();
    let app = create_router(AppState::new(ApiConfig::default(), analyzer), Some(handle));
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// Test CORS headers.
#[tokio::test]
async fn test_cors_headers() {
    let response = create_test_router()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/analyze")
                .header("Origin", "http://localhost:3000")
                .header("Access-Control-Request-Method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status() == StatusCode::OK || response.status() == StatusCode::NO_CONTENT);
    assert!(response.headers().contains_key("access-control-allow-origin"));
}

/// Test security and request-id headers.
#[tokio::test]
async fn test_response_headers() {
    let response = create_test_router()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Request-ID", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("x-request-id").unwrap(), "req-123");
}
