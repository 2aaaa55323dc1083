//! Health and capability handlers.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use actsense_media::AnalyzerStatus;
use actsense_models::AnalysisMethod;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    pub timestamp: String,
    pub analysis_method: AnalysisMethod,
    /// Human-readable description of the analysis method.
    pub method: String,
    pub model_loaded: bool,
}

/// Health check endpoint (liveness check).
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let method = state.analyzer.method();
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "Activity analyzer is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        analysis_method: method,
        method: method.description().to_string(),
        model_loaded: state.analyzer.classifier().is_model_active(),
    })
}

/// Capability query: active path, label set and sampling parameters.
pub async fn status(State(state): State<AppState>) -> Json<AnalyzerStatus> {
    Json(state.analyzer.status())
}
