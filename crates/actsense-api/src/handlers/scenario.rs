//! Canned scenario handler.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use actsense_models::{ClassificationResult, Scenario};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScenarioQuery {
    pub scenario: Option<String>,
}

#[derive(Serialize)]
pub struct ScenarioResponse {
    pub scenario: Scenario,
    #[serde(flatten)]
    pub result: ClassificationResult,
}

/// Classify the canned statistics of a scenario. Defaults to `sleeping`.
pub async fn test_motion(
    State(state): State<AppState>,
    Query(query): Query<ScenarioQuery>,
) -> ApiResult<Json<ScenarioResponse>> {
    let scenario = match query.scenario.as_deref() {
        None => Scenario::Sleeping,
        Some(name) => name.parse::<Scenario>().map_err(|e| {
            let known: Vec<&str> = Scenario::ALL.iter().map(|s| s.as_str()).collect();
            ApiError::bad_request(format!("{e}; expected one of: {}", known.join(", ")))
        })?,
    };

    let result = state.analyzer.classify_scenario(scenario)?;
    Ok(Json(ScenarioResponse { scenario, result }))
}
