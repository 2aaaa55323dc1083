//! API error types.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use actsense_media::AnalysisError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Analysis(e) if e.is_input_error() => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Analysis(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error tag for clients.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::Internal(_) => "internal_error",
            ApiError::Analysis(e) => e.code(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(e.body_text())
        } else {
            Self::BadRequest(e.body_text())
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
            if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                "An internal error occurred".to_string()
            } else {
                self.to_string()
            }
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: self.code(),
            detail,
        };

        (status, Json(body)).into_response()
    }
}
