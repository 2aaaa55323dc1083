//! Error types for activity analysis.

use thiserror::Error;

use actsense_models::DistributionError;

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Errors that can occur while analyzing a clip.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Video source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Insufficient samples: {admitted} frame(s) admitted, at least 2 required")]
    InsufficientSamples { admitted: usize },

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No frames processed: {failed} of {attempted} frame(s) failed")]
    NoFramesProcessed { attempted: usize, failed: usize },

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid distribution: {0}")]
    Distribution(#[from] DistributionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Create a source-unavailable error.
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable(message.into())
    }

    /// Create a model-unavailable error.
    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable(message.into())
    }

    /// Create an invalid-config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create an inference failure error.
    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::InferenceFailed(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable diagnostic tag for callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::InsufficientSamples { .. } => "insufficient_samples",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::InvalidConfig(_) => "invalid_config",
            Self::NoFramesProcessed { .. } => "no_frames_processed",
            Self::InferenceFailed(_) => "inference_failed",
            Self::Distribution(_) => "invalid_distribution",
            Self::Io(_) => "io_error",
            Self::JsonParse(_) => "json_parse_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether the failure is caused by the submitted clip rather than the service.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable(_) | Self::InsufficientSamples { .. }
        )
    }
}
