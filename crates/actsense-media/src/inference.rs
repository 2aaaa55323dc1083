//! Inference backends for the per-frame activity model.
//!
//! The classifier only sees the [`InferenceBackend`] capability: a batch
//! tensor in, one raw score per label out. [`OrtInferenceBackend`] provides
//! it through ONNX Runtime with automatic execution provider selection:
//! - CUDA on Linux with NVIDIA GPU (when `cuda` feature enabled)
//! - CoreML on macOS
//! - CPU fallback on all platforms

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array4;
use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::error::{AnalysisError, AnalysisResult};

/// Frozen per-frame classifier.
#[cfg_attr(test, mockall::automock)]
pub trait InferenceBackend: Send + Sync {
    /// Run the model on a preprocessed batch of one; returns raw logits.
    fn infer(&self, input: &Array4<f32>) -> AnalysisResult<Vec<f32>>;
}

/// ONNX Runtime backed classifier.
pub struct OrtInferenceBackend {
    session: Mutex<Session>,
    output_name: String,
    model_path: PathBuf,
}

impl OrtInferenceBackend {
    /// Load an ONNX model. A missing or unloadable model is `ModelUnavailable`.
    pub fn load(model_path: impl AsRef<Path>) -> AnalysisResult<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(AnalysisError::model_unavailable(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }

        let session = create_session(model_path)?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| AnalysisError::model_unavailable("Model declares no outputs"))?;

        info!(
            model_path = %model_path.display(),
            output = %output_name,
            "Activity model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            model_path: model_path.to_path_buf(),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl InferenceBackend for OrtInferenceBackend {
    fn infer(&self, input: &Array4<f32>) -> AnalysisResult<Vec<f32>> {
        let shape: Vec<usize> = input.shape().to_vec();
        let data: Vec<f32> = input.iter().copied().collect();
        let value: Value = Tensor::from_array((shape, data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| AnalysisError::inference_failed(format!("Failed to create tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| AnalysisError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![value])
            .map_err(|e| AnalysisError::inference_failed(format!("ONNX inference failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            AnalysisError::inference_failed(format!("Missing {} tensor", self.output_name))
        })?;

        let (_, scores) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| AnalysisError::inference_failed(format!("Failed to extract tensor: {e}")))?;

        Ok(scores.to_vec())
    }
}

/// Accelerated execution providers available to this build, in preference
/// order. The CPU provider is always tried last and is not listed.
fn accelerated_providers() -> Vec<(&'static str, ExecutionProviderDispatch)> {
    #[allow(unused_mut)]
    let mut providers = Vec::new();

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    providers.push((
        "cuda",
        ort::execution_providers::CUDAExecutionProvider::default().build(),
    ));

    #[cfg(target_os = "macos")]
    providers.push((
        "coreml",
        ort::execution_providers::CoreMLExecutionProvider::default().build(),
    ));

    providers
}

fn create_session(model_path: &Path) -> AnalysisResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    let builder = Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
        .map_err(|e| AnalysisError::model_unavailable(format!("Failed to configure ONNX session: {e}")))?;

    for (provider, dispatch) in accelerated_providers() {
        let attempt = builder
            .clone()
            .with_execution_providers([dispatch])
            .and_then(|b| b.commit_from_memory(&model_bytes));
        match attempt {
            Ok(session) => {
                info!(provider, "Execution provider selected");
                return Ok(session);
            }
            Err(e) => debug!(provider, error = %e, "Execution provider unavailable"),
        }
    }

    let session = builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| AnalysisError::model_unavailable(format!("Failed to load ONNX model: {e}")))?;
    info!(provider = "cpu", "Execution provider selected");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_unavailable() {
        let err = OrtInferenceBackend::load("/nonexistent/model.onnx").err().unwrap();
        assert!(matches!(err, AnalysisError::ModelUnavailable(_)));
    }

    #[test]
    fn test_corrupt_model_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"not an onnx graph").unwrap();

        let err = OrtInferenceBackend::load(&path).err().unwrap();
        assert!(matches!(err, AnalysisError::ModelUnavailable(_)));
    }

    #[test]
    fn test_accelerated_providers_follow_build() {
        let names: Vec<&str> = accelerated_providers().into_iter().map(|(n, _)| n).collect();

        assert_eq!(
            names.contains(&"cuda"),
            cfg!(all(target_os = "linux", feature = "cuda"))
        );
        assert_eq!(names.contains(&"coreml"), cfg!(target_os = "macos"));
        assert!(!names.contains(&"cpu"));
    }
}
