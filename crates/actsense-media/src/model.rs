//! Learned per-frame activity classification.
//!
//! Every admitted frame is preprocessed, scored by the inference backend and
//! turned into probabilities with a softmax. Per-frame probabilities are
//! averaged element-wise; the average is the clip distribution.
//!
//! Frames that fail anywhere along the way are skipped and counted. Only a
//! clip where no frame survives is an error.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use actsense_models::{ClassificationResult, ProbabilityDistribution};

use crate::error::{AnalysisError, AnalysisResult};
use crate::inference::InferenceBackend;
use crate::metrics;
use crate::preprocess::{FramePreprocessor, PreprocessConfig};
use crate::sampler::{FrameSampler, SampleSummary};
use crate::source::Frame;

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&l| (l as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Averaged scores of a batch of frames.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAggregate {
    pub distribution: ProbabilityDistribution,
    /// Frames that contributed to the average.
    pub processed: usize,
    /// Frames that were skipped.
    pub skipped: usize,
}

/// Classifier backed by a frozen per-frame model.
#[derive(Clone)]
pub struct ModelActivityClassifier {
    backend: Arc<dyn InferenceBackend>,
    labels: Vec<String>,
    preprocessor: FramePreprocessor,
}

impl std::fmt::Debug for ModelActivityClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelActivityClassifier")
            .field("labels", &self.labels)
            .field("preprocessor", &self.preprocessor)
            .finish_non_exhaustive()
    }
}

impl ModelActivityClassifier {
    /// Build the classifier.
    ///
    /// A missing backend or an empty label list is `ModelUnavailable`; a
    /// duplicate label or a malformed preprocess config is `InvalidConfig`.
    pub fn new(
        backend: Option<Arc<dyn InferenceBackend>>,
        labels: Vec<String>,
        preprocess: PreprocessConfig,
    ) -> AnalysisResult<Self> {
        let backend =
            backend.ok_or_else(|| AnalysisError::model_unavailable("No inference backend loaded"))?;
        if labels.is_empty() {
            return Err(AnalysisError::model_unavailable("Model label list is empty"));
        }
        for (i, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(AnalysisError::invalid_config(format!("Label {i} is blank")));
            }
            if labels[..i].contains(label) {
                return Err(AnalysisError::invalid_config(format!(
                    "Duplicate model label: {label}"
                )));
            }
        }
        let preprocessor = FramePreprocessor::new(preprocess)?;

        Ok(Self {
            backend,
            labels,
            preprocessor,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn preprocessor(&self) -> &FramePreprocessor {
        &self.preprocessor
    }

    /// Probabilities for a single frame, in label order.
    pub fn frame_probabilities(&self, frame: &Frame) -> AnalysisResult<Vec<f64>> {
        let input = self.preprocessor.process(frame)?;
        let logits = self.backend.infer(&input)?;

        if logits.len() != self.labels.len() {
            return Err(AnalysisError::inference_failed(format!(
                "Model returned {} scores for {} labels",
                logits.len(),
                self.labels.len()
            )));
        }
        if logits.iter().any(|l| !l.is_finite()) {
            return Err(AnalysisError::inference_failed("Model returned non-finite scores"));
        }
        Ok(softmax(&logits))
    }

    /// Score frames in parallel and average the survivors.
    pub fn classify_frames(&self, frames: &[Frame]) -> AnalysisResult<FrameAggregate> {
        let per_frame: Vec<AnalysisResult<Vec<f64>>> = frames
            .par_iter()
            .map(|frame| self.frame_probabilities(frame))
            .collect();

        let mut sums = vec![0.0f64; self.labels.len()];
        let mut processed = 0usize;
        let mut skipped = 0usize;

        for (index, outcome) in per_frame.into_iter().enumerate() {
            match outcome {
                Ok(probs) => {
                    for (sum, p) in sums.iter_mut().zip(probs) {
                        *sum += p;
                    }
                    processed += 1;
                }
                Err(e) => {
                    warn!(frame = index, error = %e, "Skipping frame");
                    metrics::record_model_frame_skipped(e.code());
                    skipped += 1;
                }
            }
        }

        if processed == 0 {
            return Err(AnalysisError::NoFramesProcessed {
                attempted: frames.len(),
                failed: skipped,
            });
        }

        let averaged: Vec<f64> = sums.iter().map(|s| s / processed as f64).collect();
        let distribution = ProbabilityDistribution::from_scores(self.labels.as_slice(), &averaged)?;

        debug!(processed, skipped, "Frame scores aggregated");

        Ok(FrameAggregate {
            distribution,
            processed,
            skipped,
        })
    }

    /// Full model pipeline: sample, score, average.
    pub fn analyze(&self, sampler: FrameSampler) -> AnalysisResult<ClassificationResult> {
        self.analyze_sampled(sampler).map(|(result, _)| result)
    }

    /// Like [`analyze`](Self::analyze), also returning what the sampler
    /// admitted. Skipped frames count as admitted but not analyzed.
    pub fn analyze_sampled(
        &self,
        mut sampler: FrameSampler,
    ) -> AnalysisResult<(ClassificationResult, SampleSummary)> {
        let mut frames = Vec::new();
        for sample in sampler.by_ref() {
            frames.push(sample?.frame);
        }
        let summary = sampler.summary();
        drop(sampler);

        let aggregate = self.classify_frames(&frames)?;
        let result = ClassificationResult::model(
            aggregate.distribution,
            aggregate.processed,
            summary.duration_sec(),
        );

        info!(
            activity = result.detected_activity(),
            confidence = result.confidence(),
            frames = aggregate.processed,
            skipped = aggregate.skipped,
            "Model analysis complete"
        );

        Ok((result, summary))
    }
}
