//! Summary statistics over movement ratios.

use actsense_models::MovementStats;

use crate::error::{AnalysisError, AnalysisResult};

/// Reduce movement samples to mean, max, min and population variance.
///
/// `admitted_frames` is reported in the error when there are no samples,
/// which happens whenever fewer than two frames were admitted.
pub fn summarize(samples: &[f64], admitted_frames: usize) -> AnalysisResult<MovementStats> {
    if samples.is_empty() {
        return Err(AnalysisError::InsufficientSamples {
            admitted: admitted_frames,
        });
    }

    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

    // Float error can push the mean a hair outside [min, max] on constant input.
    Ok(MovementStats::new(mean.clamp(min, max), max, min, variance.max(0.0)))
}

/// Streaming accumulator for movement samples.
#[derive(Debug, Default, Clone)]
pub struct MotionStatistics {
    samples: Vec<f64>,
}

impl MotionStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: f64) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Finish the reduction. Needs at least one sample.
    pub fn finish(&self) -> AnalysisResult<MovementStats> {
        // n samples come from n + 1 admitted frames; zero samples means at most one.
        let admitted = if self.samples.is_empty() { 1 } else { self.samples.len() + 1 };
        summarize(&self.samples, admitted)
    }
}
