//! Strided, budgeted frame sampling.
//!
//! The sampler walks a [`FrameSource`] once, admitting every `stride`-th raw
//! frame (starting with the first) until the source runs out or a budget is
//! hit. It owns the source for its whole lifetime and releases it when
//! iteration finishes, fails, or the sampler is dropped early.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalysisError, AnalysisResult};
use crate::source::{Frame, FrameSource, DEFAULT_FPS};

/// How far apart admitted frames are.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stride {
    /// Admit every n-th raw frame.
    Frames(u32),
    /// Derive the stride from the source frame rate: `max(1, round(fps / hz))`.
    TargetRateHz(f64),
}

impl Stride {
    /// Resolve to a raw-frame stride for a source running at `fps`.
    pub fn resolve(&self, fps: f64) -> u64 {
        match *self {
            Stride::Frames(n) => u64::from(n.max(1)),
            Stride::TargetRateHz(hz) => (fps / hz).round().max(1.0) as u64,
        }
    }
}

/// Sampling parameters for one analysis call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub stride: Stride,
    /// Stop after this many admitted frames.
    pub max_samples: Option<usize>,
    /// Stop once this much source time has been read.
    pub max_duration_secs: Option<f64>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            stride: Stride::Frames(10),
            max_samples: Some(30),
            max_duration_secs: None,
        }
    }
}

impl SamplingParams {
    /// Reject strides and budgets that could not bound the read.
    pub fn validate(&self) -> AnalysisResult<()> {
        match self.stride {
            Stride::Frames(0) => {
                return Err(AnalysisError::invalid_config("stride must be at least 1 frame"))
            }
            Stride::TargetRateHz(hz) if !(hz.is_finite() && hz > 0.0) => {
                return Err(AnalysisError::invalid_config(format!(
                    "target sample rate must be positive, got {hz}"
                )))
            }
            _ => {}
        }

        if self.max_samples == Some(0) {
            return Err(AnalysisError::invalid_config("max_samples must be at least 1"));
        }
        if let Some(secs) = self.max_duration_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(AnalysisError::invalid_config(format!(
                    "max_duration_secs must be positive, got {secs}"
                )));
            }
        }
        if self.max_samples.is_none() && self.max_duration_secs.is_none() {
            return Err(AnalysisError::invalid_config(
                "either max_samples or max_duration_secs must be set",
            ));
        }
        Ok(())
    }
}

/// Position of an admitted frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleStep {
    /// Zero-based count of admitted frames before this one.
    pub ordinal: usize,
    /// Zero-based index of the frame in the source.
    pub raw_index: u64,
    /// Source time of the frame.
    pub timestamp_sec: f64,
}

/// An admitted frame and where it came from.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub step: SampleStep,
    pub frame: Frame,
}

/// Counters describing how much of the source was consumed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSummary {
    pub frames_admitted: usize,
    pub raw_frames_read: u64,
    pub fps: f64,
}

impl SampleSummary {
    /// Source time covered by the raw frames read.
    pub fn duration_sec(&self) -> f64 {
        self.raw_frames_read as f64 / self.fps
    }
}

/// Lazy iterator over admitted frames.
pub struct FrameSampler {
    source: Box<dyn FrameSource>,
    fps: f64,
    stride: u64,
    max_samples: Option<usize>,
    max_raw_frames: Option<u64>,
    raw_read: u64,
    admitted: usize,
    finished: bool,
}

impl FrameSampler {
    /// Take ownership of `source` and prepare to sample it.
    ///
    /// Fails with `SourceUnavailable` when the source declares zero frames and
    /// with `InvalidConfig` for unbounded or malformed parameters. The source
    /// is released on both failure paths.
    pub fn open(mut source: Box<dyn FrameSource>, params: &SamplingParams) -> AnalysisResult<Self> {
        if let Err(e) = params.validate() {
            source.release();
            return Err(e);
        }
        if source.frame_count() == Some(0) {
            source.release();
            return Err(AnalysisError::source_unavailable("Video contains no frames"));
        }

        let reported = source.fps();
        let fps = if reported.is_finite() && reported > 0.0 {
            reported
        } else {
            DEFAULT_FPS
        };
        let stride = params.stride.resolve(fps);
        let max_raw_frames = params
            .max_duration_secs
            .map(|secs| (secs * fps).ceil().max(1.0) as u64);

        debug!(
            fps,
            stride,
            max_samples = ?params.max_samples,
            ?max_raw_frames,
            frame_count = ?source.frame_count(),
            "Frame sampler opened"
        );

        Ok(Self {
            source,
            fps,
            stride,
            max_samples: params.max_samples,
            max_raw_frames,
            raw_read: 0,
            admitted: 0,
            finished: false,
        })
    }

    /// Effective raw-frame stride.
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Frame rate used for timing (source fps or the default).
    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn summary(&self) -> SampleSummary {
        SampleSummary {
            frames_admitted: self.admitted,
            raw_frames_read: self.raw_read,
            fps: self.fps,
        }
    }

    fn budget_exhausted(&self) -> bool {
        self.max_samples.is_some_and(|max| self.admitted >= max)
            || self.max_raw_frames.is_some_and(|max| self.raw_read >= max)
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.source.release();
            debug!(
                admitted = self.admitted,
                raw_frames_read = self.raw_read,
                "Frame sampler finished"
            );
        }
    }

    fn advance(&mut self) -> AnalysisResult<Option<SampledFrame>> {
        loop {
            if self.budget_exhausted() {
                return Ok(None);
            }
            if !self.source.grab()? {
                if self.raw_read == 0 {
                    return Err(AnalysisError::source_unavailable(
                        "No frames could be decoded from the video",
                    ));
                }
                return Ok(None);
            }

            let raw_index = self.raw_read;
            self.raw_read += 1;
            if raw_index % self.stride != 0 {
                continue;
            }

            let frame = self.source.retrieve()?;
            let step = SampleStep {
                ordinal: self.admitted,
                raw_index,
                timestamp_sec: raw_index as f64 / self.fps,
            };
            self.admitted += 1;
            return Ok(Some(SampledFrame { step, frame }));
        }
    }
}

impl Iterator for FrameSampler {
    type Item = AnalysisResult<SampledFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(sample)) => Some(Ok(sample)),
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for FrameSampler {}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryFrameSource, MockFrameSource};
    use std::sync::atomic::Ordering;

    fn tiny(i: usize) -> Frame {
        Frame::from_pixel(2, 2, image::Rgb([(i % 256) as u8, 0, 0]))
    }

    #[test]
    fn test_stride_resolution() {
        assert_eq!(Stride::Frames(10).resolve(30.0), 10);
        assert_eq!(Stride::TargetRateHz(3.0).resolve(30.0), 10);
        assert_eq!(Stride::TargetRateHz(2.0).resolve(25.0), 13);
        assert_eq!(Stride::TargetRateHz(60.0).resolve(30.0), 1);
    }

    #[test]
    fn test_max_samples_budget_and_release() {
        let source = MemoryFrameSource::from_fn(1000, 30.0, tiny);
        let released = source.release_flag();
        let params = SamplingParams {
            stride: Stride::Frames(10),
            max_samples: Some(30),
            max_duration_secs: None,
        };

        let mut sampler = FrameSampler::open(Box::new(source), &params).unwrap();
        let frames: Vec<_> = sampler.by_ref().collect::<Result<_, _>>().unwrap();

        assert_eq!(frames.len(), 30);
        assert!(released.load(Ordering::SeqCst));
        let indices: Vec<u64> = frames.iter().map(|f| f.step.raw_index).collect();
        assert_eq!(indices[0], 0);
        assert_eq!(indices[29], 290);
        assert!(indices.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(sampler.summary().frames_admitted, 30);
    }

    #[test]
    fn test_duration_budget() {
        let source = MemoryFrameSource::from_fn(1000, 10.0, tiny);
        let params = SamplingParams {
            stride: Stride::Frames(5),
            max_samples: None,
            max_duration_secs: Some(2.0),
        };
        let mut sampler = FrameSampler::open(Box::new(source), &params).unwrap();
        let count = sampler.by_ref().filter_map(Result::ok).count();

        // 20 raw frames at stride 5 -> indices 0, 5, 10, 15
        assert_eq!(count, 4);
        let summary = sampler.summary();
        assert_eq!(summary.raw_frames_read, 20);
        assert!((summary.duration_sec() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_source_exhaustion_stops_early() {
        let source = MemoryFrameSource::from_fn(25, 30.0, tiny);
        let sampler = FrameSampler::open(Box::new(source), &SamplingParams::default()).unwrap();
        assert_eq!(sampler.filter_map(Result::ok).count(), 3);
    }

    #[test]
    fn test_early_drop_releases_source() {
        let source = MemoryFrameSource::from_fn(100, 30.0, tiny);
        let released = source.release_flag();
        {
            let mut sampler =
                FrameSampler::open(Box::new(source), &SamplingParams::default()).unwrap();
            let _ = sampler.next();
            assert!(!released.load(Ordering::SeqCst));
        }
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_zero_frame_source_is_unavailable() {
        let source = MemoryFrameSource::new(Vec::new(), 30.0);
        let released = source.release_flag();
        let err = FrameSampler::open(Box::new(source), &SamplingParams::default())
            .err()
            .unwrap();
        assert!(matches!(err, AnalysisError::SourceUnavailable(_)));
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_unknown_length_source_without_frames() {
        let mut mock = MockFrameSource::new();
        mock.expect_fps().return_const(0.0);
        mock.expect_frame_count().return_const(None::<u64>);
        mock.expect_grab().returning(|| Ok(false));
        mock.expect_release().times(1).return_const(());

        let mut sampler = FrameSampler::open(Box::new(mock), &SamplingParams::default()).unwrap();
        assert_eq!(sampler.fps(), DEFAULT_FPS);
        assert!(matches!(
            sampler.next(),
            Some(Err(AnalysisError::SourceUnavailable(_)))
        ));
        assert!(sampler.next().is_none());
    }

    #[test]
    fn test_decode_error_releases_source() {
        let mut mock = MockFrameSource::new();
        mock.expect_fps().return_const(30.0);
        mock.expect_frame_count().return_const(Some(100u64));
        mock.expect_grab().returning(|| Ok(true));
        mock.expect_retrieve()
            .returning(|| Err(AnalysisError::source_unavailable("corrupt packet")));
        mock.expect_release().times(1).return_const(());

        let mut sampler = FrameSampler::open(Box::new(mock), &SamplingParams::default()).unwrap();
        assert!(matches!(sampler.next(), Some(Err(_))));
        assert!(sampler.next().is_none());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let unbounded = SamplingParams {
            stride: Stride::Frames(1),
            max_samples: None,
            max_duration_secs: None,
        };
        assert!(matches!(unbounded.validate(), Err(AnalysisError::InvalidConfig(_))));

        let zero_stride = SamplingParams {
            stride: Stride::Frames(0),
            ..SamplingParams::default()
        };
        assert!(zero_stride.validate().is_err());

        let bad_rate = SamplingParams {
            stride: Stride::TargetRateHz(0.0),
            ..SamplingParams::default()
        };
        assert!(bad_rate.validate().is_err());
    }
}
