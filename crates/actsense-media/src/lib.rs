//! Activity classification for short video clips.
//!
//! This crate provides:
//! - Strided, budgeted frame sampling over any [`FrameSource`]
//! - Frame differencing into per-step movement ratios
//! - A deterministic heuristic classifier over movement statistics
//! - A model path: preprocessing, ONNX inference and temporal averaging
//! - Startup-time classifier selection behind [`ActivityAnalyzer`]
//!
//! Video decoding uses OpenCV behind the default `opencv` feature; every
//! other stage works on in-memory [`image::RgbImage`] frames.

pub mod artifacts;
pub mod classifier;
pub mod error;
pub mod heuristic;
pub mod inference;
pub mod metrics;
pub mod model;
pub mod motion;
pub mod preprocess;
pub mod sampler;
pub mod source;
pub mod stats;

pub use artifacts::{ModelArtifacts, ModelSearchPaths};
pub use classifier::{
    ActivityAnalyzer, ActivityClassifier, AnalyzerConfig, AnalyzerStatus, ModelComponents,
};
pub use error::{AnalysisError, AnalysisResult};
pub use heuristic::{
    DecisionTable, HeuristicActivityClassifier, HeuristicConfig, HeuristicThresholds,
    HeuristicVerdict, ResidualTable,
};
pub use inference::{InferenceBackend, OrtInferenceBackend};
pub use model::{softmax, FrameAggregate, ModelActivityClassifier};
pub use motion::{movement_ratio, MotionConfig, MotionFeatureExtractor};
pub use preprocess::{ColorOrder, FramePreprocessor, PreprocessConfig, TensorLayout};
pub use sampler::{FrameSampler, SampleStep, SampleSummary, SampledFrame, SamplingParams, Stride};
pub use source::{open_video, Frame, FrameSource, MemoryFrameSource, DEFAULT_FPS};
pub use stats::{summarize, MotionStatistics};
