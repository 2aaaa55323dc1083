//! Classifier selection and the analysis entry point.
//!
//! The classifier path is chosen once, at startup: the model path when a
//! complete set of model artifacts is available, the heuristic path
//! otherwise. [`ActivityAnalyzer`] pairs the chosen classifier with the
//! sampling parameters and is shared read-only across requests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use actsense_models::{AnalysisMethod, ClassificationResult, Scenario};

use crate::artifacts::{ModelArtifacts, ModelSearchPaths};
use crate::error::AnalysisResult;
use crate::heuristic::{HeuristicActivityClassifier, HeuristicConfig};
use crate::inference::{InferenceBackend, OrtInferenceBackend};
use crate::metrics;
use crate::model::ModelActivityClassifier;
use crate::preprocess::PreprocessConfig;
use crate::sampler::{FrameSampler, SampleSummary, SamplingParams, Stride};
use crate::source::{open_video, FrameSource};

/// Model path inputs as found at startup. Any piece may be missing.
#[derive(Default)]
pub struct ModelComponents {
    pub backend: Option<Arc<dyn InferenceBackend>>,
    pub labels: Vec<String>,
    pub preprocess: Option<PreprocessConfig>,
}

impl ModelComponents {
    fn is_complete(&self) -> bool {
        self.backend.is_some() && !self.labels.is_empty() && self.preprocess.is_some()
    }
}

/// The classifier path in use.
#[derive(Debug, Clone)]
pub enum ActivityClassifier {
    Heuristic(HeuristicActivityClassifier),
    Model(ModelActivityClassifier),
}

impl ActivityClassifier {
    /// Pick the model path when every model component is present, the
    /// heuristic path otherwise.
    pub fn select(
        components: Option<ModelComponents>,
        heuristic: &HeuristicConfig,
    ) -> AnalysisResult<Self> {
        match components {
            Some(c) if c.is_complete() => {
                let preprocess = c.preprocess.unwrap_or_default();
                let model = ModelActivityClassifier::new(c.backend, c.labels, preprocess)?;
                info!(labels = ?model.labels(), "Model classifier selected");
                Ok(Self::Model(model))
            }
            _ => {
                info!("Model artifacts incomplete, heuristic classifier selected");
                Ok(Self::Heuristic(HeuristicActivityClassifier::new(heuristic)?))
            }
        }
    }

    pub fn method(&self) -> AnalysisMethod {
        match self {
            Self::Heuristic(_) => AnalysisMethod::Heuristic,
            Self::Model(_) => AnalysisMethod::Model,
        }
    }

    pub fn is_model_active(&self) -> bool {
        matches!(self, Self::Model(_))
    }

    /// Labels the active path can produce, in distribution order.
    pub fn labels(&self) -> Vec<String> {
        match self {
            Self::Heuristic(h) => h.labels(),
            Self::Model(m) => m.labels().to_vec(),
        }
    }

    pub fn analyze(&self, sampler: FrameSampler) -> AnalysisResult<ClassificationResult> {
        self.analyze_sampled(sampler).map(|(result, _)| result)
    }

    /// Classify and report what the sampler admitted.
    pub fn analyze_sampled(
        &self,
        sampler: FrameSampler,
    ) -> AnalysisResult<(ClassificationResult, SampleSummary)> {
        match self {
            Self::Heuristic(h) => h.analyze_sampled(sampler),
            Self::Model(m) => m.analyze_sampled(sampler),
        }
    }
}

/// Analyzer configuration.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    /// Model artifact directory. Searches the default paths when unset.
    pub model_dir: Option<PathBuf>,
    pub sampling: SamplingParams,
    /// JSON file overriding heuristic thresholds.
    pub heuristic_config_path: Option<PathBuf>,
}

impl AnalyzerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = SamplingParams::default();

        let stride = match env_parse::<f64>("SAMPLE_RATE_HZ") {
            Some(hz) => Stride::TargetRateHz(hz),
            None => env_parse::<u32>("SAMPLE_STRIDE")
                .map(Stride::Frames)
                .unwrap_or(defaults.stride),
        };

        Self {
            model_dir: std::env::var("ACTIVITY_MODEL_DIR").ok().map(PathBuf::from),
            sampling: SamplingParams {
                stride,
                max_samples: env_parse("MAX_SAMPLES").or(defaults.max_samples),
                max_duration_secs: env_parse("MAX_DURATION_SECS").or(defaults.max_duration_secs),
            },
            heuristic_config_path: std::env::var("HEURISTIC_CONFIG_PATH").ok().map(PathBuf::from),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Capability report.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzerStatus {
    pub model_active: bool,
    pub method: AnalysisMethod,
    pub labels: Vec<String>,
    pub sampling: SamplingParams,
}

/// Single entry point for clip analysis.
#[derive(Debug, Clone)]
pub struct ActivityAnalyzer {
    classifier: ActivityClassifier,
    /// Used for scenario presets regardless of the active path.
    heuristic: HeuristicActivityClassifier,
    sampling: SamplingParams,
}

impl ActivityAnalyzer {
    pub fn new(
        classifier: ActivityClassifier,
        heuristic: HeuristicActivityClassifier,
        sampling: SamplingParams,
    ) -> AnalysisResult<Self> {
        sampling.validate()?;
        Ok(Self {
            classifier,
            heuristic,
            sampling,
        })
    }

    /// Heuristic-only analyzer with default tunables.
    pub fn heuristic(sampling: SamplingParams) -> AnalysisResult<Self> {
        let heuristic = HeuristicActivityClassifier::default();
        Self::new(
            ActivityClassifier::Heuristic(heuristic.clone()),
            heuristic,
            sampling,
        )
    }

    /// Build from config.
    ///
    /// Sampling and heuristic config errors are fatal. Model artifact errors
    /// are logged and leave the analyzer on the heuristic path.
    pub fn from_config(config: &AnalyzerConfig) -> AnalysisResult<Self> {
        config.sampling.validate()?;

        let heuristic_config = match &config.heuristic_config_path {
            Some(path) => HeuristicConfig::from_json_file(path)?,
            None => HeuristicConfig::default(),
        };
        let heuristic = HeuristicActivityClassifier::new(&heuristic_config)?;

        let model_dir = config
            .model_dir
            .clone()
            .or_else(|| ModelSearchPaths::default().find_model_dir());
        let components = model_dir.as_deref().and_then(load_model_components);

        let classifier = match ActivityClassifier::select(components, &heuristic_config) {
            Ok(classifier) => classifier,
            Err(e) => {
                error!(error = %e, "Model classifier rejected, falling back to heuristic");
                ActivityClassifier::Heuristic(heuristic.clone())
            }
        };

        Self::new(classifier, heuristic, config.sampling)
    }

    pub fn classifier(&self) -> &ActivityClassifier {
        &self.classifier
    }

    pub fn method(&self) -> AnalysisMethod {
        self.classifier.method()
    }

    pub fn sampling(&self) -> &SamplingParams {
        &self.sampling
    }

    /// Analyze a frame source. The source is released before this returns.
    pub fn analyze_source(&self, source: Box<dyn FrameSource>) -> AnalysisResult<ClassificationResult> {
        let method = self.method();
        let start = Instant::now();

        let outcome = FrameSampler::open(source, &self.sampling)
            .and_then(|sampler| self.classifier.analyze_sampled(sampler));

        let elapsed = start.elapsed().as_secs_f64();
        match outcome {
            Ok((result, summary)) => {
                metrics::record_analysis(method.as_str(), "success", elapsed);
                metrics::record_frames_admitted(method.as_str(), summary.frames_admitted);
                metrics::record_detected_activity(method.as_str(), result.detected_activity());
                Ok(result)
            }
            Err(e) => {
                warn!(method = %method, error = %e, "Analysis failed");
                metrics::record_analysis(method.as_str(), e.code(), elapsed);
                Err(e)
            }
        }
    }

    /// Open and analyze a video file.
    pub fn analyze_file(&self, path: impl AsRef<Path>) -> AnalysisResult<ClassificationResult> {
        let path = path.as_ref();
        info!(path = %path.display(), method = %self.method(), "Analyzing video");
        let source = open_video(path)?;
        self.analyze_source(source)
    }

    /// Classify the canned statistics of a scenario with the heuristic.
    pub fn classify_scenario(&self, scenario: Scenario) -> AnalysisResult<ClassificationResult> {
        let stats = scenario.stats();
        let verdict = self.heuristic.classify(&stats)?;
        Ok(ClassificationResult::heuristic(
            verdict.label.as_str(),
            verdict.distribution,
            stats,
            scenario.frames_analyzed(),
            scenario.duration_sec(),
        ))
    }

    pub fn status(&self) -> AnalyzerStatus {
        AnalyzerStatus {
            model_active: self.classifier.is_model_active(),
            method: self.method(),
            labels: self.classifier.labels(),
            sampling: self.sampling,
        }
    }
}

/// Read and load model artifacts from `dir`. Missing pieces and load errors
/// both yield `None`; the reason is logged.
fn load_model_components(dir: &Path) -> Option<ModelComponents> {
    let artifacts = match ModelArtifacts::discover(dir) {
        Ok(Some(artifacts)) => artifacts,
        Ok(None) => {
            info!(dir = %dir.display(), "No complete model artifacts");
            return None;
        }
        Err(e) => {
            error!(dir = %dir.display(), error = %e, "Malformed model artifacts, using heuristic only");
            return None;
        }
    };

    let backend = match OrtInferenceBackend::load(&artifacts.model_path) {
        Ok(backend) => backend,
        Err(e) => {
            warn!(error = %e, "Failed to load activity model, using heuristic only");
            return None;
        }
    };

    Some(ModelComponents {
        backend: Some(Arc::new(backend)),
        labels: artifacts.labels,
        preprocess: Some(artifacts.preprocess),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::inference::MockInferenceBackend;
    use crate::source::{Frame, MemoryFrameSource};
    use image::Rgb;
    use std::io::Write;
    use std::sync::atomic::Ordering;

    fn mock_backend() -> Arc<dyn InferenceBackend> {
        let mut mock = MockInferenceBackend::new();
        mock.expect_infer().returning(|_| Ok(vec![3.0, 0.0]));
        Arc::new(mock)
    }

    fn model_components() -> ModelComponents {
        ModelComponents {
            backend: Some(mock_backend()),
            labels: vec!["standing".into(), "sitting".into()],
            preprocess: Some(PreprocessConfig {
                resize: 8,
                crop: 8,
                ..PreprocessConfig::default()
            }),
        }
    }

    fn still_clip(count: usize) -> MemoryFrameSource {
        MemoryFrameSource::from_fn(count, 30.0, |_| Frame::from_pixel(16, 16, Rgb([90, 90, 90])))
    }

    #[test]
    fn test_select_model_when_complete() {
        let classifier =
            ActivityClassifier::select(Some(model_components()), &HeuristicConfig::default()).unwrap();
        assert!(classifier.is_model_active());
        assert_eq!(classifier.method(), AnalysisMethod::Model);
        assert_eq!(classifier.labels(), vec!["standing", "sitting"]);
    }

    #[test]
    fn test_select_falls_back_to_heuristic() {
        let heuristic = HeuristicConfig::default();

        let none = ActivityClassifier::select(None, &heuristic).unwrap();
        assert_eq!(none.method(), AnalysisMethod::Heuristic);

        let no_backend = ModelComponents {
            backend: None,
            ..model_components()
        };
        assert!(!ActivityClassifier::select(Some(no_backend), &heuristic)
            .unwrap()
            .is_model_active());

        let no_labels = ModelComponents {
            labels: Vec::new(),
            ..model_components()
        };
        assert!(!ActivityClassifier::select(Some(no_labels), &heuristic)
            .unwrap()
            .is_model_active());

        let no_preprocess = ModelComponents {
            preprocess: None,
            ..model_components()
        };
        let classifier = ActivityClassifier::select(Some(no_preprocess), &heuristic).unwrap();
        assert_eq!(classifier.labels(), vec!["sleeping", "drinking", "eating", "idle"]);
    }

    #[test]
    fn test_still_clip_is_idle_and_source_released() {
        let analyzer = ActivityAnalyzer::heuristic(SamplingParams::default()).unwrap();
        let source = still_clip(300);
        let released = source.release_flag();

        let result = analyzer.analyze_source(Box::new(source)).unwrap();

        assert!(released.load(Ordering::SeqCst));
        assert_eq!(result.detected_activity(), "idle");
        assert_eq!(result.analysis_method(), AnalysisMethod::Heuristic);
        assert_eq!(result.frames_analyzed(), 30);
        assert_eq!(result.movement_score(), Some(0.0));
    }

    #[test]
    fn test_single_admitted_frame_is_insufficient() {
        let analyzer = ActivityAnalyzer::heuristic(SamplingParams::default()).unwrap();
        let err = analyzer.analyze_source(Box::new(still_clip(5))).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientSamples { admitted: 1 }));
    }

    #[test]
    fn test_model_analyzer_uses_model_labels() {
        let classifier =
            ActivityClassifier::select(Some(model_components()), &HeuristicConfig::default()).unwrap();
        let analyzer = ActivityAnalyzer::new(
            classifier,
            HeuristicActivityClassifier::default(),
            SamplingParams::default(),
        )
        .unwrap();

        let result = analyzer.analyze_source(Box::new(still_clip(40))).unwrap();
        assert_eq!(result.analysis_method(), AnalysisMethod::Model);
        assert_eq!(result.detected_activity(), "standing");
        assert_eq!(result.frames_analyzed(), 4);

        let status = analyzer.status();
        assert!(status.model_active);
        assert_eq!(status.labels, vec!["standing", "sitting"]);
    }

    #[test]
    fn test_admitted_count_includes_skipped_model_frames() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_infer().returning(|input| {
            if input[[0, 0, 0, 0]] > 1.0 {
                Err(AnalysisError::inference_failed("overexposed"))
            } else {
                Ok(vec![3.0, 0.0])
            }
        });
        let components = ModelComponents {
            backend: Some(Arc::new(mock)),
            ..model_components()
        };
        let classifier =
            ActivityClassifier::select(Some(components), &HeuristicConfig::default()).unwrap();
        let source = MemoryFrameSource::from_fn(40, 30.0, |i| {
            let v = if i == 10 { 255 } else { 30 };
            Frame::from_pixel(16, 16, Rgb([v, v, v]))
        });
        let sampler = FrameSampler::open(Box::new(source), &SamplingParams::default()).unwrap();

        let (result, summary) = classifier.analyze_sampled(sampler).unwrap();
        assert_eq!(summary.frames_admitted, 4);
        assert_eq!(result.frames_analyzed(), 3);
    }

    #[test]
    fn test_scenarios_use_heuristic() {
        let classifier =
            ActivityClassifier::select(Some(model_components()), &HeuristicConfig::default()).unwrap();
        let analyzer = ActivityAnalyzer::new(
            classifier,
            HeuristicActivityClassifier::default(),
            SamplingParams::default(),
        )
        .unwrap();

        let laptop = analyzer.classify_scenario(Scenario::Laptop).unwrap();
        assert_eq!(laptop.detected_activity(), "idle");
        assert!((laptop.confidence() - 0.90).abs() < 1e-9);
        assert_eq!(laptop.analysis_method(), AnalysisMethod::Heuristic);

        let sleeping = analyzer.classify_scenario(Scenario::Sleeping).unwrap();
        assert_eq!(sleeping.detected_activity(), "sleeping");
        assert_eq!(sleeping.frames_analyzed(), 30);
    }

    #[test]
    fn test_from_config_without_model_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AnalyzerConfig {
            model_dir: Some(dir.path().to_path_buf()),
            ..AnalyzerConfig::default()
        };
        let analyzer = ActivityAnalyzer::from_config(&config).unwrap();
        assert_eq!(analyzer.method(), AnalysisMethod::Heuristic);
        assert!(!analyzer.status().model_active);
    }

    #[test]
    fn test_from_config_with_malformed_artifacts_stays_heuristic() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("model.onnx"), b"onnx").unwrap();
        std::fs::write(dir.path().join("labels.json"), b"{broken").unwrap();
        std::fs::write(dir.path().join("preprocess.json"), b"{}").unwrap();

        let config = AnalyzerConfig {
            model_dir: Some(dir.path().to_path_buf()),
            ..AnalyzerConfig::default()
        };
        let analyzer = ActivityAnalyzer::from_config(&config).unwrap();
        assert_eq!(analyzer.method(), AnalysisMethod::Heuristic);
    }

    #[test]
    fn test_from_config_with_bad_heuristic_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"thresholds\": 5}").unwrap();

        let config = AnalyzerConfig {
            model_dir: Some(PathBuf::from("/nonexistent")),
            heuristic_config_path: Some(file.path().to_path_buf()),
            ..AnalyzerConfig::default()
        };
        assert!(ActivityAnalyzer::from_config(&config).is_err());
    }

    #[test]
    fn test_invalid_sampling_rejected() {
        let sampling = SamplingParams {
            stride: Stride::Frames(0),
            ..SamplingParams::default()
        };
        assert!(matches!(
            ActivityAnalyzer::heuristic(sampling),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let analyzer = ActivityAnalyzer::heuristic(SamplingParams::default()).unwrap();
        assert!(matches!(
            analyzer.analyze_file("/nonexistent/clip.mp4"),
            Err(AnalysisError::SourceUnavailable(_))
        ));
    }
}
