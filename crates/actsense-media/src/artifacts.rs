//! Model artifact discovery.
//!
//! A model directory holds three files:
//!
//! | File | Content |
//! |------|---------|
//! | `model.onnx` | Frozen per-frame classifier |
//! | `labels.json` or `labels.txt` | Ordered labels (JSON array, or one per line) |
//! | `preprocess.json` | [`PreprocessConfig`] |
//!
//! A directory missing any of them is not an error; the caller falls back to
//! the heuristic path. Files that exist but cannot be parsed are
//! `InvalidConfig`.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{AnalysisError, AnalysisResult};
use crate::preprocess::PreprocessConfig;

pub const MODEL_FILE: &str = "model.onnx";
pub const LABELS_JSON_FILE: &str = "labels.json";
pub const LABELS_TEXT_FILE: &str = "labels.txt";
pub const PREPROCESS_FILE: &str = "preprocess.json";

/// Everything needed to build the model path, minus the loaded session.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifacts {
    pub model_path: PathBuf,
    pub labels: Vec<String>,
    pub preprocess: PreprocessConfig,
}

impl ModelArtifacts {
    /// Read the artifacts in `dir`. `Ok(None)` when any file is absent.
    pub fn discover(dir: impl AsRef<Path>) -> AnalysisResult<Option<Self>> {
        let dir = dir.as_ref();

        let model_path = dir.join(MODEL_FILE);
        if !model_path.is_file() {
            debug!(dir = %dir.display(), "No model file found");
            return Ok(None);
        }

        let labels = match find_labels_file(dir) {
            Some(path) => load_labels(&path)?,
            None => {
                debug!(dir = %dir.display(), "No label file found");
                return Ok(None);
            }
        };

        let preprocess_path = dir.join(PREPROCESS_FILE);
        if !preprocess_path.is_file() {
            debug!(dir = %dir.display(), "No preprocess config found");
            return Ok(None);
        }
        let preprocess = load_preprocess(&preprocess_path)?;

        info!(
            dir = %dir.display(),
            labels = labels.len(),
            "Model artifacts discovered"
        );

        Ok(Some(Self {
            model_path,
            labels,
            preprocess,
        }))
    }
}

fn find_labels_file(dir: &Path) -> Option<PathBuf> {
    [LABELS_JSON_FILE, LABELS_TEXT_FILE]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Load an ordered label list. JSON files hold an array of strings; anything
/// else is read as one label per non-blank line.
pub fn load_labels(path: &Path) -> AnalysisResult<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");

    let labels: Vec<String> = if is_json {
        serde_json::from_str(&raw).map_err(|e| {
            AnalysisError::invalid_config(format!("{}: {e}", path.display()))
        })?
    } else {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect()
    };

    if labels.is_empty() {
        return Err(AnalysisError::invalid_config(format!(
            "{}: label list is empty",
            path.display()
        )));
    }
    Ok(labels)
}

fn load_preprocess(path: &Path) -> AnalysisResult<PreprocessConfig> {
    let raw = std::fs::read_to_string(path)?;
    let config: PreprocessConfig = serde_json::from_str(&raw)
        .map_err(|e| AnalysisError::invalid_config(format!("{}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Directories searched for a model when none is configured.
#[derive(Debug, Clone)]
pub struct ModelSearchPaths {
    pub directories: Vec<PathBuf>,
}

impl Default for ModelSearchPaths {
    fn default() -> Self {
        Self {
            directories: vec![
                // Container layout
                PathBuf::from("/app/models/activity"),
                // Development
                PathBuf::from("./models/activity"),
            ],
        }
    }
}

impl ModelSearchPaths {
    /// First directory that contains a model file.
    pub fn find_model_dir(&self) -> Option<PathBuf> {
        self.directories
            .iter()
            .find(|dir| dir.join(MODEL_FILE).is_file())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PREPROCESS: &str =
        r#"{"resize": 256, "crop": 224, "mean": [0.485, 0.456, 0.406], "std": [0.229, 0.224, 0.225]}"#;

    fn model_dir(labels: Option<(&str, &str)>, preprocess: Option<&str>) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MODEL_FILE), b"onnx").unwrap();
        if let Some((name, content)) = labels {
            fs::write(dir.path().join(name), content).unwrap();
        }
        if let Some(content) = preprocess {
            fs::write(dir.path().join(PREPROCESS_FILE), content).unwrap();
        }
        dir
    }

    #[test]
    fn test_discover_complete_directory() {
        let dir = model_dir(
            Some((LABELS_JSON_FILE, r#"["sitting", "standing", "walking"]"#)),
            Some(PREPROCESS),
        );
        let artifacts = ModelArtifacts::discover(dir.path()).unwrap().unwrap();
        assert_eq!(artifacts.labels, vec!["sitting", "standing", "walking"]);
        assert_eq!(artifacts.preprocess, PreprocessConfig::default());
        assert_eq!(artifacts.model_path, dir.path().join(MODEL_FILE));
    }

    #[test]
    fn test_text_labels() {
        let dir = model_dir(Some((LABELS_TEXT_FILE, "sitting\n\n  walking \n")), Some(PREPROCESS));
        let artifacts = ModelArtifacts::discover(dir.path()).unwrap().unwrap();
        assert_eq!(artifacts.labels, vec!["sitting", "walking"]);
    }

    #[test]
    fn test_missing_pieces_route_to_heuristic() {
        let empty = TempDir::new().unwrap();
        assert!(ModelArtifacts::discover(empty.path()).unwrap().is_none());

        let no_labels = model_dir(None, Some(PREPROCESS));
        assert!(ModelArtifacts::discover(no_labels.path()).unwrap().is_none());

        let no_preprocess = model_dir(Some((LABELS_JSON_FILE, r#"["a"]"#)), None);
        assert!(ModelArtifacts::discover(no_preprocess.path()).unwrap().is_none());
    }

    #[test]
    fn test_malformed_files_are_invalid_config() {
        let bad_labels = model_dir(Some((LABELS_JSON_FILE, "{not json")), Some(PREPROCESS));
        assert!(matches!(
            ModelArtifacts::discover(bad_labels.path()),
            Err(AnalysisError::InvalidConfig(_))
        ));

        let empty_labels = model_dir(Some((LABELS_JSON_FILE, "[]")), Some(PREPROCESS));
        assert!(matches!(
            ModelArtifacts::discover(empty_labels.path()),
            Err(AnalysisError::InvalidConfig(_))
        ));

        let crop_too_big = model_dir(
            Some((LABELS_JSON_FILE, r#"["a"]"#)),
            Some(r#"{"resize": 100, "crop": 224, "mean": [0, 0, 0], "std": [1, 1, 1]}"#),
        );
        assert!(matches!(
            ModelArtifacts::discover(crop_too_big.path()),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_search_paths() {
        let dir = model_dir(None, None);
        let paths = ModelSearchPaths {
            directories: vec![PathBuf::from("/nonexistent/models"), dir.path().to_path_buf()],
        };
        assert_eq!(paths.find_model_dir(), Some(dir.path().to_path_buf()));
    }
}
