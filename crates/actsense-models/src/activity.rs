//! Activity label definitions.
//!
//! The heuristic classifier works over a closed set of labels:
//!
//! - `Sleeping`: very low, steady movement
//! - `Drinking`: low movement with bursts (lifting a cup)
//! - `Eating`: moderate, irregular movement
//! - `Idle`: low activity that is not sleep (reading, laptop use)
//!
//! A trained model brings its own ordered label list, so distributions are
//! keyed by plain strings and these labels are only one possible vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Activity label produced by the heuristic classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLabel {
    Sleeping,
    Drinking,
    Eating,
    Idle,
}

impl ActivityLabel {
    /// All heuristic labels, in distribution order.
    pub const ALL: &'static [ActivityLabel] = &[
        ActivityLabel::Sleeping,
        ActivityLabel::Drinking,
        ActivityLabel::Eating,
        ActivityLabel::Idle,
    ];

    /// Returns the label name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLabel::Sleeping => "sleeping",
            ActivityLabel::Drinking => "drinking",
            ActivityLabel::Eating => "eating",
            ActivityLabel::Idle => "idle",
        }
    }

    /// Position of this label in [`ActivityLabel::ALL`].
    pub fn index(&self) -> usize {
        match self {
            ActivityLabel::Sleeping => 0,
            ActivityLabel::Drinking => 1,
            ActivityLabel::Eating => 2,
            ActivityLabel::Idle => 3,
        }
    }
}

impl fmt::Display for ActivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActivityLabel {
    type Err = ActivityLabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sleeping" | "sleep" => Ok(ActivityLabel::Sleeping),
            "drinking" | "drink" => Ok(ActivityLabel::Drinking),
            "eating" | "eat" => Ok(ActivityLabel::Eating),
            "idle" => Ok(ActivityLabel::Idle),
            _ => Err(ActivityLabelParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown activity label: {0}")]
pub struct ActivityLabelParseError(String);

/// Which classifier path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    /// Motion statistics + decision table.
    Heuristic,
    /// Per-frame classifier averaged over the clip.
    Model,
}

impl AnalysisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMethod::Heuristic => "heuristic",
            AnalysisMethod::Model => "model",
        }
    }

    /// Human-readable description, reported by the health endpoint.
    pub fn description(&self) -> &'static str {
        match self {
            AnalysisMethod::Heuristic => "Motion statistics with decision table",
            AnalysisMethod::Model => "Per-frame classifier averaged over time",
        }
    }
}

impl fmt::Display for AnalysisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_roundtrip_through_str() {
        for label in ActivityLabel::ALL {
            assert_eq!(label.as_str().parse::<ActivityLabel>().unwrap(), *label);
        }
        assert!("running".parse::<ActivityLabel>().is_err());
    }

    #[test]
    fn test_index_matches_all_order() {
        for (i, label) in ActivityLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
        }
    }

    #[test]
    fn test_method_serializes_as_tag() {
        assert_eq!(
            serde_json::to_string(&AnalysisMethod::Heuristic).unwrap(),
            "\"heuristic\""
        );
        assert_eq!(serde_json::to_string(&AnalysisMethod::Model).unwrap(), "\"model\"");
    }
}
