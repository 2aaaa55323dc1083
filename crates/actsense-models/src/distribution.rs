//! Probability distributions over activity labels.
//!
//! A distribution keeps its labels in declaration order (the order of the
//! heuristic label set or of a model's label file) and serializes as a JSON
//! object in that order. Construction always normalizes, so every value a
//! caller can observe sums to 1.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Allowed deviation of a distribution's sum from 1.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Errors raised when building a distribution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    #[error("Distribution has no labels")]
    Empty,

    #[error("Label count {labels} does not match score count {scores}")]
    LengthMismatch { labels: usize, scores: usize },

    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("Invalid score {score} for label {label}")]
    InvalidScore { label: String, score: f64 },

    #[error("Scores sum to zero")]
    ZeroMass,
}

/// Label → probability mapping whose values sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityDistribution {
    entries: Vec<(String, f64)>,
}

impl ProbabilityDistribution {
    /// Build a distribution from parallel label and score slices.
    ///
    /// Scores must be finite and non-negative with a positive total; they are
    /// renormalized to sum to 1.
    pub fn from_scores<S: AsRef<str>>(labels: &[S], scores: &[f64]) -> Result<Self, DistributionError> {
        if labels.len() != scores.len() {
            return Err(DistributionError::LengthMismatch {
                labels: labels.len(),
                scores: scores.len(),
            });
        }
        Self::from_pairs(
            labels
                .iter()
                .zip(scores.iter())
                .map(|(l, s)| (l.as_ref().to_string(), *s)),
        )
    }

    /// Build a distribution from `(label, score)` pairs, keeping their order.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, DistributionError>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let entries: Vec<(String, f64)> = pairs.into_iter().collect();
        if entries.is_empty() {
            return Err(DistributionError::Empty);
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for (label, score) in &entries {
            if !seen.insert(label.as_str()) {
                return Err(DistributionError::DuplicateLabel(label.clone()));
            }
            if !score.is_finite() || *score < 0.0 {
                return Err(DistributionError::InvalidScore {
                    label: label.clone(),
                    score: *score,
                });
            }
        }

        let total: f64 = entries.iter().map(|(_, s)| s).sum();
        if total <= 0.0 {
            return Err(DistributionError::ZeroMass);
        }

        let entries = entries
            .into_iter()
            .map(|(label, score)| (label, score / total))
            .collect();

        Ok(Self { entries })
    }

    /// Probability for a label, if declared.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, p)| *p)
    }

    /// Label with the highest probability. Ties resolve to the first declared label.
    pub fn argmax(&self) -> (&str, f64) {
        let mut best = &self.entries[0];
        for entry in &self.entries[1..] {
            if entry.1 > best.1 {
                best = entry;
            }
        }
        (best.0.as_str(), best.1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all probabilities (1 within [`DISTRIBUTION_TOLERANCE`]).
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, p)| p).sum()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(l, p)| (l.as_str(), *p))
    }
}

impl Serialize for ProbabilityDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, p) in &self.entries {
            map.serialize_entry(label, p)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProbabilityDistribution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DistributionVisitor;

        impl<'de> Visitor<'de> for DistributionVisitor {
            type Value = ProbabilityDistribution;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of label to probability")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(4));
                while let Some((label, p)) = access.next_entry::<String, f64>()? {
                    pairs.push((label, p));
                }
                ProbabilityDistribution::from_pairs(pairs).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_map(DistributionVisitor)
    }
}
