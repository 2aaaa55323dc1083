//! Classification result record.

use serde::{Deserialize, Serialize};

use crate::activity::AnalysisMethod;
use crate::distribution::ProbabilityDistribution;

/// Summary statistics of the per-step movement ratios of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementStats {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    /// Population variance.
    pub variance: f64,
}

impl MovementStats {
    pub const fn new(mean: f64, max: f64, min: f64, variance: f64) -> Self {
        Self {
            mean,
            max,
            min,
            variance,
        }
    }

    /// Mean movement as a percentage rounded to one decimal.
    pub fn movement_score(&self) -> f64 {
        (self.mean * 1000.0).round() / 10.0
    }
}

/// Outcome of one analysis call, produced by either classifier path.
///
/// Built once and never mutated; the transport layer owns it for
/// serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    detected_activity: String,
    confidence: f64,
    all_activities: ProbabilityDistribution,
    analysis_method: AnalysisMethod,
    frames_analyzed: usize,
    duration_sec: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    movement_stats: Option<MovementStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    movement_score: Option<f64>,
}

impl ClassificationResult {
    /// Result of the heuristic path. `confidence` is read from the distribution
    /// so the two can never disagree.
    pub fn heuristic(
        detected: &str,
        distribution: ProbabilityDistribution,
        stats: MovementStats,
        frames_analyzed: usize,
        duration_sec: f64,
    ) -> Self {
        Self::build(
            detected,
            distribution,
            AnalysisMethod::Heuristic,
            frames_analyzed,
            duration_sec,
            Some(stats),
        )
    }

    /// Result of the model path: detected label is the distribution's argmax.
    pub fn model(distribution: ProbabilityDistribution, frames_analyzed: usize, duration_sec: f64) -> Self {
        let detected = distribution.argmax().0.to_string();
        Self::build(
            &detected,
            distribution,
            AnalysisMethod::Model,
            frames_analyzed,
            duration_sec,
            None,
        )
    }

    fn build(
        detected: &str,
        distribution: ProbabilityDistribution,
        method: AnalysisMethod,
        frames_analyzed: usize,
        duration_sec: f64,
        stats: Option<MovementStats>,
    ) -> Self {
        let confidence = distribution.get(detected).unwrap_or(0.0);
        Self {
            detected_activity: detected.to_string(),
            confidence,
            all_activities: distribution,
            analysis_method: method,
            frames_analyzed,
            duration_sec: round2(duration_sec.max(0.0)),
            movement_score: stats.map(|s| s.movement_score()),
            movement_stats: stats,
        }
    }

    pub fn detected_activity(&self) -> &str {
        &self.detected_activity
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn all_activities(&self) -> &ProbabilityDistribution {
        &self.all_activities
    }

    pub fn analysis_method(&self) -> AnalysisMethod {
        self.analysis_method
    }

    pub fn frames_analyzed(&self) -> usize {
        self.frames_analyzed
    }

    pub fn duration_sec(&self) -> f64 {
        self.duration_sec
    }

    pub fn movement_stats(&self) -> Option<&MovementStats> {
        self.movement_stats.as_ref()
    }

    pub fn movement_score(&self) -> Option<f64> {
        self.movement_score
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist() -> ProbabilityDistribution {
        ProbabilityDistribution::from_scores(
            &["sleeping", "drinking", "eating", "idle"],
            &[0.9, 0.015, 0.01, 0.075],
        )
        .unwrap()
    }

    #[test]
    fn test_heuristic_result_json_shape() {
        let stats = MovementStats::new(0.152, 0.3, 0.01, 0.002);
        let result = ClassificationResult::heuristic("sleeping", dist(), stats, 30, 10.456);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["detected_activity"], "sleeping");
        assert_eq!(json["analysis_method"], "heuristic");
        assert_eq!(json["frames_analyzed"], 30);
        assert_eq!(json["duration_sec"], 10.46);
        assert_eq!(json["movement_score"], 15.2);
        assert_eq!(json["movement_stats"]["max"], 0.3);
        assert!((json["confidence"].as_f64().unwrap() - 0.9).abs() < 1e-9);
        assert_eq!(json["all_activities"].as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_model_result_omits_movement_fields() {
        let result = ClassificationResult::model(dist(), 12, 4.0);
        assert_eq!(result.detected_activity(), "sleeping");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("movement_stats").is_none());
        assert!(json.get("movement_score").is_none());
        assert_eq!(json["analysis_method"], "model");
    }
}
