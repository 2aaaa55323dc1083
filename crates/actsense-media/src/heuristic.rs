//! Heuristic activity classification from motion statistics.
//!
//! # Decision procedure
//!
//! Statistics are matched against an ordered band table; the first band whose
//! condition holds decides the label and its confidence. The final band has
//! no condition, so every input lands somewhere.
//!
//! | Band | Condition | Label |
//! |------|-----------|-------|
//! | sustained_low_activity | mean < t1, variance < v1, max < m1 | idle |
//! | very_low_movement | mean < t2 | sleeping |
//! | low_movement | mean < t3 | idle |
//! | drinking_bursts | mean < t4, variance > v2 | drinking |
//! | calm_low_movement | mean < t4 | idle |
//! | eating_motion | mean < t5, variance > v3 | eating |
//! | moderate_bursts | mean < t5, variance > v2 | drinking |
//! | moderate_steady | mean < t5 | idle |
//! | high_motion | always | eating if variance > v4, else drinking |
//!
//! # Distribution
//!
//! The winning label receives the band confidence. The remainder is split
//! over the other labels by a residual table row keyed on the winner, which
//! encodes which confusions are plausible (sleeping vs idle) and which are not
//! (sleeping vs eating).
//!
//! All thresholds were tuned by hand against a small set of clips and are
//! meant to be retuned, not treated as physical constants.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use actsense_models::{ActivityLabel, ClassificationResult, MovementStats, ProbabilityDistribution};

use crate::error::{AnalysisError, AnalysisResult};
use crate::motion::{MotionConfig, MotionFeatureExtractor};
use crate::sampler::{FrameSampler, SampleSummary};
use crate::stats::MotionStatistics;

const LABEL_COUNT: usize = 4;

/// Band thresholds and confidences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicThresholds {
    /// t1: mean ceiling of the sustained-low-activity band.
    pub sustained_mean: f64,
    /// v1: variance ceiling of the sustained-low-activity band.
    pub sustained_variance: f64,
    /// m1: peak ceiling of the sustained-low-activity band.
    pub sustained_max: f64,
    /// t2: mean ceiling for sleeping.
    pub sleeping_mean: f64,
    /// t3: mean ceiling for low-movement idle.
    pub low_mean: f64,
    /// t4: mean ceiling of the drinking bands.
    pub drinking_mean: f64,
    /// t5: mean ceiling of the moderate bands.
    pub moderate_mean: f64,
    /// v2: variance above which low/moderate movement is bursty.
    pub burst_variance: f64,
    /// v3: variance above which moderate movement counts as eating.
    pub eating_variance: f64,
    /// v4: variance splitting eating from drinking in the high-motion band.
    pub high_motion_variance: f64,

    /// c1
    pub sustained_confidence: f64,
    /// c2
    pub sleeping_confidence: f64,
    /// c3
    pub low_idle_confidence: f64,
    /// c4, shared by both drinking bands.
    pub drinking_confidence: f64,
    /// c5
    pub calm_idle_confidence: f64,
    /// c6
    pub eating_confidence: f64,
    /// c7
    pub moderate_idle_confidence: f64,
    /// c8
    pub high_motion_confidence: f64,
}

impl Default for HeuristicThresholds {
    fn default() -> Self {
        Self {
            sustained_mean: 0.002,
            sustained_variance: 0.0005,
            sustained_max: 0.05,
            sleeping_mean: 0.005,
            low_mean: 0.015,
            drinking_mean: 0.04,
            moderate_mean: 0.08,
            burst_variance: 0.0005,
            eating_variance: 0.002,
            high_motion_variance: 0.005,

            sustained_confidence: 0.90,
            sleeping_confidence: 0.90,
            low_idle_confidence: 0.75,
            drinking_confidence: 0.65,
            calm_idle_confidence: 0.60,
            eating_confidence: 0.70,
            moderate_idle_confidence: 0.55,
            high_motion_confidence: 0.60,
        }
    }
}

/// Conjunction of bounds over (mean, variance, max). Unset bounds always pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Condition {
    pub mean_below: Option<f64>,
    pub variance_below: Option<f64>,
    pub variance_above: Option<f64>,
    pub max_below: Option<f64>,
}

impl Condition {
    pub const ALWAYS: Condition = Condition {
        mean_below: None,
        variance_below: None,
        variance_above: None,
        max_below: None,
    };

    fn mean_below(t: f64) -> Self {
        Self {
            mean_below: Some(t),
            ..Self::ALWAYS
        }
    }

    pub fn is_unconditional(&self) -> bool {
        *self == Self::ALWAYS
    }

    pub fn matches(&self, stats: &MovementStats) -> bool {
        self.mean_below.map_or(true, |t| stats.mean < t)
            && self.variance_below.map_or(true, |v| stats.variance < v)
            && self.variance_above.map_or(true, |v| stats.variance > v)
            && self.max_below.map_or(true, |m| stats.max < m)
    }
}

/// What a band decides once it matches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Label(ActivityLabel),
    /// Pick `above` when variance exceeds `threshold`, otherwise `otherwise`.
    SplitByVariance {
        threshold: f64,
        above: ActivityLabel,
        otherwise: ActivityLabel,
    },
}

impl Outcome {
    fn resolve(&self, stats: &MovementStats) -> ActivityLabel {
        match *self {
            Outcome::Label(label) => label,
            Outcome::SplitByVariance {
                threshold,
                above,
                otherwise,
            } => {
                if stats.variance > threshold {
                    above
                } else {
                    otherwise
                }
            }
        }
    }
}

/// One row of the decision table.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: &'static str,
    pub condition: Condition,
    pub outcome: Outcome,
    pub confidence: f64,
}

/// Ordered, first-match decision table.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTable {
    bands: Vec<Band>,
}

impl DecisionTable {
    /// Build the standard nine-band table from thresholds.
    pub fn from_thresholds(t: &HeuristicThresholds) -> Self {
        use ActivityLabel::*;

        let bands = vec![
            Band {
                name: "sustained_low_activity",
                condition: Condition {
                    mean_below: Some(t.sustained_mean),
                    variance_below: Some(t.sustained_variance),
                    max_below: Some(t.sustained_max),
                    ..Condition::ALWAYS
                },
                outcome: Outcome::Label(Idle),
                confidence: t.sustained_confidence,
            },
            Band {
                name: "very_low_movement",
                condition: Condition::mean_below(t.sleeping_mean),
                outcome: Outcome::Label(Sleeping),
                confidence: t.sleeping_confidence,
            },
            Band {
                name: "low_movement",
                condition: Condition::mean_below(t.low_mean),
                outcome: Outcome::Label(Idle),
                confidence: t.low_idle_confidence,
            },
            Band {
                name: "drinking_bursts",
                condition: Condition {
                    mean_below: Some(t.drinking_mean),
                    variance_above: Some(t.burst_variance),
                    ..Condition::ALWAYS
                },
                outcome: Outcome::Label(Drinking),
                confidence: t.drinking_confidence,
            },
            Band {
                name: "calm_low_movement",
                condition: Condition::mean_below(t.drinking_mean),
                outcome: Outcome::Label(Idle),
                confidence: t.calm_idle_confidence,
            },
            Band {
                name: "eating_motion",
                condition: Condition {
                    mean_below: Some(t.moderate_mean),
                    variance_above: Some(t.eating_variance),
                    ..Condition::ALWAYS
                },
                outcome: Outcome::Label(Eating),
                confidence: t.eating_confidence,
            },
            Band {
                name: "moderate_bursts",
                condition: Condition {
                    mean_below: Some(t.moderate_mean),
                    variance_above: Some(t.burst_variance),
                    ..Condition::ALWAYS
                },
                outcome: Outcome::Label(Drinking),
                confidence: t.drinking_confidence,
            },
            Band {
                name: "moderate_steady",
                condition: Condition::mean_below(t.moderate_mean),
                outcome: Outcome::Label(Idle),
                confidence: t.moderate_idle_confidence,
            },
            Band {
                name: "high_motion",
                condition: Condition::ALWAYS,
                outcome: Outcome::SplitByVariance {
                    threshold: t.high_motion_variance,
                    above: Eating,
                    otherwise: Drinking,
                },
                confidence: t.high_motion_confidence,
            },
        ];

        Self { bands }
    }

    /// Build from explicit bands. Validated by [`DecisionTable::validate`].
    pub fn from_bands(bands: Vec<Band>) -> AnalysisResult<Self> {
        let table = Self { bands };
        table.validate()?;
        Ok(table)
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// The table must end in an unconditional band and carry usable confidences.
    pub fn validate(&self) -> AnalysisResult<()> {
        let last = self
            .bands
            .last()
            .ok_or_else(|| AnalysisError::invalid_config("decision table has no bands"))?;
        if !last.condition.is_unconditional() {
            return Err(AnalysisError::invalid_config(format!(
                "last band '{}' must be unconditional",
                last.name
            )));
        }
        for band in &self.bands {
            if !(band.confidence > 0.0 && band.confidence <= 1.0) {
                return Err(AnalysisError::invalid_config(format!(
                    "band '{}' confidence {} outside (0, 1]",
                    band.name, band.confidence
                )));
            }
        }
        Ok(())
    }

    /// Index of the first matching band.
    pub fn matching_band(&self, stats: &MovementStats) -> usize {
        self.bands
            .iter()
            .position(|band| band.condition.matches(stats))
            .unwrap_or(self.bands.len().saturating_sub(1))
    }
}

/// Residual weights per winning label, indexed `[winner][other]` in
/// [`ActivityLabel::ALL`] order. The diagonal is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResidualTable(pub [[f64; LABEL_COUNT]; LABEL_COUNT]);

impl Default for ResidualTable {
    fn default() -> Self {
        //           sleeping drinking eating idle
        Self([
            [0.00, 0.10, 0.05, 0.85], // sleeping
            [0.10, 0.00, 0.55, 0.35], // drinking
            [0.10, 0.60, 0.00, 0.30], // eating
            [0.90, 0.06, 0.04, 0.00], // idle
        ])
    }
}

impl ResidualTable {
    /// Off-diagonal weights must be finite, non-negative and not all zero.
    pub fn validate(&self) -> AnalysisResult<()> {
        for winner in ActivityLabel::ALL {
            let row = &self.0[winner.index()];
            let mut total = 0.0;
            for other in ActivityLabel::ALL.iter().filter(|l| *l != winner) {
                let w = row[other.index()];
                if !w.is_finite() || w < 0.0 {
                    return Err(AnalysisError::invalid_config(format!(
                        "residual weight {winner}->{other} is {w}"
                    )));
                }
                total += w;
            }
            if total <= 0.0 {
                return Err(AnalysisError::invalid_config(format!(
                    "residual row for {winner} has no weight"
                )));
            }
        }
        Ok(())
    }

    /// Full score vector: `confidence` on the winner, the remainder split by
    /// the winner's row.
    pub fn scores(&self, winner: ActivityLabel, confidence: f64) -> [f64; LABEL_COUNT] {
        let row = &self.0[winner.index()];
        let row_total: f64 = ActivityLabel::ALL
            .iter()
            .filter(|l| **l != winner)
            .map(|l| row[l.index()])
            .sum();
        let remainder = (1.0 - confidence).max(0.0);

        let mut scores = [0.0; LABEL_COUNT];
        for label in ActivityLabel::ALL {
            scores[label.index()] = if *label == winner {
                confidence
            } else if row_total > 0.0 {
                remainder * row[label.index()] / row_total
            } else {
                0.0
            };
        }
        scores
    }

    pub fn distribution(
        &self,
        winner: ActivityLabel,
        confidence: f64,
    ) -> AnalysisResult<ProbabilityDistribution> {
        let labels: Vec<&str> = ActivityLabel::ALL.iter().map(|l| l.as_str()).collect();
        Ok(ProbabilityDistribution::from_scores(
            labels.as_slice(),
            &self.scores(winner, confidence),
        )?)
    }
}

/// Tunables of the whole heuristic path. Loadable from JSON; missing fields
/// fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    pub thresholds: HeuristicThresholds,
    pub residuals: ResidualTable,
    pub motion: MotionConfig,
}

impl HeuristicConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        info!(path = %path.as_ref().display(), "Loaded heuristic config");
        Ok(config)
    }
}

/// Outcome of the decision procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicVerdict {
    pub label: ActivityLabel,
    pub confidence: f64,
    /// Name of the band that matched.
    pub band: &'static str,
    pub distribution: ProbabilityDistribution,
}

/// Deterministic classifier over [`MovementStats`].
#[derive(Debug, Clone)]
pub struct HeuristicActivityClassifier {
    table: DecisionTable,
    residuals: ResidualTable,
    motion: MotionConfig,
}

impl HeuristicActivityClassifier {
    pub fn new(config: &HeuristicConfig) -> AnalysisResult<Self> {
        Self::with_table(
            DecisionTable::from_thresholds(&config.thresholds),
            config.residuals,
            config.motion,
        )
    }

    pub fn with_table(
        table: DecisionTable,
        residuals: ResidualTable,
        motion: MotionConfig,
    ) -> AnalysisResult<Self> {
        table.validate()?;
        residuals.validate()?;
        Ok(Self {
            table,
            residuals,
            motion,
        })
    }

    pub fn table(&self) -> &DecisionTable {
        &self.table
    }

    pub fn labels(&self) -> Vec<String> {
        ActivityLabel::ALL.iter().map(|l| l.to_string()).collect()
    }

    /// Run the decision table. Pure: same statistics, same verdict.
    pub fn classify(&self, stats: &MovementStats) -> AnalysisResult<HeuristicVerdict> {
        let index = self.table.matching_band(stats);
        let band = &self.table.bands()[index];
        let label = band.outcome.resolve(stats);
        let distribution = self.residuals.distribution(label, band.confidence)?;

        debug!(
            band = band.name,
            label = %label,
            mean = stats.mean,
            variance = stats.variance,
            max = stats.max,
            "Heuristic band matched"
        );

        Ok(HeuristicVerdict {
            label,
            confidence: distribution.get(label.as_str()).unwrap_or(band.confidence),
            band: band.name,
            distribution,
        })
    }

    /// Full heuristic pipeline: difference admitted frames, reduce, classify.
    pub fn analyze(&self, sampler: FrameSampler) -> AnalysisResult<ClassificationResult> {
        self.analyze_sampled(sampler).map(|(result, _)| result)
    }

    /// Like [`analyze`](Self::analyze), also returning the sampler summary.
    pub fn analyze_sampled(
        &self,
        mut sampler: FrameSampler,
    ) -> AnalysisResult<(ClassificationResult, SampleSummary)> {
        let mut extractor = MotionFeatureExtractor::new(self.motion);
        let mut acc = MotionStatistics::new();

        for sample in sampler.by_ref() {
            let sample = sample?;
            if let Some(ratio) = extractor.push(&sample.frame) {
                acc.push(ratio);
            }
        }

        let summary = sampler.summary();
        drop(sampler);

        if acc.is_empty() {
            return Err(AnalysisError::InsufficientSamples {
                admitted: summary.frames_admitted,
            });
        }
        let stats = acc.finish()?;
        let verdict = self.classify(&stats)?;

        info!(
            activity = %verdict.label,
            confidence = verdict.confidence,
            band = verdict.band,
            frames = summary.frames_admitted,
            "Heuristic analysis complete"
        );

        let result = ClassificationResult::heuristic(
            verdict.label.as_str(),
            verdict.distribution,
            stats,
            summary.frames_admitted,
            summary.duration_sec(),
        );
        Ok((result, summary))
    }
}

impl Default for HeuristicActivityClassifier {
    fn default() -> Self {
        let config = HeuristicConfig::default();
        Self {
            table: DecisionTable::from_thresholds(&config.thresholds),
            residuals: config.residuals,
            motion: config.motion,
        }
    }
}
