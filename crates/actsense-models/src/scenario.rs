//! Canned motion scenarios.
//!
//! Each scenario carries representative movement statistics so the decision
//! procedure can be exercised end to end without a video upload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::result::MovementStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Sleeping,
    /// Sitting still in front of a laptop: near-zero, steady movement.
    Laptop,
    Drinking,
    Eating,
    /// Awake but barely moving: low, steady movement above the sleep band.
    Idle,
}

impl Scenario {
    pub const ALL: &'static [Scenario] = &[
        Scenario::Sleeping,
        Scenario::Laptop,
        Scenario::Drinking,
        Scenario::Eating,
        Scenario::Idle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Sleeping => "sleeping",
            Scenario::Laptop => "laptop",
            Scenario::Drinking => "drinking",
            Scenario::Eating => "eating",
            Scenario::Idle => "idle",
        }
    }

    /// Representative statistics for the scenario.
    pub fn stats(&self) -> MovementStats {
        match self {
            Scenario::Sleeping => MovementStats::new(0.003, 0.012, 0.0, 0.000_05),
            Scenario::Laptop => MovementStats::new(0.001, 0.01, 0.0, 0.000_1),
            Scenario::Drinking => MovementStats::new(0.03, 0.09, 0.005, 0.001),
            Scenario::Eating => MovementStats::new(0.06, 0.18, 0.01, 0.003),
            Scenario::Idle => MovementStats::new(0.010, 0.03, 0.0, 0.000_1),
        }
    }

    /// Number of frames the scenario pretends to have analyzed.
    pub const fn frames_analyzed(&self) -> usize {
        30
    }

    /// Clip duration the scenario pretends to cover.
    pub const fn duration_sec(&self) -> f64 {
        10.0
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = ScenarioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sleeping" | "sleep" => Ok(Scenario::Sleeping),
            "laptop" | "laptop_use" => Ok(Scenario::Laptop),
            "drinking" | "drink" => Ok(Scenario::Drinking),
            "eating" | "eat" => Ok(Scenario::Eating),
            "idle" => Ok(Scenario::Idle),
            _ => Err(ScenarioParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown scenario: {0}")]
pub struct ScenarioParseError(String);
