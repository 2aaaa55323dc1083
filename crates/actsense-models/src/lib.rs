//! Shared data models for ActSense.
//!
//! This crate provides Serde-serializable types for:
//! - Activity labels and analysis method tags
//! - Probability distributions over labels
//! - Movement statistics and canned test scenarios
//! - The unified classification result record

pub mod activity;
pub mod distribution;
pub mod result;
pub mod scenario;

// Re-export common types
pub use activity::{ActivityLabel, ActivityLabelParseError, AnalysisMethod};
pub use distribution::{DistributionError, ProbabilityDistribution, DISTRIBUTION_TOLERANCE};
pub use result::{ClassificationResult, MovementStats};
pub use scenario::{Scenario, ScenarioParseError};
