//! Analysis metrics.
//!
//! Recorded through the `metrics` facade; the host process decides whether a
//! recorder is installed.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const ANALYSES_TOTAL: &str = "actsense_analyses_total";
    pub const ANALYSIS_DURATION_SECONDS: &str = "actsense_analysis_duration_seconds";
    pub const FRAMES_ADMITTED_TOTAL: &str = "actsense_frames_admitted_total";
    pub const MODEL_FRAMES_SKIPPED_TOTAL: &str = "actsense_model_frames_skipped_total";
    pub const DETECTED_ACTIVITY_TOTAL: &str = "actsense_detected_activity_total";
}

/// Record a finished analysis.
pub fn record_analysis(method: &str, outcome: &str, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::ANALYSES_TOTAL, &labels).increment(1);
    histogram!(names::ANALYSIS_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record frames admitted by the sampler for one analysis.
pub fn record_frames_admitted(method: &str, count: usize) {
    let labels = [("method", method.to_string())];
    counter!(names::FRAMES_ADMITTED_TOTAL, &labels).increment(count as u64);
}

/// Record a frame the model path had to skip.
pub fn record_model_frame_skipped(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::MODEL_FRAMES_SKIPPED_TOTAL, &labels).increment(1);
}

/// Record the label an analysis settled on.
pub fn record_detected_activity(method: &str, activity: &str) {
    let labels = [
        ("method", method.to_string()),
        ("activity", activity.to_string()),
    ];
    counter!(names::DETECTED_ACTIVITY_TOTAL, &labels).increment(1);
}
