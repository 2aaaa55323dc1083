//! Frame-difference motion features.
//!
//! Each admitted frame is reduced to a smoothed grayscale image and compared
//! with the previous one. The movement ratio is the fraction of pixels whose
//! smoothed intensity changed by more than a fixed threshold.

use image::imageops::{self, FilterType};
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::source::Frame;

/// Parameters of the differencing pipeline.
///
/// The movement-ratio scale depends on every field here; heuristic thresholds
/// are calibrated against the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Fixed processing resolution `(width, height)`. `None` keeps native size.
    pub target_size: Option<(u32, u32)>,
    /// Gaussian sigma. 3.5 is what OpenCV derives for a 21x21 kernel.
    pub blur_sigma: f32,
    /// Minimum absolute intensity change (0-255) to count a pixel as moving.
    pub diff_threshold: u8,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            target_size: Some((320, 240)),
            blur_sigma: 3.5,
            diff_threshold: 25,
        }
    }
}

/// Stateful pairwise extractor. Keeps only the previous smoothed frame.
pub struct MotionFeatureExtractor {
    config: MotionConfig,
    prev: Option<GrayImage>,
}

impl MotionFeatureExtractor {
    pub fn new(config: MotionConfig) -> Self {
        Self { config, prev: None }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Feed the next admitted frame. Returns the movement ratio against the
    /// previous frame, or `None` for the first frame.
    pub fn push(&mut self, frame: &Frame) -> Option<f64> {
        let current = self.smooth(frame);
        let ratio = self.prev.as_ref().map(|prev| movement_ratio(prev, &current, self.config.diff_threshold));
        self.prev = Some(current);
        ratio
    }

    /// Forget the previous frame.
    pub fn reset(&mut self) {
        self.prev = None;
    }

    fn smooth(&self, frame: &Frame) -> GrayImage {
        let mut gray = imageops::grayscale(frame);

        let target = match (self.config.target_size, &self.prev) {
            (Some(size), _) => Some(size),
            // No fixed size: follow the first frame if the stream changes shape.
            (None, Some(prev)) => Some(prev.dimensions()),
            (None, None) => None,
        };
        if let Some((w, h)) = target {
            if gray.dimensions() != (w, h) {
                gray = imageops::resize(&gray, w.max(1), h.max(1), FilterType::Triangle);
            }
        }

        if self.config.blur_sigma > 0.0 {
            imageops::blur(&gray, self.config.blur_sigma)
        } else {
            gray
        }
    }
}

impl Default for MotionFeatureExtractor {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

/// Fraction of pixels whose absolute difference exceeds `threshold`.
pub fn movement_ratio(prev: &GrayImage, current: &GrayImage, threshold: u8) -> f64 {
    let total = current.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let moving = prev
        .as_raw()
        .iter()
        .zip(current.as_raw())
        .filter(|(a, b)| a.abs_diff(**b) > threshold)
        .count();
    moving as f64 / total as f64
}
