//! Frame preprocessing for the activity model.
//!
//! Resize → center crop → channel reorder → optional [0, 1] scaling →
//! per-channel `(x - mean) / std`. This is the contract the model was
//! trained against, so it must stay bit-for-bit reproducible.

use image::imageops::{self, FilterType};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::source::Frame;

/// Channel order the model expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorOrder {
    #[default]
    Rgb,
    Bgr,
}

/// Memory layout of the output tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, 3, H, W]`
    #[default]
    Nchw,
    /// `[1, H, W, 3]`
    Nhwc,
}

fn default_scale() -> bool {
    true
}

/// Preprocessing parameters shipped next to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    #[serde(alias = "resize_size")]
    pub resize: u32,
    #[serde(alias = "crop_size")]
    pub crop: u32,
    /// Per-channel means, in the model's channel order.
    pub mean: [f32; 3],
    /// Per-channel standard deviations, in the model's channel order.
    pub std: [f32; 3],
    /// Divide pixel values by 255 before normalizing.
    #[serde(default = "default_scale")]
    pub scale: bool,
    #[serde(default)]
    pub color_order: ColorOrder,
    #[serde(default)]
    pub layout: TensorLayout,
}

impl Default for PreprocessConfig {
    /// ImageNet statistics at 256 → 224.
    fn default() -> Self {
        Self {
            resize: 256,
            crop: 224,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            scale: true,
            color_order: ColorOrder::Rgb,
            layout: TensorLayout::Nchw,
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.resize == 0 || self.crop == 0 {
            return Err(AnalysisError::invalid_config(format!(
                "resize ({}) and crop ({}) must be positive",
                self.resize, self.crop
            )));
        }
        if self.crop > self.resize {
            return Err(AnalysisError::invalid_config(format!(
                "crop size {} exceeds resize size {}",
                self.crop, self.resize
            )));
        }
        for (i, (m, s)) in self.mean.iter().zip(self.std.iter()).enumerate() {
            if !m.is_finite() || !s.is_finite() || *s <= 0.0 {
                return Err(AnalysisError::invalid_config(format!(
                    "channel {i}: mean {m} / std {s} invalid"
                )));
            }
        }
        Ok(())
    }

    /// Offset of the center crop on each axis.
    pub fn crop_offset(&self) -> u32 {
        (self.resize - self.crop) / 2
    }

    /// Shape of the produced tensor.
    pub fn output_shape(&self) -> [usize; 4] {
        let c = self.crop as usize;
        match self.layout {
            TensorLayout::Nchw => [1, 3, c, c],
            TensorLayout::Nhwc => [1, c, c, 3],
        }
    }
}

/// Validated preprocessor.
#[derive(Debug, Clone)]
pub struct FramePreprocessor {
    config: PreprocessConfig,
}

impl FramePreprocessor {
    pub fn new(config: PreprocessConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Turn one frame into a normalized batch of one.
    pub fn process(&self, frame: &Frame) -> AnalysisResult<Array4<f32>> {
        let cfg = &self.config;
        if frame.width() == 0 || frame.height() == 0 {
            return Err(AnalysisError::inference_failed("Empty frame"));
        }

        let resized = if frame.dimensions() == (cfg.resize, cfg.resize) {
            frame.clone()
        } else {
            imageops::resize(frame, cfg.resize, cfg.resize, FilterType::Triangle)
        };
        let offset = cfg.crop_offset();
        let cropped = imageops::crop_imm(&resized, offset, offset, cfg.crop, cfg.crop).to_image();

        let mut tensor = Array4::<f32>::zeros(cfg.output_shape());
        for (x, y, pixel) in cropped.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let src = match cfg.color_order {
                    ColorOrder::Rgb => c,
                    ColorOrder::Bgr => 2 - c,
                };
                let mut v = f32::from(pixel[src]);
                if cfg.scale {
                    v /= 255.0;
                }
                let v = (v - cfg.mean[c]) / cfg.std[c];
                match cfg.layout {
                    TensorLayout::Nchw => tensor[[0, c, y, x]] = v,
                    TensorLayout::Nhwc => tensor[[0, y, x, c]] = v,
                }
            }
        }
        Ok(tensor)
    }
}
