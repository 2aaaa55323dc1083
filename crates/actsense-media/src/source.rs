//! Video frame sources.
//!
//! A [`FrameSource`] is an ordered, finite stream of frames with a nominal
//! frame rate. The API mirrors OpenCV's capture model: `grab` advances one
//! raw frame cheaply, `retrieve` decodes the most recently grabbed frame.
//! This lets the sampler skip strided frames without paying for decoding.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;
use tracing::debug;

use crate::error::{AnalysisError, AnalysisResult};

/// A decoded RGB frame at native resolution.
pub type Frame = RgbImage;

/// Frame rate assumed when a source does not report a usable one.
pub const DEFAULT_FPS: f64 = 30.0;

/// Ordered, finite stream of video frames.
#[cfg_attr(test, mockall::automock)]
pub trait FrameSource: Send {
    /// Nominal frames per second, as reported by the container.
    fn fps(&self) -> f64;

    /// Total frame count if known.
    fn frame_count(&self) -> Option<u64>;

    /// Advance to the next raw frame. Returns `false` once the stream is exhausted.
    fn grab(&mut self) -> AnalysisResult<bool>;

    /// Decode the frame most recently advanced to by [`FrameSource::grab`].
    fn retrieve(&mut self) -> AnalysisResult<Frame>;

    /// Release the underlying handle. Must be idempotent.
    fn release(&mut self);
}

/// Frame source backed by frames already in memory.
pub struct MemoryFrameSource {
    frames: Vec<Frame>,
    fps: f64,
    cursor: usize,
    released: Arc<AtomicBool>,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        Self {
            frames,
            fps,
            cursor: 0,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build `count` frames from a generator taking the raw frame index.
    pub fn from_fn(count: usize, fps: f64, f: impl FnMut(usize) -> Frame) -> Self {
        Self::new((0..count).map(f).collect(), fps)
    }

    /// Shared flag that flips to `true` once the source is released.
    pub fn release_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }
}

impl FrameSource for MemoryFrameSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.frames.len() as u64)
    }

    fn grab(&mut self) -> AnalysisResult<bool> {
        if self.released.load(Ordering::SeqCst) {
            return Err(AnalysisError::source_unavailable("source already released"));
        }
        if self.cursor >= self.frames.len() {
            return Ok(false);
        }
        self.cursor += 1;
        Ok(true)
    }

    fn retrieve(&mut self) -> AnalysisResult<Frame> {
        match self.cursor.checked_sub(1).and_then(|i| self.frames.get(i)) {
            Some(frame) => Ok(frame.clone()),
            None => Err(AnalysisError::internal("retrieve called before grab")),
        }
    }

    fn release(&mut self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            debug!(frames = self.frames.len(), "Released in-memory frame source");
        }
    }
}

#[cfg(feature = "opencv")]
pub use self::opencv_source::OpenCvVideoSource;

#[cfg(feature = "opencv")]
mod opencv_source {
    use opencv::core::{AlgorithmHint, Mat};
    use opencv::imgproc;
    use opencv::prelude::{MatTraitConst, VideoCaptureTrait, VideoCaptureTraitConst};
    use opencv::videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT};
    use tracing::{debug, warn};

    use super::{Frame, FrameSource};
    use crate::error::{AnalysisError, AnalysisResult};

    /// Video file decoded through OpenCV's `VideoCapture`.
    pub struct OpenCvVideoSource {
        cap: VideoCapture,
        fps: f64,
        frame_count: Option<u64>,
        path: String,
        released: bool,
    }

    impl OpenCvVideoSource {
        /// Open a video file. Fails with `SourceUnavailable` if OpenCV cannot open it.
        pub fn open(path: &str) -> AnalysisResult<Self> {
            let cap = VideoCapture::from_file(path, CAP_ANY).map_err(|e| {
                AnalysisError::source_unavailable(format!("Failed to open video {path}: {e}"))
            })?;

            if !cap.is_opened().unwrap_or(false) {
                return Err(AnalysisError::source_unavailable(format!(
                    "Failed to open video file: {path}"
                )));
            }

            let fps = cap.get(CAP_PROP_FPS).unwrap_or(0.0);
            let frame_count = cap.get(CAP_PROP_FRAME_COUNT).ok().and_then(known_frame_count);

            debug!(path, fps, ?frame_count, "Opened video source");

            Ok(Self {
                cap,
                fps,
                frame_count,
                path: path.to_string(),
                released: false,
            })
        }
    }

    impl FrameSource for OpenCvVideoSource {
        fn fps(&self) -> f64 {
            self.fps
        }

        fn frame_count(&self) -> Option<u64> {
            self.frame_count
        }

        fn grab(&mut self) -> AnalysisResult<bool> {
            self.cap
                .grab()
                .map_err(|e| AnalysisError::source_unavailable(format!("grab: {e}")))
        }

        fn retrieve(&mut self) -> AnalysisResult<Frame> {
            let mut mat = Mat::default();
            let ok = self
                .cap
                .retrieve(&mut mat, 0)
                .map_err(|e| AnalysisError::source_unavailable(format!("retrieve: {e}")))?;
            if !ok {
                return Err(AnalysisError::source_unavailable("Decoded frame is empty"));
            }
            mat_to_frame(&mat)
        }

        fn release(&mut self) {
            if self.released {
                return;
            }
            self.released = true;
            if let Err(e) = self.cap.release() {
                warn!(path = %self.path, "Failed to release video capture: {}", e);
            } else {
                debug!(path = %self.path, "Released video source");
            }
        }
    }

    impl Drop for OpenCvVideoSource {
        fn drop(&mut self) {
            self.release();
        }
    }

    /// Containers report 0 (or garbage) when the count is unknown.
    fn known_frame_count(raw: f64) -> Option<u64> {
        (raw.is_finite() && raw >= 1.0).then_some(raw as u64)
    }

    /// Convert a decoded gray, BGR or BGRA `Mat` into an RGB frame.
    fn mat_to_frame(mat: &Mat) -> AnalysisResult<Frame> {
        if mat.empty() {
            return Err(AnalysisError::source_unavailable("Decoded frame is empty"));
        }

        let code = match mat.channels() {
            1 => imgproc::COLOR_GRAY2RGB,
            4 => imgproc::COLOR_BGRA2RGB,
            _ => imgproc::COLOR_BGR2RGB,
        };
        let mut rgb = Mat::default();
        imgproc::cvt_color(mat, &mut rgb, code, 0, AlgorithmHint::ALGO_HINT_DEFAULT)
            .map_err(|e| AnalysisError::source_unavailable(format!("to rgb: {e}")))?;

        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let bytes = rgb
            .data_bytes()
            .map_err(|e| AnalysisError::source_unavailable(format!("Mat data: {e}")))?
            .to_vec();

        Frame::from_raw(width, height, bytes)
            .ok_or_else(|| AnalysisError::internal("Frame buffer size mismatch"))
    }

}

/// Open a video file with the compiled-in decoder.
pub fn open_video(path: impl AsRef<Path>) -> AnalysisResult<Box<dyn FrameSource>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AnalysisError::source_unavailable(format!(
            "File not found: {}",
            path.display()
        )));
    }

    #[cfg(feature = "opencv")]
    {
        let path_str = path
            .to_str()
            .ok_or_else(|| AnalysisError::source_unavailable("Video path is not valid UTF-8"))?;
        Ok(Box::new(OpenCvVideoSource::open(path_str)?))
    }

    #[cfg(not(feature = "opencv"))]
    {
        Err(AnalysisError::source_unavailable(
            "Video decoding requires the `opencv` feature",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(v: u8) -> Frame {
        Frame::from_pixel(4, 4, image::Rgb([v, v, v]))
    }

    #[test]
    fn test_memory_source_grab_retrieve() {
        let mut source = MemoryFrameSource::new(vec![solid(1), solid(2)], 25.0);
        assert!(source.retrieve().is_err());
        assert!(source.grab().unwrap());
        assert_eq!(source.retrieve().unwrap().get_pixel(0, 0)[0], 1);
        assert!(source.grab().unwrap());
        assert_eq!(source.retrieve().unwrap().get_pixel(0, 0)[0], 2);
        assert!(!source.grab().unwrap());
    }

    #[test]
    fn test_memory_source_release_is_idempotent() {
        let mut source = MemoryFrameSource::new(vec![solid(1)], 25.0);
        let flag = source.release_flag();
        source.release();
        source.release();
        assert!(flag.load(Ordering::SeqCst));
        assert!(source.grab().is_err());
    }

    #[test]
    fn test_open_missing_file_is_source_unavailable() {
        let err = open_video("/definitely/not/here.mp4").err().unwrap();
        assert_eq!(err.code(), "source_unavailable");
    }
}
