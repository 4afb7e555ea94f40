//! Seams to the video side: frame sources and feature extraction.
//!
//! Decoding and motion estimation live outside the copilot; the processing
//! loop only needs frames in order and a fixed-length vector per frame pair.

use std::path::PathBuf;
use thiserror::Error;

/// An 8-bit grayscale frame, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl GrayFrame {
    /// Create a frame from row-major pixels.
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Side-by-side VR frames are twice as wide as they are high.
    pub fn is_side_by_side(&self) -> bool {
        2 * self.height == self.width
    }

    /// Intensity at `(x, y)`; positions beyond the pixel buffer read as 0.
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels.get(y * self.width + x).copied().unwrap_or(0)
    }
}

/// A sequential supply of frames.
pub trait FrameSource {
    fn is_open(&self) -> bool;

    /// Next frame, or `None` once the source is exhausted.
    fn read(&mut self) -> Option<GrayFrame>;

    /// Release the underlying decoder.
    fn stop(&mut self);
}

/// Opens frame sources positioned at a given frame.
pub trait VideoOpener {
    type Source: FrameSource;

    fn fps(&self) -> f64;

    fn open_at(&self, start_frame: u64) -> Result<Self::Source, SourceError>;
}

/// Reduces a pair of consecutive frames to a flat feature vector.
///
/// Every call for the same video must return the same length.
pub trait FeatureExtractor {
    fn extract(&mut self, previous: &GrayFrame, current: &GrayFrame) -> Vec<f64>;
}

/// Errors from probing or decoding a video.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("FFprobe failed: {0}")]
    ProbeFailed(String),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}
