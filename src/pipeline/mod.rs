//! Video-facing side of the copilot.
//!
//! This module contains:
//! - Frame source and feature extractor seams
//! - The FFmpeg frame source and probe
//! - The frame-delta feature extractor
//! - The processing loop turning frames into queued actions

pub mod features;
pub mod ffmpeg;
pub mod processor;
pub mod source;

// Re-export commonly used types
pub use features::FrameDelta;
pub use ffmpeg::{probe_video, FfmpegFrameSource, FfmpegOpener, VideoInfo, DEFAULT_TARGET_WIDTH};
pub use processor::{
    ActivationEnd, ActivationReport, PipelineError, ProcessingLoop, ProcessingOptions,
};
pub use source::{FeatureExtractor, FrameSource, GrayFrame, SourceError, VideoOpener};
