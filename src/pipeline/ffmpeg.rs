//! FFmpeg-backed frame source.
//!
//! Frames are decoded by an `ffmpeg` child process into raw 8-bit gray at
//! roughly 256 px width and read from its stdout one frame at a time.

use crate::pipeline::source::{FrameSource, GrayFrame, SourceError, VideoOpener};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{debug, warn};

/// Target decode width; frames are downscaled by an integer factor.
pub const DEFAULT_TARGET_WIDTH: u32 = 256;

/// Video stream information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Duration in seconds
    pub duration: f64,
}

impl VideoInfo {
    /// Integer downscale factor bringing the width near `target_width`.
    pub fn scale_factor(&self, target_width: u32) -> u32 {
        (self.width / target_width.max(1)).max(1)
    }

    /// Decoded frame size for `target_width`.
    pub fn scaled_size(&self, target_width: u32) -> (u32, u32) {
        let scale = self.scale_factor(target_width);
        ((self.width / scale).max(1), (self.height / scale).max(1))
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe a video file with `ffprobe`.
pub fn probe_video(path: impl AsRef<Path>) -> Result<VideoInfo, SourceError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(SourceError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| SourceError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()?;

    if !output.status.success() {
        return Err(SourceError::ProbeFailed(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(json: &[u8]) -> Result<VideoInfo, SourceError> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| SourceError::InvalidVideo("No video stream found".to_string()))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .ok_or_else(|| SourceError::InvalidVideo("Unknown frame rate".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(SourceError::InvalidVideo("Unknown frame size".to_string())),
    };

    let duration = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoInfo {
        width,
        height,
        fps,
        duration,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97"). Zero rates are rejected.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.parse().ok()?
    };
    (rate > 0.0 && rate.is_finite()).then_some(rate)
}

/// Opens `ffmpeg` decoders on one video file.
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    path: PathBuf,
    info: VideoInfo,
    target_width: u32,
}

impl FfmpegOpener {
    /// Create an opener from already probed stream info.
    pub fn new(path: impl Into<PathBuf>, info: VideoInfo, target_width: u32) -> Self {
        Self {
            path: path.into(),
            info,
            target_width,
        }
    }

    /// Probe `path` and build an opener for it.
    pub fn probe(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let path = path.into();
        let info = probe_video(&path)?;
        Ok(Self::new(path, info, DEFAULT_TARGET_WIDTH))
    }

    /// Probed stream information.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }
}

impl VideoOpener for FfmpegOpener {
    type Source = FfmpegFrameSource;

    fn fps(&self) -> f64 {
        self.info.fps
    }

    fn open_at(&self, start_frame: u64) -> Result<FfmpegFrameSource, SourceError> {
        which::which("ffmpeg").map_err(|_| SourceError::FfmpegNotFound)?;

        let (width, height) = self.info.scaled_size(self.target_width);
        let start_secs = start_frame as f64 / self.info.fps;

        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-ss"])
            .arg(format!("{start_secs:.3}"))
            .arg("-i")
            .arg(&self.path)
            .args([
                "-vf",
                &format!("scale={width}:{height}"),
                "-pix_fmt",
                "gray",
                "-f",
                "rawvideo",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            SourceError::Io(std::io::Error::other("Failed to capture FFmpeg stdout"))
        })?;

        debug!(
            "FFmpeg decoding {:?} from frame {} at {}x{}",
            self.path, start_frame, width, height
        );

        Ok(FfmpegFrameSource {
            child: Some(child),
            stdout: Some(BufReader::new(stdout)),
            width: width as usize,
            height: height as usize,
        })
    }
}

/// Raw gray frames read from an `ffmpeg` child process.
#[derive(Debug)]
pub struct FfmpegFrameSource {
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    width: usize,
    height: usize,
}

impl FrameSource for FfmpegFrameSource {
    fn is_open(&self) -> bool {
        self.stdout.is_some()
    }

    fn read(&mut self) -> Option<GrayFrame> {
        let stdout = self.stdout.as_mut()?;
        let mut pixels = vec![0u8; self.width * self.height];

        match stdout.read_exact(&mut pixels) {
            Ok(()) => Some(GrayFrame::new(self.width, self.height, pixels)),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::UnexpectedEof {
                    warn!("Failed to read frame from FFmpeg: {}", e);
                }
                self.stop();
                None
            }
        }
    }

    fn stop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            // Exits on its own at end of stream; otherwise cut it short.
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "streams": [
                { "codec_type": "audio" },
                { "codec_type": "video", "width": 1920, "height": 1080,
                  "r_frame_rate": "30/1", "avg_frame_rate": "30000/1001" }
            ],
            "format": { "duration": "12.5" }
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!(info.duration, 12.5);
    }

    #[test]
    fn test_probe_without_video_stream() {
        let json = br#"{ "streams": [ { "codec_type": "audio" } ] }"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(SourceError::InvalidVideo(_))
        ));
    }

    #[test]
    fn test_scaled_size() {
        let info = VideoInfo {
            width: 1920,
            height: 1080,
            fps: 30.0,
            duration: 0.0,
        };
        assert_eq!(info.scale_factor(256), 7);
        assert_eq!(info.scaled_size(256), (274, 154));

        let small = VideoInfo {
            width: 200,
            height: 100,
            fps: 30.0,
            duration: 0.0,
        };
        assert_eq!(small.scaled_size(256), (200, 100));
    }

    #[test]
    fn test_probe_missing_file() {
        assert!(matches!(
            probe_video("/definitely/not/here.mp4"),
            Err(SourceError::FileNotFound(_))
        ));
    }
}
