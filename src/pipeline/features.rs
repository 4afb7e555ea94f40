//! Per-frame feature vectors fed to the eigenbasis estimator.

use crate::pipeline::source::{FeatureExtractor, GrayFrame};

/// Per-pixel intensity change between consecutive frames.
///
/// Side-by-side VR frames are reduced to their left eye. The vector has one
/// entry per pixel of the (cropped) frame, so its length is fixed for a
/// given video.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDelta;

impl FrameDelta {
    /// Create the extractor.
    pub fn new() -> Self {
        Self
    }

    /// Width of the region that contributes to the feature vector.
    fn region_width(frame: &GrayFrame) -> usize {
        if frame.is_side_by_side() {
            frame.width / 2
        } else {
            frame.width
        }
    }
}

impl FeatureExtractor for FrameDelta {
    fn extract(&mut self, previous: &GrayFrame, current: &GrayFrame) -> Vec<f64> {
        let width = Self::region_width(current);
        let mut features = Vec::with_capacity(width * current.height);

        for y in 0..current.height {
            for x in 0..width {
                let before = if x < previous.width && y < previous.height {
                    previous.pixel(x, y)
                } else {
                    0
                };
                features.push(f64::from(current.pixel(x, y)) - f64::from(before));
            }
        }

        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_values() {
        let previous = GrayFrame::new(2, 2, vec![10, 20, 30, 40]);
        let current = GrayFrame::new(2, 2, vec![15, 20, 25, 50]);

        let features = FrameDelta::new().extract(&previous, &current);
        assert_eq!(features, vec![5.0, 0.0, -5.0, 10.0]);
    }

    #[test]
    fn test_vr_frames_use_left_half() {
        let previous = GrayFrame::new(4, 2, vec![0; 8]);
        let current = GrayFrame::new(4, 2, vec![1, 2, 9, 9, 3, 4, 9, 9]);

        let features = FrameDelta::new().extract(&previous, &current);
        assert_eq!(features, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_truncated_frame_keeps_length() {
        let previous = GrayFrame::new(3, 2, vec![5; 6]);
        let current = GrayFrame::new(3, 2, vec![7, 7]);

        let features = FrameDelta::new().extract(&previous, &current);
        assert_eq!(features, vec![2.0, 2.0, -5.0, -5.0, -5.0, -5.0]);
    }
}
