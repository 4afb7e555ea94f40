//! Helpers deriving the detector input from projected samples.

/// Scalar fed to the turnpoint detector: first projected component minus
/// the second.
///
/// The difference (not the sum) keeps Top/Bottom polarity stable when the
/// two leading directions trade sign between batches.
pub fn relative_movement(projected: &[f64]) -> f64 {
    match projected {
        [first, second, ..] => first - second,
        [first] => *first,
        [] => 0.0,
    }
}

/// Duration of a single frame in milliseconds.
pub fn frame_time_ms(fps: f64) -> f64 {
    1000.0 / fps
}

/// Number of feature vectors accumulated before each estimator update.
pub fn batch_size(fps: f64, batch_duration_secs: f64) -> usize {
    ((fps * batch_duration_secs).floor() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_movement_uses_difference() {
        assert_eq!(relative_movement(&[3.0, 1.0]), 2.0);
        assert_eq!(relative_movement(&[1.0, 3.0, 9.0]), -2.0);
        assert_eq!(relative_movement(&[]), 0.0);
    }

    #[test]
    fn test_batch_size() {
        assert_eq!(batch_size(30.0, 1.1), 33);
        assert_eq!(batch_size(59.94, 1.2), 71);
        assert_eq!(batch_size(0.5, 1.1), 1);
    }

    #[test]
    fn test_frame_time() {
        assert!((frame_time_ms(30.0) - 33.333).abs() < 0.001);
    }
}
