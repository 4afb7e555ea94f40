//! Turnpoint detection on the relative movement signal.
//!
//! A turnpoint is a sign change of the signal relative to the last extreme
//! that was reported. Only the change matters, not the magnitude, so a long
//! excursion on one side produces exactly one action.

use serde::{Deserialize, Serialize};
use tracing::info;

/// One timed output position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Playback time in milliseconds
    pub timestamp_ms: f64,
    /// Output position (0-100 with the default config)
    pub position: i32,
    /// Script slot to route the action to, if any
    pub channel: Option<u32>,
}

impl Action {
    /// Create an action at `timestamp_ms` of playback.
    pub fn new(timestamp_ms: f64, position: i32, channel: Option<u32>) -> Self {
        Self {
            timestamp_ms,
            position,
            channel,
        }
    }

    /// Playback time in seconds.
    pub fn at_secs(&self) -> f64 {
        self.timestamp_ms / 1000.0
    }
}

/// Which side of the signal the last reported extreme was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extreme {
    Top,
    Bottom,
}

/// Output values emitted for each extreme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnpointConfig {
    pub bottom_value: i32,
    pub top_value: i32,
}

impl Default for TurnpointConfig {
    fn default() -> Self {
        Self {
            bottom_value: 0,
            top_value: 100,
        }
    }
}

/// Turns a scalar stream into alternating Top/Bottom actions.
#[derive(Debug, Clone)]
pub struct TurnpointDetector {
    config: TurnpointConfig,
    frame_time_ms: f64,
    start_offset_ms: f64,
    channel: Option<u32>,
    previous: Option<Extreme>,
    sample_index: u64,
}

impl TurnpointDetector {
    /// Create a detector anchored at `start_offset_ms` of playback.
    pub fn new(
        config: TurnpointConfig,
        frame_time_ms: f64,
        start_offset_ms: f64,
        channel: Option<u32>,
    ) -> Self {
        info!("use start offset {} ms", start_offset_ms.round());
        Self {
            config,
            frame_time_ms,
            start_offset_ms,
            channel,
            previous: None,
            // Frame 0 only seeds the feature extractor and never reaches us.
            sample_index: 1,
        }
    }

    /// Last reported extreme, `None` before the seed sample.
    pub fn previous_extreme(&self) -> Option<Extreme> {
        self.previous
    }

    /// Index the next `update` call will be timestamped with.
    pub fn sample_index(&self) -> u64 {
        self.sample_index
    }

    /// Feed one sample; returns an action when the signal crosses over.
    pub fn update(&mut self, value: f64) -> Option<Action> {
        let index = self.sample_index;
        self.sample_index += 1;

        let Some(previous) = self.previous else {
            self.previous = Some(if value > 0.0 {
                Extreme::Top
            } else {
                Extreme::Bottom
            });
            return None;
        };

        let (next, position) = match previous {
            Extreme::Top if value < 0.0 => (Extreme::Bottom, self.config.bottom_value),
            Extreme::Bottom if value > 0.0 => (Extreme::Top, self.config.top_value),
            _ => return None,
        };

        self.previous = Some(next);
        Some(Action::new(
            index as f64 * self.frame_time_ms + self.start_offset_ms,
            position,
            self.channel,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(offset_ms: f64) -> TurnpointDetector {
        TurnpointDetector::new(TurnpointConfig::default(), 1000.0 / 30.0, offset_ms, None)
    }

    #[test]
    fn test_seed_emits_nothing() {
        let mut det = detector(0.0);
        assert!(det.update(3.0).is_none());
        assert_eq!(det.previous_extreme(), Some(Extreme::Top));

        let mut det = detector(0.0);
        assert!(det.update(0.0).is_none());
        assert_eq!(det.previous_extreme(), Some(Extreme::Bottom));
    }

    #[test]
    fn test_second_sample_timestamp() {
        let mut det = detector(5000.0);
        assert!(det.update(1.0).is_none());

        let action = det.update(-1.0).unwrap();
        assert!((action.timestamp_ms - (2.0 * 1000.0 / 30.0 + 5000.0)).abs() < 1e-9);
        assert!((action.timestamp_ms - 5066.67).abs() < 0.01);
        assert_eq!(action.position, 0);
    }

    #[test]
    fn test_one_event_per_sign_change() {
        let mut det = detector(0.0);
        let signal = [1.0, 2.0, -0.5, -3.0, 0.0, -1.0, 4.0, 0.0, 2.0, -1.0];

        let actions: Vec<Action> = signal.iter().filter_map(|&v| det.update(v)).collect();
        let positions: Vec<i32> = actions.iter().map(|a| a.position).collect();
        assert_eq!(positions, vec![0, 100, 0]);

        let expected_index = [3.0, 7.0, 10.0];
        for (action, index) in actions.iter().zip(expected_index) {
            assert!((action.timestamp_ms - index * 1000.0 / 30.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_does_not_cross() {
        let mut det = detector(0.0);
        det.update(-1.0);
        assert!(det.update(0.0).is_none());
        assert_eq!(det.previous_extreme(), Some(Extreme::Bottom));
        assert!(det.update(0.1).is_some());
    }

    #[test]
    fn test_channel_and_custom_values() {
        let config = TurnpointConfig {
            bottom_value: 10,
            top_value: 90,
        };
        let mut det = TurnpointDetector::new(config, 40.0, 0.0, Some(2));
        det.update(-1.0);

        let action = det.update(1.0).unwrap();
        assert_eq!(action.position, 90);
        assert_eq!(action.channel, Some(2));
        assert!((action.at_secs() - 0.08).abs() < 1e-12);
    }
}
