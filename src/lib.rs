//! Funscript Copilot - motion-derived script actions streamed to an editor.
//!
//! This library turns the motion in a video into timed funscript actions
//! while the user works in a script editor. The editor tells the copilot
//! where to start and when to stop; the copilot answers with `add_action`
//! commands over the same WebSocket connection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Funscript Copilot                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐ │
//! │  │   Frames   │──▶│  Features  │──▶│   CCIPCA   │──▶│Turnpoints│ │
//! │  │  (ffmpeg)  │   │(frame diff)│   │ (k dirs)   │   │(sign chg)│ │
//! │  └────────────┘   └────────────┘   └────────────┘   └──────────┘ │
//! │        ▲                                                  │      │
//! │        │ start/stop/exit                          Action  ▼      │
//! │  ┌────────────┐                                   ┌──────────┐   │
//! │  │  Control   │◀──────── Streaming Session ──────│  Queue   │   │
//! │  │   State    │        (WebSocket, 2 loops)       │(bounded) │   │
//! │  └────────────┘                                   └──────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use funscript_copilot::core::{EigenEstimator, TurnpointConfig, TurnpointDetector};
//! use funscript_copilot::core::relative_movement;
//!
//! let mut estimator = EigenEstimator::new(2, 2.0).expect("valid settings");
//! let mut detector = TurnpointDetector::new(TurnpointConfig::default(), 1000.0 / 30.0, 0.0, None);
//!
//! let batch = vec![vec![0.5, -0.2, 0.1], vec![-0.4, 0.3, 0.0]];
//! estimator.absorb_batch(&batch).expect("consistent dimensions");
//! for row in estimator.project_batch(&batch).expect("consistent dimensions") {
//!     if let Some(action) = detector.update(relative_movement(&row)) {
//!         println!("{} ms -> {}", action.timestamp_ms, action.position);
//!     }
//! }
//! ```

pub mod config;
pub mod core;
pub mod pipeline;
pub mod session;
pub mod telemetry;

// Re-export key types at crate root for convenience
pub use crate::config::{Config, EstimatorConfig, SessionConfig, SignalConfig};
pub use crate::core::{Action, EigenEstimator, EigenSnapshot, EstimatorError, TurnpointDetector};
pub use crate::pipeline::{FfmpegOpener, FrameDelta, PipelineError, ProcessingLoop, ProcessingOptions};
pub use crate::session::{action_queue, create_shared_control, SharedControl, StreamingSession};
pub use crate::telemetry::{PipelineStats, SharedStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
