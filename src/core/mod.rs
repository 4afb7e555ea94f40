//! Signal processing core of the copilot.
//!
//! This module contains:
//! - The incremental eigenbasis estimator (CCIPCA)
//! - Turnpoint detection on the projected signal
//! - Signal helpers (relative movement, batch sizing)
//! - Funscript export of generated actions

pub mod funscript;
pub mod pca;
pub mod signal;
pub mod turnpoints;

// Re-export commonly used types
pub use funscript::{Funscript, FunscriptAction};
pub use pca::{EigenEstimator, EigenSnapshot, EstimatorError, DEFAULT_AMNESIC};
pub use signal::{batch_size, frame_time_ms, relative_movement};
pub use turnpoints::{Action, Extreme, TurnpointConfig, TurnpointDetector};
