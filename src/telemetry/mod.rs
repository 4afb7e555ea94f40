//! Runtime counters for the copilot.
//!
//! Tracks how much work the processing loop and the session did, so a run
//! can be summarized on exit and compared across runs.

pub mod counters;

// Re-export commonly used types
pub use counters::{
    create_shared_stats, create_shared_stats_with_persistence, PipelineStats, SharedStats,
    StatsSnapshot,
};
