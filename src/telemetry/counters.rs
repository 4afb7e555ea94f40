//! Lock-free counters shared between the processing loop and the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Counters for one process run, optionally seeded from disk.
#[derive(Debug)]
pub struct PipelineStats {
    /// Frames turned into feature vectors
    frames_processed: AtomicU64,
    /// Batches absorbed into the estimator
    batches_absorbed: AtomicU64,
    /// Actions produced by the turnpoint detector
    actions_emitted: AtomicU64,
    /// Actions dropped because the queue was full
    actions_dropped: AtomicU64,
    /// Actions written to the editor connection
    actions_sent: AtomicU64,
    /// Control commands accepted from the editor
    commands_received: AtomicU64,
    /// Activations started
    activations: AtomicU64,
    run_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl PipelineStats {
    /// Create zeroed, in-memory counters.
    pub fn new() -> Self {
        Self {
            frames_processed: AtomicU64::new(0),
            batches_absorbed: AtomicU64::new(0),
            actions_emitted: AtomicU64::new(0),
            actions_dropped: AtomicU64::new(0),
            actions_sent: AtomicU64::new(0),
            commands_received: AtomicU64::new(0),
            activations: AtomicU64::new(0),
            run_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Counters that continue from the totals stored at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            warn!("Could not load previous stats: {}", e);
        }

        stats
    }

    pub fn record_frame(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches_absorbed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_action_emitted(&self) {
        self.actions_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_action_dropped(&self) {
        self.actions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_action_sent(&self) {
        self.actions_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command(&self) {
        self.commands_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            batches_absorbed: self.batches_absorbed.load(Ordering::Relaxed),
            actions_emitted: self.actions_emitted.load(Ordering::Relaxed),
            actions_dropped: self.actions_dropped.load(Ordering::Relaxed),
            actions_sent: self.actions_sent.load(Ordering::Relaxed),
            commands_received: self.commands_received.load(Ordering::Relaxed),
            activations: self.activations.load(Ordering::Relaxed),
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_seconds().max(0) as u64,
        }
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - Activations: {}\n\
             - Frames processed: {}\n\
             - Batches absorbed: {}\n\
             - Actions emitted: {}\n\
             - Actions sent: {}\n\
             - Actions dropped (queue full): {}\n\
             - Commands received: {}\n\
             - Run duration: {} seconds",
            stats.activations,
            stats.frames_processed,
            stats.batches_absorbed,
            stats.actions_emitted,
            stats.actions_sent,
            stats.actions_dropped,
            stats.commands_received,
            stats.run_duration_secs
        )
    }

    /// Persist cumulative totals, if a path was configured.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let stats = self.stats();
        let persisted = PersistedStats {
            frames_processed: stats.frames_processed,
            batches_absorbed: stats.batches_absorbed,
            actions_emitted: stats.actions_emitted,
            actions_dropped: stats.actions_dropped,
            actions_sent: stats.actions_sent,
            commands_received: stats.commands_received,
            activations: stats.activations,
            last_updated: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path)?;
        let persisted: PersistedStats =
            serde_json::from_str(&content).map_err(std::io::Error::other)?;

        self.frames_processed
            .store(persisted.frames_processed, Ordering::Relaxed);
        self.batches_absorbed
            .store(persisted.batches_absorbed, Ordering::Relaxed);
        self.actions_emitted
            .store(persisted.actions_emitted, Ordering::Relaxed);
        self.actions_dropped
            .store(persisted.actions_dropped, Ordering::Relaxed);
        self.actions_sent
            .store(persisted.actions_sent, Ordering::Relaxed);
        self.commands_received
            .store(persisted.commands_received, Ordering::Relaxed);
        self.activations
            .store(persisted.activations, Ordering::Relaxed);
        Ok(())
    }

    pub fn reset(&self) {
        for counter in [
            &self.frames_processed,
            &self.batches_absorbed,
            &self.actions_emitted,
            &self.actions_dropped,
            &self.actions_sent,
            &self.commands_received,
            &self.activations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames_processed: u64,
    pub batches_absorbed: u64,
    pub actions_emitted: u64,
    pub actions_dropped: u64,
    pub actions_sent: u64,
    pub commands_received: u64,
    pub activations: u64,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    frames_processed: u64,
    batches_absorbed: u64,
    actions_emitted: u64,
    actions_dropped: u64,
    actions_sent: u64,
    commands_received: u64,
    activations: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared counters.
pub type SharedStats = Arc<PipelineStats>;

pub fn create_shared_stats() -> SharedStats {
    Arc::new(PipelineStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedStats {
    Arc::new(PipelineStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = PipelineStats::new();
        stats.record_frame();
        stats.record_frame();
        stats.record_action_emitted();
        stats.record_action_dropped();

        let snapshot = stats.stats();
        assert_eq!(snapshot.frames_processed, 2);
        assert_eq!(snapshot.actions_emitted, 1);
        assert_eq!(snapshot.actions_dropped, 1);
        assert_eq!(snapshot.actions_sent, 0);
    }

    #[test]
    fn test_reset() {
        let stats = PipelineStats::new();
        stats.record_batch();
        stats.record_command();
        stats.reset();

        let snapshot = stats.stats();
        assert_eq!(snapshot.batches_absorbed, 0);
        assert_eq!(snapshot.commands_received, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join("funscript-copilot-test")
            .join(format!("stats-{}.json", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let stats = PipelineStats::with_persistence(path.clone());
        stats.record_activation();
        stats.record_action_sent();
        stats.save().unwrap();

        let reloaded = PipelineStats::with_persistence(path.clone());
        let snapshot = reloaded.stats();
        assert_eq!(snapshot.activations, 1);
        assert_eq!(snapshot.actions_sent, 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_summary_format() {
        let summary = PipelineStats::new().summary();
        assert!(summary.contains("Frames processed"));
        assert!(summary.contains("Actions dropped"));
    }
}
