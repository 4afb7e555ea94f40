//! The processing loop: frames in, actions out.
//!
//! Waits for a start request, then runs one activation: decode from the
//! requested position, batch feature vectors, update the eigenbasis, project
//! the batch and feed the relative movement to a fresh turnpoint detector.
//! Actions go to the queue without blocking. The estimator outlives
//! activations; everything else is rebuilt per activation.

use crate::core::funscript::Funscript;
use crate::core::pca::{EigenEstimator, EstimatorError};
use crate::core::signal::{batch_size, frame_time_ms, relative_movement};
use crate::core::turnpoints::{Action, TurnpointConfig, TurnpointDetector};
use crate::pipeline::source::{FeatureExtractor, FrameSource, GrayFrame, VideoOpener};
use crate::session::control::{SharedControl, StartRequest};
use crate::session::queue::QueueWriter;
use crate::telemetry::SharedStats;
use chrono::Utc;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Fatal processing errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Estimator error: {0}")]
    Estimator(#[from] EstimatorError),

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),
}

/// Tunables of the processing loop.
#[derive(Debug, Clone)]
pub struct ProcessingOptions {
    /// Seconds of video per estimator batch
    pub batch_duration_secs: f64,
    pub turnpoints: TurnpointConfig,
    /// Longest idle wait between exit checks
    pub poll_interval: Duration,
    /// Directory for per-activation funscripts, if exporting
    pub export_dir: Option<PathBuf>,
    /// File name prefix of exported funscripts
    pub export_stem: String,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            batch_duration_secs: 1.1,
            turnpoints: TurnpointConfig::default(),
            poll_interval: Duration::from_millis(200),
            export_dir: None,
            export_stem: "copilot".to_string(),
        }
    }
}

/// Why an activation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationEnd {
    /// The source ran out of frames
    Exhausted,
    /// Stop or exit was requested
    Stopped,
    /// The source could not be opened
    SourceUnavailable,
}

/// Outcome of one activation.
#[derive(Debug, Clone)]
pub struct ActivationReport {
    pub request: StartRequest,
    /// Frames pulled from the source, including the seed frame
    pub samples: u64,
    pub actions: Vec<Action>,
    /// Actions lost to a full queue
    pub dropped: u64,
    pub end: ActivationEnd,
}

impl ActivationReport {
    fn new(request: StartRequest) -> Self {
        Self {
            request,
            samples: 0,
            actions: Vec::new(),
            dropped: 0,
            end: ActivationEnd::Exhausted,
        }
    }
}

/// Sequential frame processing driven by the shared control state.
pub struct ProcessingLoop<O, E> {
    opener: O,
    extractor: E,
    estimator: EigenEstimator,
    writer: QueueWriter,
    control: SharedControl,
    stats: SharedStats,
    options: ProcessingOptions,
}

impl<O, E> ProcessingLoop<O, E>
where
    O: VideoOpener,
    E: FeatureExtractor,
{
    /// Create a loop over `opener`; fails on a non-positive frame rate.
    pub fn new(
        opener: O,
        extractor: E,
        estimator: EigenEstimator,
        writer: QueueWriter,
        control: SharedControl,
        stats: SharedStats,
        options: ProcessingOptions,
    ) -> Result<Self, PipelineError> {
        let fps = opener.fps();
        if !fps.is_finite() || fps <= 0.0 {
            return Err(PipelineError::InvalidFrameRate(fps));
        }

        Ok(Self {
            opener,
            extractor,
            estimator,
            writer,
            control,
            stats,
            options,
        })
    }

    /// The estimator shared by all activations.
    pub fn estimator(&self) -> &EigenEstimator {
        &self.estimator
    }

    /// Serve start requests until exit. Blocks the calling thread.
    ///
    /// An estimator error is fatal: exit is requested on the shared control
    /// so the session shuts down too, and the error is returned.
    pub fn run(&mut self) -> Result<(), PipelineError> {
        info!("Start processing loop");

        while !self.control.should_exit() {
            let Some(request) = self.control.wait_for_start(self.options.poll_interval) else {
                continue;
            };

            match self.run_activation(request) {
                Ok(report) => info!(
                    "Activation @ {} ms ended ({:?}): {} samples, {} actions, {} dropped",
                    report.request.start_ms.round(),
                    report.end,
                    report.samples,
                    report.actions.len(),
                    report.dropped
                ),
                Err(e) => {
                    error!("Processing failed: {}", e);
                    self.control.request_exit();
                    return Err(e);
                }
            }
        }

        info!("Processing loop stopped");
        Ok(())
    }

    /// Process frames from `request.start_ms` until exhausted or stopped.
    pub fn run_activation(
        &mut self,
        request: StartRequest,
    ) -> Result<ActivationReport, PipelineError> {
        info!("Start motion analysis @ {} ms", request.start_ms.round());
        self.stats.record_activation();

        let mut report = ActivationReport::new(request);
        let fps = self.opener.fps();
        let frame_time = frame_time_ms(fps);
        let start_frame = (request.start_ms.max(0.0) / frame_time).round() as u64;

        let mut source = match self.opener.open_at(start_frame) {
            Ok(source) => source,
            Err(e) => {
                warn!("Failed to open video at frame {}: {}", start_frame, e);
                report.end = ActivationEnd::SourceUnavailable;
                return Ok(report);
            }
        };

        let batch_len = batch_size(fps, self.options.batch_duration_secs);
        let mut batch: Vec<Vec<f64>> = Vec::with_capacity(batch_len);
        let mut detector = TurnpointDetector::new(
            self.options.turnpoints,
            frame_time,
            request.start_ms,
            request.channel,
        );
        let mut previous: Option<GrayFrame> = None;
        let started = Instant::now();

        while source.is_open() {
            if self.control.should_stop() {
                report.end = ActivationEnd::Stopped;
                break;
            }

            report.samples += 1;
            let Some(frame) = source.read() else {
                warn!("Failed to read next frame");
                break;
            };

            let Some(prev) = previous.take() else {
                previous = Some(frame);
                continue;
            };

            let features = self.extractor.extract(&prev, &frame);
            previous = Some(frame);
            self.stats.record_frame();
            batch.push(features);

            if batch.len() >= batch_len {
                if let Err(e) = self.process_batch(&batch, &mut detector, &mut report) {
                    source.stop();
                    return Err(e);
                }
                batch.clear();
            }
        }

        source.stop();

        let elapsed = started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            (report.samples as f64 / elapsed) as u64
        } else {
            0
        };
        info!("stop after {} samples ({} SPS)", report.samples, rate);

        self.export(&report);
        Ok(report)
    }

    fn process_batch(
        &mut self,
        batch: &[Vec<f64>],
        detector: &mut TurnpointDetector,
        report: &mut ActivationReport,
    ) -> Result<(), PipelineError> {
        self.estimator.absorb_batch(batch)?;
        let projected = self.estimator.project_batch(batch)?;
        self.stats.record_batch();
        debug!(
            "Absorbed batch of {} (iteration {})",
            batch.len(),
            self.estimator.iteration()
        );

        for row in &projected {
            let Some(action) = detector.update(relative_movement(row)) else {
                continue;
            };

            self.stats.record_action_emitted();
            report.actions.push(action);
            if !self.writer.push(action) {
                debug!("Action queue full, dropped action @ {} ms", action.timestamp_ms.round());
                self.stats.record_action_dropped();
                report.dropped += 1;
            }
        }
        Ok(())
    }

    fn export(&self, report: &ActivationReport) {
        let Some(ref dir) = self.options.export_dir else {
            return;
        };

        let script = Funscript::from_actions(&report.actions);
        if script.is_empty() {
            return;
        }

        let path = dir.join(format!(
            "{}_{}ms_{}.funscript",
            self.options.export_stem,
            report.request.start_ms.round() as i64,
            Utc::now().format("%Y%m%d_%H%M%S")
        ));

        match script.save(&path) {
            Ok(()) => info!("Exported {} actions to {:?}", script.actions.len(), path),
            Err(e) => warn!("Could not export funscript to {:?}: {}", path, e),
        }
    }
}
