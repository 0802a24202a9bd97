//! The camera service: the single entry point for every operation.
//!
//! Each operation follows the same order: validate, open the artifact sink,
//! reserve the camera, then drive a [`Session`] on a blocking thread. The
//! sink always exists before the device is opened, so an I/O failure never
//! strands an open camera.

use super::session::Session;
use super::status::{RecordingControl, RecordingState, StatusBoard};
use crate::capture::{
    CameraGate, CaptureConfig, OperationKind, RawCaptureParams, RawRecordParams, RecordConfig,
    RecordDuration,
};
use crate::error::{Result, ServiceError};
use crate::metrics::MetricsRegistry;
use crate::output::{Artifact, OutputDirectory};
use std::sync::Arc;
use tokio::task::JoinError;

/// Result of a record request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Bounded recording that ran to completion.
    Completed(Artifact),
    /// Unbounded recording now running until stopped.
    Started { name: String },
}

/// Owns the camera gate and everything needed to run sessions.
pub struct CameraService {
    gate: CameraGate,
    output: OutputDirectory,
    board: Arc<StatusBoard>,
    metrics: Arc<MetricsRegistry>,
}

impl CameraService {
    pub fn new(gate: CameraGate, output: OutputDirectory, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            gate,
            output,
            board: Arc::new(StatusBoard::new()),
            metrics,
        }
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    pub fn gate(&self) -> &CameraGate {
        &self.gate
    }

    /// Validates raw parameters and takes a picture.
    pub async fn capture_picture(&self, params: &RawCaptureParams) -> Result<Artifact> {
        let config = params.validate().map_err(|e| self.rejected(e.into()))?;
        self.capture(config).await
    }

    /// Takes a picture with an already validated configuration.
    pub async fn capture(&self, config: CaptureConfig) -> Result<Artifact> {
        let sink = self
            .output
            .open(config.format.extension())
            .map_err(|e| self.rejected(e.into()))?;
        let reservation = self.gate.reserve().await.map_err(|e| self.rejected(e.into()))?;
        let board = Arc::clone(&self.board);

        let result = tokio::task::spawn_blocking(move || -> Result<Artifact> {
            let handle = reservation.open()?;
            let mut session = Session::begin(handle, sink, OperationKind::Capture, board, None);
            session.configure(&config.settings, None)?;
            session.capture(config.format, config.use_fast_port)
        })
        .await
        .unwrap_or_else(|e| Err(task_failed(e)));

        self.metrics.observe_capture(&result);
        result
    }

    /// Validates raw parameters and records a video.
    pub async fn record_video(&self, params: &RawRecordParams) -> Result<RecordOutcome> {
        let config = params.validate().map_err(|e| self.rejected(e.into()))?;
        self.record(config).await
    }

    /// Records a video with an already validated configuration.
    ///
    /// A bounded recording resolves once the artifact is committed (or
    /// earlier if a stop arrives). An unbounded one resolves as soon as the
    /// device is recording.
    pub async fn record(&self, config: RecordConfig) -> Result<RecordOutcome> {
        let sink = self
            .output
            .open(config.format.extension())
            .map_err(|e| self.rejected(e.into()))?;
        let name = sink.name().to_string();
        let reservation = self.gate.reserve().await.map_err(|e| self.rejected(e.into()))?;

        let (control, outcome_tx) = RecordingControl::channel();
        let board = Arc::clone(&self.board);
        let session_control = control.clone();
        let settings = config.settings.clone();
        let (framerate, format) = (config.framerate, config.format);

        let started = tokio::task::spawn_blocking(move || -> Result<Session> {
            let handle = reservation.open()?;
            let mut session = Session::begin(
                handle,
                sink,
                OperationKind::Record,
                board,
                Some(session_control),
            );
            session.configure(&settings, Some(framerate))?;
            session.start_recording(format)?;
            Ok(session)
        })
        .await
        .unwrap_or_else(|e| Err(task_failed(e)));

        let session = match started {
            Ok(session) => session,
            Err(e) => {
                self.metrics.observe_recording_failure(&e);
                return Err(e);
            }
        };
        self.metrics.recording_started();

        let metrics = Arc::clone(&self.metrics);
        let limit = config.duration.as_duration();
        let task = tokio::spawn(async move {
            match limit {
                Some(limit) => {
                    tokio::select! {
                        _ = tokio::time::sleep(limit) => {
                            tracing::debug!(secs = limit.as_secs(), "Recording duration elapsed");
                        }
                        _ = control.stop_requested() => {
                            tracing::info!("Bounded recording stopped early");
                        }
                    }
                }
                None => control.stop_requested().await,
            }

            let result = tokio::task::spawn_blocking(move || session.stop())
                .await
                .unwrap_or_else(|e| Err(task_failed(e)));
            metrics.observe_recording(&result);
            let _ = outcome_tx.send(Some(result.clone()));
            result
        });

        match config.duration {
            RecordDuration::Unbounded => {
                tracing::info!(artifact = %name, "Unbounded recording started");
                Ok(RecordOutcome::Started { name })
            }
            RecordDuration::Bounded(_) => task
                .await
                .unwrap_or_else(|e| Err(task_failed(e)))
                .map(RecordOutcome::Completed),
        }
    }

    /// Stops the running recording and returns its committed artifact.
    pub async fn stop_recording(&self) -> Result<Artifact> {
        let control = self.board.begin_stop().map_err(|e| self.rejected(e))?;
        control.request_stop();
        control.outcome().await
    }

    /// Reports whether a recording is in progress. Never touches the gate.
    pub fn query_state(&self) -> Result<RecordingState> {
        self.board.query()
    }

    /// Stops a running recording so its artifact is committed.
    pub async fn shutdown(&self) {
        if self.board.current_state().is_some_and(|s| s.is_recording()) {
            match self.stop_recording().await {
                Ok(artifact) => {
                    tracing::info!(artifact = %artifact.name, "Recording stopped for shutdown")
                }
                Err(e) => tracing::warn!(error = %e, "Failed to stop recording on shutdown"),
            }
        }
    }

    /// Counts and logs an error returned before any session existed.
    fn rejected(&self, err: ServiceError) -> ServiceError {
        self.metrics.observe_rejection(&err);
        if err.is_client_error() {
            tracing::warn!(error = %err, "Request rejected");
        } else {
            tracing::error!(error = %err, "Request failed");
        }
        err
    }
}

fn task_failed(err: JoinError) -> ServiceError {
    ServiceError::Device(crate::capture::CameraError::CaptureFailed(format!(
        "camera task failed: {err}"
    )))
}
