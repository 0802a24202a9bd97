//! Prometheus metrics for camera operations.
//!
//! # Metrics Exposed
//!
//! - `picam_captures_total` - Pictures captured and committed
//! - `picam_capture_failures_total` - Pictures that failed after acquiring the camera
//! - `picam_recordings_total` - Recordings committed
//! - `picam_recording_failures_total` - Recordings that failed to start or finish
//! - `picam_busy_rejections_total` - Requests turned away while the camera was in use
//! - `picam_validation_failures_total` - Requests rejected by parameter validation
//! - `picam_artifact_bytes_total` - Bytes written to committed artifacts
//! - `picam_recording_active` - 1 while a recording is running
//!
//! The registry is served at `GET /metrics` by [`crate::server`].

mod collector;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
