//! Camera abstraction for still capture and video recording.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and mock implementations for testing.
//! Encoding is the driver's business: the session layer only hands it a
//! writable sink and a format.

use super::config::{Resolution, StillFormat, VideoFormat};
use std::io::Write;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to capture picture: {0}")]
    CaptureFailed(String),
    #[error("recording failed: {0}")]
    RecordFailed(String),
    #[error("not supported by this camera: {0}")]
    Unsupported(String),
    #[error("camera is not recording")]
    NotRecording,
    #[error("camera is already recording")]
    AlreadyRecording,
    #[error("camera not initialized")]
    NotInitialized,
}

/// Owned output stream handed to a recording.
pub type RecordingOutput = Box<dyn Write + Send>;

/// An opened camera device.
///
/// Setters apply one field each so a rejected field can be reported
/// precisely. Implementations must leave the device usable after any
/// error so that the owner can still stop and close it.
pub trait Camera: Send {
    fn set_resolution(&mut self, resolution: Resolution) -> Result<(), CameraError>;

    /// Fails when the rate exceeds what the current resolution allows.
    fn set_framerate(&mut self, fps: u32) -> Result<(), CameraError>;

    /// Sets sensitivity; the driver snaps to the nearest supported ISO.
    fn set_iso(&mut self, iso: i64) -> Result<(), CameraError>;

    fn set_led(&mut self, on: bool) -> Result<(), CameraError>;

    fn set_brightness(&mut self, brightness: u8) -> Result<(), CameraError>;

    fn set_contrast(&mut self, contrast: i8) -> Result<(), CameraError>;

    /// Captures a single picture into `out`.
    fn capture(
        &mut self,
        out: &mut dyn Write,
        format: StillFormat,
        use_fast_port: bool,
    ) -> Result<(), CameraError>;

    /// Starts writing video into `out` until [`Camera::stop_recording`].
    fn start_recording(
        &mut self,
        out: RecordingOutput,
        format: VideoFormat,
    ) -> Result<(), CameraError>;

    /// Stops the recording and flushes everything written so far.
    fn stop_recording(&mut self) -> Result<(), CameraError>;

    fn is_recording(&self) -> bool;

    /// Closes the camera and releases resources. Must be safe to call twice.
    fn close(&mut self);
}

/// Opens the physical device.
///
/// There is exactly one driver per process; the gate in
/// [`super::handle`] ensures it is opened by one owner at a time.
pub trait CameraDriver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Opens the device.
    fn open(&self) -> Result<Box<dyn Camera>, CameraError>;
}
