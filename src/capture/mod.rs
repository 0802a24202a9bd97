//! Camera input, configuration and exclusive device access.
//!
//! Raw request parameters are validated in [`params`] into the strongly
//! typed configs of [`config`]. The device itself sits behind the
//! [`Camera`]/[`CameraDriver`] traits and is only reachable through the
//! [`CameraGate`].

mod camera;
mod config;
mod handle;
mod mock;
#[cfg(feature = "camera")]
mod native;
mod params;

pub use camera::{Camera, CameraDriver, CameraError, RecordingOutput};
pub use config::{
    nearest_iso, CaptureConfig, DeviceSettings, RecordConfig, RecordDuration, Resolution,
    StillFormat, VideoFormat, STILL_RESOLUTIONS, SUPPORTED_ISO, VIDEO_RESOLUTIONS,
};
pub use handle::{CameraGate, CameraHandle, GateError, Reservation};
pub use mock::{MockCamera, MockDriver, MockFaults, MockStats};
#[cfg(feature = "camera")]
pub use native::NativeDriver;
pub use params::{OperationKind, RawCaptureParams, RawRecordParams, ValidationError};
