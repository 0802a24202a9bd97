//! Camera session lifecycle.
//!
//! A session drives the device through
//!
//! ```text
//! Idle → Configuring → Capturing → Idle
//!                    ↘ Recording → Stopping → Idle
//!          (any) → Error
//! ```
//!
//! and is always left with the camera released. [`CameraService`] runs
//! sessions on behalf of requests, and [`StatusBoard`] lets status queries
//! observe the live session without taking the camera.

mod service;
#[allow(clippy::module_inception)]
mod session;
mod state;
mod status;

pub use service::{CameraService, RecordOutcome};
pub use session::Session;
pub use state::SessionState;
pub use status::{RecordingControl, RecordingOutcome, RecordingState, StatusBoard};
