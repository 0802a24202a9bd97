//! Pi Cam Library
//!
//! Drives a single camera on behalf of concurrent HTTP callers: still
//! pictures, bounded and unbounded video recordings, and a recording status
//! query. At most one operation owns the camera at any time.
//!
//! # Architecture
//!
//! Every request follows the same path:
//!
//! ```text
//! params → validate → artifact sink → camera gate → session → commit
//!                                                      ↓
//!                                                status board
//! ```
//!
//! # Design Principles
//!
//! - **Validate first**: a bad parameter never reaches the device
//! - **Fail fast**: a busy camera rejects the request instead of queueing it
//! - **Always release**: the camera handle and artifact are released on every path
//! - **Status never blocks**: the status query reads a snapshot, not the gate
//!
//! # Example
//!
//! ```no_run
//! use picam::{
//!     capture::{CameraGate, MockDriver, RawCaptureParams},
//!     metrics::MetricsRegistry,
//!     output::OutputDirectory,
//!     session::CameraService,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> picam::Result<()> {
//! let service = CameraService::new(
//!     CameraGate::new(Arc::new(MockDriver::new())),
//!     OutputDirectory::new("/tmp"),
//!     Arc::new(MetricsRegistry::new().expect("metrics")),
//! );
//!
//! let artifact = service.capture_picture(&RawCaptureParams::default()).await?;
//! println!("wrote {}", artifact.name);
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod error;
pub mod metrics;
pub mod output;
pub mod server;
pub mod session;

// Re-export commonly used types at crate root
pub use capture::{Camera, CameraDriver, CameraGate, CaptureConfig, MockDriver, RecordConfig};
pub use config::FileConfig;
pub use error::{Result, ServiceError};
pub use output::{Artifact, OutputDirectory};
pub use server::{router, ApiServer};
pub use session::{CameraService, RecordOutcome, RecordingState, SessionState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
