//! Error taxonomy of the camera service.

use crate::capture::{CameraError, GateError, ValidationError};
use crate::output::SinkError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Result type alias using [`ServiceError`].
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Everything an operation on the camera service can fail with.
///
/// Cloneable so a recording's outcome can be handed both to the request
/// that started it and to the one that stopped it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Bad or out-of-range parameter; the device was never touched.
    #[error("invalid parameter: {0}")]
    Validation(#[from] ValidationError),

    /// Another operation owns the camera.
    #[error("camera is busy")]
    Busy,

    /// Artifact could not be created or written.
    #[error("I/O error: {0}")]
    Io(String),

    /// Driver-level fault while opening, configuring or operating the camera.
    #[error("device error: {0}")]
    Device(#[from] CameraError),

    /// Operation does not match the current session state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl ServiceError {
    /// Caller mistakes as opposed to device or I/O faults.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation(_) | ServiceError::Busy | ServiceError::InvalidState(_)
        )
    }
}

impl From<GateError> for ServiceError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Busy => ServiceError::Busy,
            GateError::Device(e) => ServiceError::Device(e),
        }
    }
}

impl From<SinkError> for ServiceError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Io { .. } => ServiceError::Io(err.to_string()),
            SinkError::Empty { name } => ServiceError::Device(CameraError::CaptureFailed(
                format!("device produced no data for {name}"),
            )),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            tracing::warn!(error = %self, "Request error");
        } else {
            tracing::error!(error = %self, "Request error");
        }
        (
            StatusCode::BAD_REQUEST,
            [("content-type", "text/plain; charset=utf-8")],
            format!("NOK: {self}"),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_errors_map() {
        assert_eq!(ServiceError::from(GateError::Busy), ServiceError::Busy);
        assert!(matches!(
            ServiceError::from(GateError::Device(CameraError::NotInitialized)),
            ServiceError::Device(CameraError::NotInitialized)
        ));
    }

    #[test]
    fn test_empty_artifact_is_device_fault() {
        let err = ServiceError::from(SinkError::Empty {
            name: "pi_x.jpeg".into(),
        });
        assert!(matches!(err, ServiceError::Device(_)));
        assert!(!err.is_client_error());
    }
}
