//! Request handlers.

use crate::capture::{RawCaptureParams, RawRecordParams, ValidationError};
use crate::error::ServiceError;
use crate::session::{CameraService, RecordOutcome};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

type AppState = State<Arc<CameraService>>;

/// Unparseable query strings are reported like any other bad parameter.
fn query_params<T>(
    service: &CameraService,
    query: Result<Query<T>, QueryRejection>,
) -> Result<T, ServiceError> {
    query.map(|Query(params)| params).map_err(|rejection| {
        let err = ServiceError::Validation(ValidationError::Malformed {
            field: "query",
            value: rejection.body_text(),
            expected: "query string",
        });
        service.metrics().observe_rejection(&err);
        err
    })
}

pub(super) async fn capture_picture(
    State(service): AppState,
    query: Result<Query<RawCaptureParams>, QueryRejection>,
) -> Result<String, ServiceError> {
    let params = query_params(&service, query)?;
    let artifact = service.capture_picture(&params).await?;
    Ok(format!("OK, {}", artifact.name))
}

pub(super) async fn record_video(
    State(service): AppState,
    query: Result<Query<RawRecordParams>, QueryRejection>,
) -> Result<String, ServiceError> {
    let params = query_params(&service, query)?;
    match service.record_video(&params).await? {
        RecordOutcome::Completed(artifact) => Ok(format!("OK, {}", artifact.name)),
        RecordOutcome::Started { name } => Ok(format!("OK, recording started: {name}")),
    }
}

pub(super) async fn stop_recording(State(service): AppState) -> Result<String, ServiceError> {
    let artifact = service.stop_recording().await?;
    Ok(format!("OK, {}", artifact.name))
}

/// `Recording` or `Not Recording`, as plain text.
pub(super) async fn recording_status(
    State(service): AppState,
) -> Result<&'static str, ServiceError> {
    Ok(service.query_state()?.as_str())
}

pub(super) async fn root() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/apidocs")])
}

pub(super) async fn metrics(State(service): AppState) -> impl IntoResponse {
    match service.metrics().encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

pub(super) async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
