//! Metrics collection and registry.

use crate::error::ServiceError;
use crate::output::Artifact;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Current counter values, mainly for tests and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub captures: u64,
    pub capture_failures: u64,
    pub recordings: u64,
    pub recording_failures: u64,
    pub busy_rejections: u64,
    pub validation_failures: u64,
    pub artifact_bytes: u64,
    pub recording_active: bool,
}

/// Prometheus metrics registry for camera operations.
pub struct MetricsRegistry {
    registry: Registry,

    captures_total: IntCounter,
    capture_failures_total: IntCounter,
    recordings_total: IntCounter,
    recording_failures_total: IntCounter,
    busy_rejections_total: IntCounter,
    validation_failures_total: IntCounter,
    artifact_bytes_total: IntCounter,
    recording_active: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all camera metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let captures_total =
            IntCounter::new("picam_captures_total", "Pictures captured and committed")?;
        let capture_failures_total =
            IntCounter::new("picam_capture_failures_total", "Pictures that failed after acquiring the camera")?;
        let recordings_total =
            IntCounter::new("picam_recordings_total", "Recordings committed")?;
        let recording_failures_total =
            IntCounter::new("picam_recording_failures_total", "Recordings that failed to start or finish")?;
        let busy_rejections_total = IntCounter::new(
            "picam_busy_rejections_total",
            "Requests rejected because the camera was in use",
        )?;
        let validation_failures_total = IntCounter::new(
            "picam_validation_failures_total",
            "Requests rejected by parameter validation",
        )?;
        let artifact_bytes_total =
            IntCounter::new("picam_artifact_bytes_total", "Bytes written to committed artifacts")?;
        let recording_active = IntGauge::new(
            "picam_recording_active",
            "Whether a recording is in progress (1=recording, 0=idle)",
        )?;

        registry.register(Box::new(captures_total.clone()))?;
        registry.register(Box::new(capture_failures_total.clone()))?;
        registry.register(Box::new(recordings_total.clone()))?;
        registry.register(Box::new(recording_failures_total.clone()))?;
        registry.register(Box::new(busy_rejections_total.clone()))?;
        registry.register(Box::new(validation_failures_total.clone()))?;
        registry.register(Box::new(artifact_bytes_total.clone()))?;
        registry.register(Box::new(recording_active.clone()))?;

        Ok(Self {
            registry,
            captures_total,
            capture_failures_total,
            recordings_total,
            recording_failures_total,
            busy_rejections_total,
            validation_failures_total,
            artifact_bytes_total,
            recording_active,
        })
    }

    /// Counts an error raised before a session started.
    pub fn observe_rejection(&self, err: &ServiceError) {
        match err {
            ServiceError::Busy => self.busy_rejections_total.inc(),
            ServiceError::Validation(_) => self.validation_failures_total.inc(),
            _ => {}
        }
    }

    pub fn observe_capture(&self, result: &Result<Artifact, ServiceError>) {
        match result {
            Ok(artifact) => {
                self.captures_total.inc();
                self.artifact_bytes_total.inc_by(artifact.bytes);
            }
            Err(_) => self.capture_failures_total.inc(),
        }
    }

    pub fn recording_started(&self) {
        self.recording_active.set(1);
    }

    /// Counts a recording that never reached the recording state.
    pub fn observe_recording_failure(&self, err: &ServiceError) {
        if !matches!(err, ServiceError::Busy | ServiceError::Validation(_)) {
            self.recording_failures_total.inc();
        }
    }

    /// Counts the end of a recording.
    pub fn observe_recording(&self, result: &Result<Artifact, ServiceError>) {
        self.recording_active.set(0);
        match result {
            Ok(artifact) => {
                self.recordings_total.inc();
                self.artifact_bytes_total.inc_by(artifact.bytes);
            }
            Err(_) => self.recording_failures_total.inc(),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            captures: self.captures_total.get(),
            capture_failures: self.capture_failures_total.get(),
            recordings: self.recordings_total.get(),
            recording_failures: self.recording_failures_total.get(),
            busy_rejections: self.busy_rejections_total.get(),
            validation_failures: self.validation_failures_total.get(),
            artifact_bytes: self.artifact_bytes_total.get(),
            recording_active: self.recording_active.get() != 0,
        }
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn artifact(bytes: u64) -> Artifact {
        Artifact {
            name: "pi_test.jpeg".into(),
            path: PathBuf::from("pi_test.jpeg"),
            bytes,
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_observations() {
        let registry = MetricsRegistry::new().unwrap();

        registry.observe_capture(&Ok(artifact(100)));
        registry.observe_capture(&Err(ServiceError::Io("disk full".into())));
        registry.observe_rejection(&ServiceError::Busy);
        registry.recording_started();
        assert!(registry.snapshot().recording_active);
        registry.observe_recording(&Ok(artifact(50)));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.captures, 1);
        assert_eq!(snapshot.capture_failures, 1);
        assert_eq!(snapshot.busy_rejections, 1);
        assert_eq!(snapshot.recordings, 1);
        assert_eq!(snapshot.artifact_bytes, 150);
        assert!(!snapshot.recording_active);
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        registry.observe_rejection(&ServiceError::Busy);
        let output = registry.encode().unwrap();

        assert!(output.contains("picam_busy_rejections_total 1"));
        assert!(output.contains("picam_captures_total 0"));
        assert!(output.contains("picam_recording_active 0"));
    }
}
