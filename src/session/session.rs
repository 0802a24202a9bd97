//! One capture or recording, from configuration to release.
//!
//! A [`Session`] owns the camera handle and the artifact sink for the
//! duration of a single operation. All methods are blocking and are meant to
//! run on a blocking thread. Whatever way a session ends, it ends with the
//! recording stopped, the handle released and the sink either committed or
//! deleted.

use super::state::SessionState;
use super::status::{RecordingControl, StatusBoard};
use crate::capture::{
    Camera, CameraError, CameraHandle, DeviceSettings, OperationKind, StillFormat, VideoFormat,
};
use crate::error::{Result, ServiceError};
use crate::output::{Artifact, ArtifactSink};
use std::sync::Arc;

/// State machine driving the device through one operation.
pub struct Session {
    id: u64,
    kind: OperationKind,
    state: SessionState,
    handle: CameraHandle,
    sink: Option<ArtifactSink>,
    board: Arc<StatusBoard>,
    finished: bool,
}

impl Session {
    /// Starts a session in `Idle` and publishes it on the board.
    pub fn begin(
        handle: CameraHandle,
        sink: ArtifactSink,
        kind: OperationKind,
        board: Arc<StatusBoard>,
        control: Option<RecordingControl>,
    ) -> Self {
        let id = board.register(kind, control);
        tracing::debug!(session = id, kind = %kind, artifact = sink.name(), "Session started");
        Self {
            id,
            kind,
            state: SessionState::Idle,
            handle,
            sink: Some(sink),
            board,
            finished: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn artifact_name(&self) -> Option<&str> {
        self.sink.as_ref().map(ArtifactSink::name)
    }

    fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(ServiceError::InvalidState(format!(
                "{} session cannot go from {} to {}",
                self.kind, self.state, next
            )));
        }
        tracing::debug!(session = self.id, from = %self.state, to = %next, "Session transition");
        self.state = next;
        self.board.update(self.id, next);
        Ok(())
    }

    /// Applies every setting to the device.
    ///
    /// The first rejected field moves the session to `Error`.
    pub fn configure(&mut self, settings: &DeviceSettings, framerate: Option<u32>) -> Result<()> {
        self.transition(SessionState::Configuring)?;
        let applied = self
            .handle
            .camera()
            .and_then(|camera| apply_settings(camera, settings, framerate));
        match applied {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fault(e.into())),
        }
    }

    /// Takes one picture and ends the session.
    ///
    /// A failed capture still returns the session to `Idle`: the device is
    /// left consistent, only the artifact is dropped.
    pub fn capture(mut self, format: StillFormat, use_fast_port: bool) -> Result<Artifact> {
        self.transition(SessionState::Capturing)?;
        let mut writer = match self.sink.as_ref() {
            Some(sink) => sink.writer(),
            None => return Err(self.fault(missing_sink())),
        };
        let captured = self
            .handle
            .camera()
            .and_then(|camera| camera.capture(&mut writer, format, use_fast_port));
        drop(writer);

        if let Err(e) = captured {
            tracing::warn!(session = self.id, error = %e, "Capture failed");
            if let Some(sink) = self.sink.take() {
                sink.discard();
            }
            self.transition(SessionState::Idle)?;
            self.release();
            return Err(e.into());
        }
        self.commit()
    }

    /// Starts the device writing video into the artifact.
    pub fn start_recording(&mut self, format: VideoFormat) -> Result<()> {
        let writer = match self.sink.as_ref() {
            Some(sink) => sink.writer(),
            None => return Err(self.fault(missing_sink())),
        };
        let started = self
            .handle
            .camera()
            .and_then(|camera| camera.start_recording(Box::new(writer), format));
        if let Err(e) = started {
            return Err(self.fault(e.into()));
        }
        self.transition(SessionState::Recording)?;
        tracing::info!(
            session = self.id,
            format = %format,
            artifact = self.artifact_name().unwrap_or_default(),
            "Recording started"
        );
        Ok(())
    }

    /// Stops the recording, commits the artifact and ends the session.
    pub fn stop(mut self) -> Result<Artifact> {
        self.transition(SessionState::Stopping)?;
        let stopped = self
            .handle
            .camera()
            .and_then(|camera| camera.stop_recording());
        if let Err(e) = stopped {
            return Err(self.fault(e.into()));
        }
        self.commit()
    }

    fn commit(&mut self) -> Result<Artifact> {
        let sink = match self.sink.take() {
            Some(sink) => sink,
            None => return Err(self.fault(missing_sink())),
        };
        match sink.commit() {
            Ok(artifact) => {
                self.transition(SessionState::Idle)?;
                self.release();
                tracing::info!(
                    session = self.id,
                    kind = %self.kind,
                    artifact = %artifact.name,
                    bytes = artifact.bytes,
                    "Session completed"
                );
                Ok(artifact)
            }
            Err(e) => Err(self.fault(e.into())),
        }
    }

    /// Moves to `Error`, cleans up and hands the error back.
    fn fault(&mut self, err: ServiceError) -> ServiceError {
        if !self.state.is_terminal() {
            self.state = SessionState::Error;
            self.board.update(self.id, SessionState::Error);
        }
        tracing::error!(session = self.id, kind = %self.kind, error = %err, "Session failed");
        self.cleanup();
        err
    }

    /// Best-effort stop, discard and release.
    fn cleanup(&mut self) {
        if let Ok(camera) = self.handle.camera() {
            if camera.is_recording() {
                if let Err(e) = camera.stop_recording() {
                    tracing::warn!(session = self.id, error = %e, "Stop during cleanup failed");
                }
            }
        }
        if let Some(sink) = self.sink.take() {
            sink.discard();
        }
        self.release();
    }

    /// Leaves the board, then frees the camera.
    fn release(&mut self) {
        self.board.clear(self.id);
        self.handle.release();
        self.finished = true;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(session = self.id, state = %self.state, "Session dropped before completion");
            self.fault(ServiceError::InvalidState("session abandoned".into()));
        }
    }
}

fn apply_settings(
    camera: &mut dyn Camera,
    settings: &DeviceSettings,
    framerate: Option<u32>,
) -> std::result::Result<(), CameraError> {
    camera.set_resolution(settings.resolution)?;
    if let Some(fps) = framerate {
        camera.set_framerate(fps)?;
    }
    camera.set_iso(settings.iso)?;
    camera.set_led(settings.led)?;
    camera.set_brightness(settings.brightness)?;
    camera.set_contrast(settings.contrast)?;
    Ok(())
}

fn missing_sink() -> ServiceError {
    ServiceError::InvalidState("session has no artifact sink".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CameraGate, MockDriver, MockFaults, Resolution};
    use crate::output::OutputDirectory;
    use SessionState::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        output: OutputDirectory,
        driver: Arc<MockDriver>,
        gate: CameraGate,
        board: Arc<StatusBoard>,
    }

    fn fixture(faults: MockFaults) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let driver = Arc::new(MockDriver::with_faults(faults));
        Fixture {
            output: OutputDirectory::new(dir.path()),
            _dir: dir,
            gate: CameraGate::new(driver.clone()),
            driver,
            board: Arc::new(StatusBoard::new()),
        }
    }

    impl Fixture {
        fn session(&self, kind: OperationKind, ext: &str) -> Session {
            let sink = self.output.open(ext).unwrap();
            let handle = self.gate.try_acquire().unwrap();
            Session::begin(handle, sink, kind, Arc::clone(&self.board), None)
        }

        fn files(&self) -> usize {
            std::fs::read_dir(self.output.root()).unwrap().count()
        }

        fn assert_released(&self) {
            assert!(!self.gate.is_held());
            assert_eq!(self.driver.stats().live(), 0);
            assert_eq!(self.board.current_state(), None);
        }
    }

    #[test]
    fn test_capture_lifecycle() {
        let fx = fixture(MockFaults::default());
        let mut session = fx.session(OperationKind::Capture, "jpeg");
        session.configure(&DeviceSettings::default(), None).unwrap();
        let artifact = session.capture(StillFormat::Jpeg, false).unwrap();

        assert!(artifact.bytes > 0);
        assert!(artifact.path.exists());
        assert_eq!(fx.board.last_trace(), vec![Idle, Configuring, Capturing, Idle]);
        fx.assert_released();
    }

    #[test]
    fn test_failed_capture_returns_to_idle_and_releases() {
        let fx = fixture(MockFaults {
            capture: true,
            ..Default::default()
        });
        let mut session = fx.session(OperationKind::Capture, "png");
        session.configure(&DeviceSettings::default(), None).unwrap();
        let err = session.capture(StillFormat::Png, false).unwrap_err();

        assert!(matches!(err, ServiceError::Device(CameraError::CaptureFailed(_))));
        assert_eq!(fx.board.last_trace(), vec![Idle, Configuring, Capturing, Idle]);
        assert_eq!(fx.files(), 0);
        fx.assert_released();
    }

    #[test]
    fn test_empty_capture_is_a_fault() {
        let fx = fixture(MockFaults {
            empty_output: true,
            ..Default::default()
        });
        let mut session = fx.session(OperationKind::Capture, "jpeg");
        session.configure(&DeviceSettings::default(), None).unwrap();
        assert!(matches!(
            session.capture(StillFormat::Jpeg, false),
            Err(ServiceError::Device(_))
        ));
        assert_eq!(fx.board.last_trace().last(), Some(&Error));
        assert_eq!(fx.files(), 0);
        fx.assert_released();
    }

    #[test]
    fn test_configure_fault_moves_to_error() {
        let fx = fixture(MockFaults {
            configure: true,
            ..Default::default()
        });
        let mut session = fx.session(OperationKind::Capture, "jpeg");
        let err = session.configure(&DeviceSettings::default(), None).unwrap_err();

        assert!(matches!(err, ServiceError::Device(CameraError::ConfigFailed(_))));
        assert_eq!(session.state(), Error);
        assert_eq!(fx.files(), 0);
        fx.assert_released();

        assert!(matches!(
            session.capture(StillFormat::Jpeg, false),
            Err(ServiceError::InvalidState(_))
        ));
        fx.assert_released();
    }

    #[test]
    fn test_framerate_beyond_sensor_mode_is_rejected() {
        let fx = fixture(MockFaults::default());
        let mut session = fx.session(OperationKind::Record, "h264");
        let settings = DeviceSettings {
            resolution: Resolution::R2592x1944,
            ..Default::default()
        };
        assert!(session.configure(&settings, Some(30)).is_err());
        fx.assert_released();
    }

    #[test]
    fn test_recording_lifecycle() {
        let fx = fixture(MockFaults::default());
        let mut session = fx.session(OperationKind::Record, "h264");
        session.configure(&DeviceSettings::default(), Some(30)).unwrap();
        session.start_recording(VideoFormat::H264).unwrap();
        assert_eq!(fx.board.current_state(), Some(Recording));
        assert!(fx.gate.is_held());

        std::thread::sleep(std::time::Duration::from_millis(100));
        let artifact = session.stop().unwrap();
        assert!(artifact.bytes > 0);
        assert_eq!(
            fx.board.last_trace(),
            vec![Idle, Configuring, Recording, Stopping, Idle]
        );
        fx.assert_released();
    }

    #[test]
    fn test_stop_fault_cleans_up() {
        let fx = fixture(MockFaults {
            stop: true,
            ..Default::default()
        });
        let mut session = fx.session(OperationKind::Record, "mjpeg");
        session.configure(&DeviceSettings::default(), Some(30)).unwrap();
        session.start_recording(VideoFormat::Mjpeg).unwrap();
        assert!(session.stop().is_err());
        assert_eq!(fx.files(), 0);
        fx.assert_released();
    }

    #[test]
    fn test_stop_without_recording_is_invalid_state() {
        let fx = fixture(MockFaults::default());
        let session = fx.session(OperationKind::Record, "h264");
        assert!(matches!(session.stop(), Err(ServiceError::InvalidState(_))));
        fx.assert_released();
    }

    #[test]
    fn test_dropped_session_releases_everything() {
        let fx = fixture(MockFaults::default());
        {
            let mut session = fx.session(OperationKind::Record, "h264");
            session.configure(&DeviceSettings::default(), Some(30)).unwrap();
            session.start_recording(VideoFormat::H264).unwrap();
        }
        assert_eq!(fx.files(), 0);
        fx.assert_released();
    }
}
