//! Mock camera that produces synthetic output.
//!
//! Used as the default backend and by tests. Faults can be injected per
//! phase, and [`MockStats`] counts opens and closes so tests can check that
//! no handle leaked.

use super::camera::{Camera, CameraDriver, CameraError, RecordingOutput};
use super::config::{nearest_iso, Resolution, StillFormat, VideoFormat};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Phases in which the mock camera should fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockFaults {
    pub open: bool,
    pub configure: bool,
    pub capture: bool,
    pub record: bool,
    pub stop: bool,
    /// Capture succeeds but writes nothing.
    pub empty_output: bool,
}

/// Open/close counters shared between a driver and its cameras.
#[derive(Debug, Default)]
pub struct MockStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl MockStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Cameras opened and not yet closed.
    pub fn live(&self) -> usize {
        self.opened().saturating_sub(self.closed())
    }
}

/// Driver handing out [`MockCamera`]s.
#[derive(Debug, Default)]
pub struct MockDriver {
    faults: Mutex<MockFaults>,
    stats: Arc<MockStats>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: MockFaults) -> Self {
        Self {
            faults: Mutex::new(faults),
            stats: Arc::default(),
        }
    }

    /// Replaces the fault plan for cameras opened from now on.
    pub fn set_faults(&self, faults: MockFaults) {
        match self.faults.lock() {
            Ok(mut guard) => *guard = faults,
            Err(poisoned) => *poisoned.into_inner() = faults,
        }
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }

    fn faults(&self) -> MockFaults {
        match self.faults.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl CameraDriver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(&self) -> Result<Box<dyn Camera>, CameraError> {
        let faults = self.faults();
        if faults.open {
            return Err(CameraError::OpenFailed("injected open fault".into()));
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockCamera::with_stats(faults, Arc::clone(&self.stats))))
    }
}

struct Recorder {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<Result<u64, String>>,
}

/// Mock camera for testing that generates synthetic frames.
pub struct MockCamera {
    faults: MockFaults,
    stats: Arc<MockStats>,
    resolution: Resolution,
    framerate: u32,
    iso: u32,
    led: bool,
    brightness: u8,
    contrast: i8,
    sequence: u64,
    recorder: Option<Recorder>,
    closed: bool,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::with_stats(MockFaults::default(), Arc::default())
    }

    fn with_stats(faults: MockFaults, stats: Arc<MockStats>) -> Self {
        Self {
            faults,
            stats,
            resolution: Resolution::default(),
            framerate: 30,
            iso: 400,
            led: true,
            brightness: 50,
            contrast: 0,
            sequence: 0,
            recorder: None,
            closed: false,
        }
    }

    /// ISO actually in effect after snapping.
    pub fn effective_iso(&self) -> u32 {
        self.iso
    }

    fn ensure_open(&self) -> Result<(), CameraError> {
        if self.closed {
            Err(CameraError::NotInitialized)
        } else {
            Ok(())
        }
    }

    fn configure_fault(&self, field: &str) -> Result<(), CameraError> {
        self.ensure_open()?;
        if self.faults.configure {
            return Err(CameraError::ConfigFailed(format!("injected fault on {field}")));
        }
        Ok(())
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a deterministic frame; not meant to look like a real image.
fn synthetic_frame(resolution: Resolution, tag: &str, sequence: u64) -> Vec<u8> {
    let (width, height) = resolution.dimensions();
    let payload = ((width as usize * height as usize) / 256).max(64);
    let mut frame = format!("MOCK {tag} {width}x{height} #{sequence}\n").into_bytes();
    frame.extend((0..payload).map(|i| ((i as u64 ^ sequence) % 256) as u8));
    frame
}

impl Camera for MockCamera {
    fn set_resolution(&mut self, resolution: Resolution) -> Result<(), CameraError> {
        self.configure_fault("resolution")?;
        self.resolution = resolution;
        Ok(())
    }

    fn set_framerate(&mut self, fps: u32) -> Result<(), CameraError> {
        self.configure_fault("framerate")?;
        let max = self.resolution.max_framerate();
        if fps == 0 || fps > max {
            return Err(CameraError::ConfigFailed(format!(
                "framerate {fps} not available at {} (max {max})",
                self.resolution
            )));
        }
        self.framerate = fps;
        Ok(())
    }

    fn set_iso(&mut self, iso: i64) -> Result<(), CameraError> {
        self.configure_fault("iso")?;
        self.iso = nearest_iso(iso);
        Ok(())
    }

    fn set_led(&mut self, on: bool) -> Result<(), CameraError> {
        self.configure_fault("led")?;
        self.led = on;
        Ok(())
    }

    fn set_brightness(&mut self, brightness: u8) -> Result<(), CameraError> {
        self.configure_fault("brightness")?;
        self.brightness = brightness;
        Ok(())
    }

    fn set_contrast(&mut self, contrast: i8) -> Result<(), CameraError> {
        self.configure_fault("contrast")?;
        self.contrast = contrast;
        Ok(())
    }

    fn capture(
        &mut self,
        out: &mut dyn Write,
        format: StillFormat,
        use_fast_port: bool,
    ) -> Result<(), CameraError> {
        self.ensure_open()?;
        if self.recorder.is_some() && !use_fast_port {
            return Err(CameraError::AlreadyRecording);
        }
        if self.faults.capture {
            return Err(CameraError::CaptureFailed("injected capture fault".into()));
        }
        if self.faults.empty_output {
            return Ok(());
        }
        self.sequence += 1;
        let frame = synthetic_frame(self.resolution, format.extension(), self.sequence);
        out.write_all(&frame)
            .and_then(|_| out.flush())
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        tracing::debug!(
            format = %format,
            bytes = frame.len(),
            iso = self.iso,
            "MockCamera captured picture"
        );
        Ok(())
    }

    fn start_recording(
        &mut self,
        mut out: RecordingOutput,
        format: VideoFormat,
    ) -> Result<(), CameraError> {
        self.ensure_open()?;
        if self.recorder.is_some() {
            return Err(CameraError::AlreadyRecording);
        }
        if self.faults.record {
            return Err(CameraError::RecordFailed("injected record fault".into()));
        }

        let resolution = self.resolution;
        let tag = format.extension();
        let first = synthetic_frame(resolution, tag, 0);
        out.write_all(&first)
            .map_err(|e| CameraError::RecordFailed(e.to_string()))?;

        let interval = Duration::from_micros(1_000_000 / u64::from(self.framerate.max(1)));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = std::thread::Builder::new()
            .name("mock-recorder".into())
            .spawn(move || {
                let mut written = first.len() as u64;
                let mut sequence = 1;
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let frame = synthetic_frame(resolution, tag, sequence);
                            out.write_all(&frame).map_err(|e| e.to_string())?;
                            written += frame.len() as u64;
                            sequence += 1;
                        }
                        _ => break,
                    }
                }
                out.flush().map_err(|e| e.to_string())?;
                Ok(written)
            })
            .map_err(|e| CameraError::RecordFailed(e.to_string()))?;

        self.recorder = Some(Recorder {
            stop: stop_tx,
            thread,
        });
        tracing::debug!(format = %format, fps = self.framerate, "MockCamera recording started");
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), CameraError> {
        let recorder = self.recorder.take().ok_or(CameraError::NotRecording)?;
        let _ = recorder.stop.send(());
        let bytes = match recorder.thread.join() {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(msg)) => return Err(CameraError::RecordFailed(msg)),
            Err(_) => return Err(CameraError::RecordFailed("recorder thread panicked".into())),
        };
        if self.faults.stop {
            return Err(CameraError::RecordFailed("injected stop fault".into()));
        }
        tracing::debug!(bytes, "MockCamera recording stopped");
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    fn close(&mut self) {
        if self.recorder.is_some() {
            let _ = self.stop_recording();
        }
        if !self.closed {
            self.closed = true;
            self.stats.closed.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("MockCamera closed");
        }
    }
}

impl Drop for MockCamera {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_mock_camera_lifecycle() {
        let driver = MockDriver::new();
        let stats = driver.stats();
        let mut camera = driver.open().unwrap();
        assert_eq!(stats.live(), 1);

        camera.set_resolution(Resolution::R640x480).unwrap();
        camera.set_framerate(90).unwrap();

        let mut out = Vec::new();
        camera.capture(&mut out, StillFormat::Png, false).unwrap();
        assert!(out.starts_with(b"MOCK png 640x480"));

        camera.close();
        camera.close();
        assert_eq!(stats.live(), 0);
        assert_eq!(stats.closed(), 1);
        assert!(matches!(
            camera.set_led(false),
            Err(CameraError::NotInitialized)
        ));
    }

    #[test]
    fn test_framerate_limited_by_resolution() {
        let mut camera = MockCamera::new();
        camera.set_resolution(Resolution::R2592x1944).unwrap();
        assert!(matches!(
            camera.set_framerate(30),
            Err(CameraError::ConfigFailed(_))
        ));
        camera.set_framerate(15).unwrap();
    }

    #[test]
    fn test_iso_snaps_to_nearest() {
        let mut camera = MockCamera::new();
        camera.set_iso(450).unwrap();
        assert_eq!(camera.effective_iso(), 400);
        camera.set_iso(700).unwrap();
        assert_eq!(camera.effective_iso(), 640);
    }

    #[test]
    fn test_recording_writes_until_stopped() {
        let mut camera = MockCamera::new();
        let buf = SharedBuf::default();
        camera
            .start_recording(Box::new(buf.clone()), VideoFormat::Mjpeg)
            .unwrap();
        assert!(camera.is_recording());
        assert!(matches!(
            camera.start_recording(Box::new(buf.clone()), VideoFormat::Mjpeg),
            Err(CameraError::AlreadyRecording)
        ));

        std::thread::sleep(Duration::from_millis(120));
        camera.stop_recording().unwrap();
        assert!(!camera.is_recording());
        assert!(buf.0.lock().unwrap().len() > 0);
        assert!(matches!(
            camera.stop_recording(),
            Err(CameraError::NotRecording)
        ));
    }

    #[test]
    fn test_injected_open_fault() {
        let driver = MockDriver::with_faults(MockFaults {
            open: true,
            ..Default::default()
        });
        assert!(matches!(driver.open(), Err(CameraError::OpenFailed(_))));
        assert_eq!(driver.stats().opened(), 0);
    }
}
