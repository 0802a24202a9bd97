//! Real camera input through nokhwa.
//!
//! A nokhwa camera is not `Send` on every backend, so each opened device
//! lives on its own worker thread and is driven over a command channel.
//! Settings are kept on the [`NativeCamera`] side and handed to the worker
//! with every capture or recording; the worker reopens the device only when
//! the sensor mode changes.

use super::camera::{Camera, CameraDriver, CameraError, RecordingOutput};
use super::config::{nearest_iso, Resolution, StillFormat, VideoFormat};
use image::{ImageFormat, RgbImage};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, ControlValueSetter, FrameFormat, KnownCameraControl,
        RequestedFormat, RequestedFormatType, Resolution as DeviceResolution,
    },
    Buffer,
};
use std::io::{Cursor, Write};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

/// Opens camera `index` on the native backend.
#[derive(Debug, Clone)]
pub struct NativeDriver {
    index: u32,
}

impl NativeDriver {
    pub fn new(index: u32) -> Self {
        Self { index }
    }
}

impl CameraDriver for NativeDriver {
    fn name(&self) -> &str {
        "native"
    }

    fn open(&self) -> Result<Box<dyn Camera>, CameraError> {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let index = self.index;
        let settings = Settings::default();

        let worker = std::thread::Builder::new()
            .name(format!("camera-{index}"))
            .spawn(move || match Worker::open(index, settings) {
                Ok(worker) => {
                    let _ = ready_tx.send(Ok(()));
                    worker.run(rx);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| CameraError::OpenFailed("camera thread exited".into()))??;

        tracing::info!(index, "Camera opened");
        Ok(Box::new(NativeCamera {
            commands: tx,
            worker: Some(worker),
            settings,
            recording: false,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Settings {
    resolution: Resolution,
    fps: u32,
    iso: u32,
    brightness: u8,
    contrast: i8,
    led: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            fps: 30,
            iso: 400,
            brightness: 50,
            contrast: 0,
            led: true,
        }
    }
}

type Reply<T> = Sender<Result<T, CameraError>>;

enum Command {
    Still {
        settings: Settings,
        format: StillFormat,
        use_fast_port: bool,
        reply: Reply<Vec<u8>>,
    },
    StartRecording {
        settings: Settings,
        format: VideoFormat,
        out: RecordingOutput,
        reply: Reply<()>,
    },
    StopRecording {
        reply: Reply<()>,
    },
    Close,
}

/// An opened native camera.
pub struct NativeCamera {
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
    settings: Settings,
    recording: bool,
}

impl NativeCamera {
    fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, CameraError> {
        if self.worker.is_none() {
            return Err(CameraError::NotInitialized);
        }
        let (reply, response) = mpsc::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| CameraError::NotInitialized)?;
        response.recv().map_err(|_| CameraError::NotInitialized)?
    }
}

impl Camera for NativeCamera {
    fn set_resolution(&mut self, resolution: Resolution) -> Result<(), CameraError> {
        self.settings.resolution = resolution;
        self.settings.fps = self.settings.fps.min(resolution.max_framerate());
        Ok(())
    }

    fn set_framerate(&mut self, fps: u32) -> Result<(), CameraError> {
        let max = self.settings.resolution.max_framerate();
        if fps == 0 || fps > max {
            return Err(CameraError::ConfigFailed(format!(
                "{fps} fps not available at {} (max {max})",
                self.settings.resolution
            )));
        }
        self.settings.fps = fps;
        Ok(())
    }

    fn set_iso(&mut self, iso: i64) -> Result<(), CameraError> {
        self.settings.iso = nearest_iso(iso);
        Ok(())
    }

    fn set_led(&mut self, on: bool) -> Result<(), CameraError> {
        self.settings.led = on;
        Ok(())
    }

    fn set_brightness(&mut self, brightness: u8) -> Result<(), CameraError> {
        self.settings.brightness = brightness;
        Ok(())
    }

    fn set_contrast(&mut self, contrast: i8) -> Result<(), CameraError> {
        self.settings.contrast = contrast;
        Ok(())
    }

    fn capture(
        &mut self,
        out: &mut dyn Write,
        format: StillFormat,
        use_fast_port: bool,
    ) -> Result<(), CameraError> {
        if self.recording {
            return Err(CameraError::AlreadyRecording);
        }
        let settings = self.settings;
        let bytes = self.request(|reply| Command::Still {
            settings,
            format,
            use_fast_port,
            reply,
        })?;
        out.write_all(&bytes)
            .and_then(|_| out.flush())
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))
    }

    fn start_recording(
        &mut self,
        out: RecordingOutput,
        format: VideoFormat,
    ) -> Result<(), CameraError> {
        if self.recording {
            return Err(CameraError::AlreadyRecording);
        }
        let settings = self.settings;
        self.request(|reply| Command::StartRecording {
            settings,
            format,
            out,
            reply,
        })?;
        self.recording = true;
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), CameraError> {
        if !self.recording {
            return Err(CameraError::NotRecording);
        }
        self.recording = false;
        self.request(|reply| Command::StopRecording { reply })
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.commands.send(Command::Close);
            if worker.join().is_err() {
                tracing::warn!("Camera thread panicked");
            }
            self.recording = false;
            tracing::info!("Camera closed");
        }
    }
}

impl Drop for NativeCamera {
    fn drop(&mut self) {
        self.close();
    }
}

struct ActiveRecording {
    out: RecordingOutput,
    format: VideoFormat,
    frames: u64,
    error: Option<CameraError>,
}

/// Owns the nokhwa camera on its thread.
struct Worker {
    index: u32,
    camera: nokhwa::Camera,
    mode: (Resolution, u32),
    applied: Option<Settings>,
    recording: Option<ActiveRecording>,
}

impl Worker {
    fn open(index: u32, settings: Settings) -> Result<Self, CameraError> {
        let camera = open_device(index, settings.resolution, settings.fps)?;
        Ok(Self {
            index,
            camera,
            mode: (settings.resolution, settings.fps),
            applied: None,
            recording: None,
        })
    }

    fn run(mut self, commands: Receiver<Command>) {
        loop {
            let command = if self.recording.is_some() {
                match commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                }
            };

            match command {
                Some(Command::Still {
                    settings,
                    format,
                    use_fast_port,
                    reply,
                }) => {
                    let _ = reply.send(self.still(settings, format, use_fast_port));
                }
                Some(Command::StartRecording {
                    settings,
                    format,
                    out,
                    reply,
                }) => {
                    let _ = reply.send(self.start_recording(settings, format, out));
                }
                Some(Command::StopRecording { reply }) => {
                    let _ = reply.send(self.stop_recording());
                }
                Some(Command::Close) => break,
                None => self.record_frame(),
            }
        }

        if self.recording.is_some() {
            let _ = self.stop_recording();
        }
        if self.camera.is_stream_open() {
            let _ = self.camera.stop_stream();
        }
    }

    /// Reopens the device for a new sensor mode and applies controls.
    fn prepare(&mut self, settings: Settings) -> Result<(), CameraError> {
        let mode = (settings.resolution, settings.fps);
        if mode != self.mode {
            if self.camera.is_stream_open() {
                let _ = self.camera.stop_stream();
            }
            self.camera = open_device(self.index, settings.resolution, settings.fps)?;
            self.mode = mode;
            self.applied = None;
        }
        if self.applied != Some(settings) {
            self.apply_controls(settings);
            self.applied = Some(settings);
        }
        Ok(())
    }

    /// Controls a device lacks are skipped with a warning.
    fn apply_controls(&mut self, settings: Settings) {
        let controls = [
            (KnownCameraControl::Brightness, i64::from(settings.brightness)),
            (KnownCameraControl::Contrast, i64::from(settings.contrast)),
            (KnownCameraControl::Gain, i64::from(settings.iso)),
        ];
        for (control, value) in controls {
            if let Err(e) = self
                .camera
                .set_camera_control(control, ControlValueSetter::Integer(value))
            {
                tracing::warn!(?control, value, error = %e, "Camera control not applied");
            }
        }
        if !settings.led {
            tracing::debug!("LED control is not exposed by this backend");
        }
    }

    fn still(
        &mut self,
        settings: Settings,
        format: StillFormat,
        use_fast_port: bool,
    ) -> Result<Vec<u8>, CameraError> {
        self.prepare(settings)?;
        self.camera
            .open_stream()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        let frame = self.camera.frame();
        let _ = self.camera.stop_stream();
        let frame = frame.map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

        // The fast path passes the device's own JPEG through untouched.
        if use_fast_port
            && format == StillFormat::Jpeg
            && frame.source_frame_format() == FrameFormat::MJPEG
        {
            return Ok(frame.buffer().to_vec());
        }
        encode_still(&frame, format)
    }

    fn start_recording(
        &mut self,
        settings: Settings,
        format: VideoFormat,
        out: RecordingOutput,
    ) -> Result<(), CameraError> {
        if matches!(format, VideoFormat::H264 | VideoFormat::Yuv) {
            return Err(CameraError::Unsupported(format!(
                "{format} recording on the native backend"
            )));
        }
        self.prepare(settings)?;
        self.camera
            .open_stream()
            .map_err(|e| CameraError::RecordFailed(e.to_string()))?;
        self.recording = Some(ActiveRecording {
            out,
            format,
            frames: 0,
            error: None,
        });
        tracing::debug!(%format, "Native recording started");
        Ok(())
    }

    fn record_frame(&mut self) {
        let Some(active) = self.recording.as_mut() else {
            return;
        };
        if active.error.is_some() {
            // Failed; idle until told to stop.
            std::thread::sleep(std::time::Duration::from_millis(20));
            return;
        }
        let written = self
            .camera
            .frame()
            .map_err(|e| CameraError::RecordFailed(e.to_string()))
            .and_then(|frame| encode_video_frame(&frame, active.format))
            .and_then(|bytes| {
                active
                    .out
                    .write_all(&bytes)
                    .map_err(|e| CameraError::RecordFailed(e.to_string()))
            });
        match written {
            Ok(()) => active.frames += 1,
            Err(e) => {
                tracing::error!(error = %e, "Recording frame lost");
                active.error = Some(e);
            }
        }
    }

    fn stop_recording(&mut self) -> Result<(), CameraError> {
        let mut active = self.recording.take().ok_or(CameraError::NotRecording)?;
        let _ = self.camera.stop_stream();
        active
            .out
            .flush()
            .map_err(|e| CameraError::RecordFailed(e.to_string()))?;
        tracing::debug!(frames = active.frames, "Native recording stopped");
        match active.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn open_device(index: u32, resolution: Resolution, fps: u32) -> Result<nokhwa::Camera, CameraError> {
    let (width, height) = resolution.dimensions();
    let format = CameraFormat::new(DeviceResolution::new(width, height), FrameFormat::MJPEG, fps);
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));
    nokhwa::Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
        CameraError::DeviceNotFound(format!("camera {index}: {e}"))
    })
}

fn decode(frame: &Buffer) -> Result<RgbImage, CameraError> {
    let decoded = frame
        .decode_image::<RgbFormat>()
        .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
    let (width, height) = (decoded.width(), decoded.height());
    RgbImage::from_raw(width, height, decoded.into_raw())
        .ok_or_else(|| CameraError::CaptureFailed("frame size mismatch".into()))
}

fn encode_still(frame: &Buffer, format: StillFormat) -> Result<Vec<u8>, CameraError> {
    let encoded = match format {
        StillFormat::Jpeg => Some(ImageFormat::Jpeg),
        StillFormat::Png => Some(ImageFormat::Png),
        StillFormat::Gif => Some(ImageFormat::Gif),
        StillFormat::Bmp => Some(ImageFormat::Bmp),
        _ => None,
    };
    if let Some(image_format) = encoded {
        let image = decode(frame)?;
        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, image_format)
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        return Ok(out.into_inner());
    }

    let image = decode(frame)?;
    match format {
        StillFormat::Rgb => Ok(image.into_raw()),
        StillFormat::Rgba => Ok(expand(&image, false)),
        StillFormat::Bgr => Ok(swap_channels(&image)),
        StillFormat::Bgra => Ok(expand(&image, true)),
        other => Err(CameraError::Unsupported(format!(
            "{other} pictures on the native backend"
        ))),
    }
}

fn encode_video_frame(frame: &Buffer, format: VideoFormat) -> Result<Vec<u8>, CameraError> {
    match format {
        VideoFormat::Mjpeg if frame.source_frame_format() == FrameFormat::MJPEG => {
            Ok(frame.buffer().to_vec())
        }
        VideoFormat::Mjpeg => encode_still(frame, StillFormat::Jpeg),
        VideoFormat::Rgb => encode_still(frame, StillFormat::Rgb),
        VideoFormat::Rgba => encode_still(frame, StillFormat::Rgba),
        VideoFormat::Bgr => encode_still(frame, StillFormat::Bgr),
        VideoFormat::Bgra => encode_still(frame, StillFormat::Bgra),
        other => Err(CameraError::Unsupported(format!(
            "{other} recording on the native backend"
        ))),
    }
}

fn swap_channels(image: &RgbImage) -> Vec<u8> {
    image.pixels().flat_map(|p| [p[2], p[1], p[0]]).collect()
}

fn expand(image: &RgbImage, bgr: bool) -> Vec<u8> {
    image
        .pixels()
        .flat_map(|p| {
            if bgr {
                [p[2], p[1], p[0], u8::MAX]
            } else {
                [p[0], p[1], p[2], u8::MAX]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_framerate_limited_by_mode() {
        let (tx, _rx) = mpsc::channel();
        let mut camera = NativeCamera {
            commands: tx,
            worker: None,
            settings: Settings::default(),
            recording: false,
        };
        camera.set_resolution(Resolution::R2592x1944).unwrap();
        assert!(camera.set_framerate(30).is_err());
        assert!(camera.set_framerate(15).is_ok());
        assert!(matches!(
            camera.capture(&mut Vec::new(), StillFormat::Jpeg, false),
            Err(CameraError::NotInitialized)
        ));
    }

    #[test]
    fn test_channel_order() {
        let image = RgbImage::from_pixel(2, 1, Rgb([1, 2, 3]));
        assert_eq!(swap_channels(&image), vec![3, 2, 1, 3, 2, 1]);
        assert_eq!(expand(&image, false), vec![1, 2, 3, 255, 1, 2, 3, 255]);
        assert_eq!(expand(&image, true), vec![3, 2, 1, 255, 3, 2, 1, 255]);
    }
}
