//! Validated capture and recording configuration.
//!
//! These types are what the session layer applies to the device. They are
//! produced by the parameter validator and are always internally consistent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

/// ISO values the sensor actually supports.
pub const SUPPORTED_ISO: [u32; 7] = [100, 200, 320, 400, 500, 640, 800];

/// Sensor modes offered for still pictures.
pub const STILL_RESOLUTIONS: [Resolution; 5] = [
    Resolution::R2592x1944,
    Resolution::R1920x1080,
    Resolution::R1296x972,
    Resolution::R1296x730,
    Resolution::R640x480,
];

/// Sensor modes offered for video recording.
pub const VIDEO_RESOLUTIONS: [Resolution; 5] = [
    Resolution::R2592x1944,
    Resolution::R1920x1080,
    Resolution::R1296x972,
    Resolution::R1296x730,
    Resolution::R640x480,
];

/// Sensor resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Resolution {
    R2592x1944,
    R1920x1080,
    R1296x972,
    R1296x730,
    R640x480,
}

impl Resolution {
    /// Width and height in pixels.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::R2592x1944 => (2592, 1944),
            Resolution::R1920x1080 => (1920, 1080),
            Resolution::R1296x972 => (1296, 972),
            Resolution::R1296x730 => (1296, 730),
            Resolution::R640x480 => (640, 480),
        }
    }

    /// Highest framerate the sensor mode can sustain.
    pub fn max_framerate(self) -> u32 {
        match self {
            Resolution::R2592x1944 => 15,
            Resolution::R1920x1080 => 30,
            Resolution::R1296x972 => 42,
            Resolution::R1296x730 => 49,
            Resolution::R640x480 => 90,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::R2592x1944 => "2592x1944",
            Resolution::R1920x1080 => "1920x1080",
            Resolution::R1296x972 => "1296x972",
            Resolution::R1296x730 => "1296x730",
            Resolution::R640x480 => "640x480",
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::R1920x1080
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STILL_RESOLUTIONS
            .iter()
            .chain(VIDEO_RESOLUTIONS.iter())
            .copied()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| s.to_string())
    }
}

impl TryFrom<String> for Resolution {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.as_str().to_string()
    }
}

/// Maps a requested ISO to the closest supported sensor value.
///
/// Ties resolve to the lower value. Anything at or below zero maps to 100.
pub fn nearest_iso(requested: i64) -> u32 {
    SUPPORTED_ISO
        .iter()
        .copied()
        .min_by_key(|&iso| requested.saturating_sub(i64::from(iso)).unsigned_abs())
        .unwrap_or(400)
}

/// Output formats for still pictures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StillFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Yuv,
    Rgb,
    Rgba,
    Bgr,
    Bgra,
}

impl StillFormat {
    pub const ALL: [StillFormat; 9] = [
        StillFormat::Jpeg,
        StillFormat::Png,
        StillFormat::Gif,
        StillFormat::Bmp,
        StillFormat::Yuv,
        StillFormat::Rgb,
        StillFormat::Rgba,
        StillFormat::Bgr,
        StillFormat::Bgra,
    ];

    /// File extension, identical to the format name.
    pub fn extension(self) -> &'static str {
        match self {
            StillFormat::Jpeg => "jpeg",
            StillFormat::Png => "png",
            StillFormat::Gif => "gif",
            StillFormat::Bmp => "bmp",
            StillFormat::Yuv => "yuv",
            StillFormat::Rgb => "rgb",
            StillFormat::Rgba => "rgba",
            StillFormat::Bgr => "bgr",
            StillFormat::Bgra => "bgra",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == name)
    }
}

impl Default for StillFormat {
    fn default() -> Self {
        StillFormat::Jpeg
    }
}

impl fmt::Display for StillFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Output formats for video recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    H264,
    Mjpeg,
    Yuv,
    Rgb,
    Rgba,
    Bgr,
    Bgra,
}

impl VideoFormat {
    pub const ALL: [VideoFormat; 7] = [
        VideoFormat::H264,
        VideoFormat::Mjpeg,
        VideoFormat::Yuv,
        VideoFormat::Rgb,
        VideoFormat::Rgba,
        VideoFormat::Bgr,
        VideoFormat::Bgra,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            VideoFormat::H264 => "h264",
            VideoFormat::Mjpeg => "mjpeg",
            VideoFormat::Yuv => "yuv",
            VideoFormat::Rgb => "rgb",
            VideoFormat::Rgba => "rgba",
            VideoFormat::Bgr => "bgr",
            VideoFormat::Bgra => "bgra",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == name)
    }
}

impl Default for VideoFormat {
    fn default() -> Self {
        VideoFormat::H264
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Device-facing settings shared by pictures and recordings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Sensor mode.
    pub resolution: Resolution,
    /// Requested ISO; the driver snaps it to [`SUPPORTED_ISO`].
    pub iso: i64,
    /// Brightness, 0 to 100.
    pub brightness: u8,
    /// Contrast, -100 to 100.
    pub contrast: i8,
    /// Camera LED on or off.
    pub led: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            iso: 400,
            brightness: 50,
            contrast: 0,
            led: true,
        }
    }
}

/// Configuration for a single still picture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub settings: DeviceSettings,
    pub format: StillFormat,
    /// Capture through the video port: faster, lower quality.
    pub use_fast_port: bool,
}

/// How long a recording runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordDuration {
    /// Runs until an explicit stop command.
    Unbounded,
    /// Stops by itself after this many seconds.
    Bounded(NonZeroU64),
}

impl RecordDuration {
    /// Interprets a raw duration, where `0` is the unbounded sentinel.
    pub fn from_secs(secs: u64) -> Self {
        match NonZeroU64::new(secs) {
            Some(n) => RecordDuration::Bounded(n),
            None => RecordDuration::Unbounded,
        }
    }

    pub fn as_duration(self) -> Option<std::time::Duration> {
        match self {
            RecordDuration::Unbounded => None,
            RecordDuration::Bounded(n) => Some(std::time::Duration::from_secs(n.get())),
        }
    }
}

impl Default for RecordDuration {
    fn default() -> Self {
        RecordDuration::Unbounded
    }
}

/// Configuration for a video recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordConfig {
    pub settings: DeviceSettings,
    /// Frames per second, always positive.
    pub framerate: u32,
    pub format: VideoFormat,
    pub duration: RecordDuration,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            settings: DeviceSettings::default(),
            framerate: 30,
            format: VideoFormat::default(),
            duration: RecordDuration::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_iso() {
        assert_eq!(nearest_iso(400), 400);
        assert_eq!(nearest_iso(0), 100);
        assert_eq!(nearest_iso(-50), 100);
        assert_eq!(nearest_iso(350), 320);
        assert_eq!(nearest_iso(575), 640);
        assert_eq!(nearest_iso(10_000), 800);
        assert_eq!(nearest_iso(i64::MIN), 100);
        assert_eq!(nearest_iso(i64::MAX), 800);
    }

    #[test]
    fn test_resolution_round_trip_and_limits() {
        let r: Resolution = "1296x730".parse().unwrap();
        assert_eq!(r, Resolution::R1296x730);
        assert_eq!(r.max_framerate(), 49);
        assert_eq!(r.dimensions(), (1296, 730));
        assert!("1024x768".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_format_sets_differ() {
        assert!(StillFormat::parse("png").is_some());
        assert!(VideoFormat::parse("png").is_none());
        assert!(VideoFormat::parse("H264").is_some());
        assert!(StillFormat::parse("h264").is_none());
    }

    #[test]
    fn test_zero_duration_is_unbounded() {
        assert_eq!(RecordDuration::from_secs(0), RecordDuration::Unbounded);
        assert_eq!(
            RecordDuration::from_secs(2).as_duration(),
            Some(std::time::Duration::from_secs(2))
        );
    }
}
