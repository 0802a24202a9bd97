//! Raw request parameters and their validation.
//!
//! The HTTP layer hands over query values as plain strings. Validation is
//! pure and all-or-nothing: either a complete [`CaptureConfig`] /
//! [`RecordConfig`] comes back, or the first offending field is reported and
//! nothing reaches the device.

use super::config::{
    CaptureConfig, DeviceSettings, RecordConfig, RecordDuration, Resolution, StillFormat,
    VideoFormat, STILL_RESOLUTIONS, VIDEO_RESOLUTIONS,
};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Which operation a set of parameters is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Capture,
    Record,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Capture => f.write_str("capture"),
            OperationKind::Record => f.write_str("record"),
        }
    }
}

/// Parameter validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported resolution '{value}' for {kind}")]
    UnknownResolution { value: String, kind: OperationKind },
    #[error("unsupported file type '{value}' for {kind}")]
    UnsupportedFormat { value: String, kind: OperationKind },
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("{field} is not a valid {expected}: '{value}'")]
    Malformed {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Query parameters of `POST /capture/picture`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCaptureParams {
    pub resolution: Option<String>,
    #[serde(alias = "iso")]
    pub iso_index: Option<String>,
    #[serde(alias = "useVideoPort")]
    pub use_fast_port: Option<String>,
    pub brightness: Option<String>,
    pub contrast: Option<String>,
    pub led: Option<String>,
    pub file_type: Option<String>,
}

/// Query parameters of `POST /record/video`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecordParams {
    pub resolution: Option<String>,
    pub framerate: Option<String>,
    #[serde(alias = "iso")]
    pub iso_index: Option<String>,
    pub brightness: Option<String>,
    pub contrast: Option<String>,
    pub led: Option<String>,
    pub file_type: Option<String>,
    pub duration: Option<String>,
}

impl RawCaptureParams {
    /// Validates into a still-picture configuration.
    pub fn validate(&self) -> Result<CaptureConfig, ValidationError> {
        let kind = OperationKind::Capture;
        let settings = device_settings(
            kind,
            &STILL_RESOLUTIONS,
            self.resolution.as_deref(),
            self.iso_index.as_deref(),
            self.brightness.as_deref(),
            self.contrast.as_deref(),
            self.led.as_deref(),
        )?;

        let format = match present(self.file_type.as_deref()) {
            None => StillFormat::default(),
            Some(raw) => StillFormat::parse(raw).ok_or_else(|| {
                ValidationError::UnsupportedFormat {
                    value: raw.to_string(),
                    kind,
                }
            })?,
        };

        let use_fast_port = match present(self.use_fast_port.as_deref()) {
            None => false,
            Some(raw) => parse_bool("useFastPort", raw)?,
        };

        Ok(CaptureConfig {
            settings,
            format,
            use_fast_port,
        })
    }
}

impl RawRecordParams {
    /// Validates into a recording configuration.
    pub fn validate(&self) -> Result<RecordConfig, ValidationError> {
        let kind = OperationKind::Record;
        let settings = device_settings(
            kind,
            &VIDEO_RESOLUTIONS,
            self.resolution.as_deref(),
            self.iso_index.as_deref(),
            self.brightness.as_deref(),
            self.contrast.as_deref(),
            self.led.as_deref(),
        )?;

        let framerate = match present(self.framerate.as_deref()) {
            None => 30,
            Some(raw) => {
                let value = parse_int("framerate", raw)?;
                bounded("framerate", value, 1, u32::MAX as i64)? as u32
            }
        };

        let format = match present(self.file_type.as_deref()) {
            None => VideoFormat::default(),
            Some(raw) => VideoFormat::parse(raw).ok_or_else(|| {
                ValidationError::UnsupportedFormat {
                    value: raw.to_string(),
                    kind,
                }
            })?,
        };

        let duration = match present(self.duration.as_deref()) {
            None => RecordDuration::Unbounded,
            Some(raw) => {
                let value = parse_int("duration", raw)?;
                RecordDuration::from_secs(bounded("duration", value, 0, i64::MAX)? as u64)
            }
        };

        Ok(RecordConfig {
            settings,
            framerate,
            format,
            duration,
        })
    }
}

fn device_settings(
    kind: OperationKind,
    allowed: &[Resolution],
    resolution: Option<&str>,
    iso: Option<&str>,
    brightness: Option<&str>,
    contrast: Option<&str>,
    led: Option<&str>,
) -> Result<DeviceSettings, ValidationError> {
    let defaults = DeviceSettings::default();

    let resolution = match present(resolution) {
        None => defaults.resolution,
        Some(raw) => raw
            .parse::<Resolution>()
            .ok()
            .filter(|r| allowed.contains(r))
            .ok_or_else(|| ValidationError::UnknownResolution {
                value: raw.to_string(),
                kind,
            })?,
    };

    // Any integer is accepted; the driver picks the nearest supported ISO.
    let iso = match present(iso) {
        None => defaults.iso,
        Some(raw) => parse_int("isoIndex", raw)?,
    };

    let brightness = match present(brightness) {
        None => defaults.brightness,
        Some(raw) => bounded("brightness", parse_int("brightness", raw)?, 0, 100)? as u8,
    };

    let contrast = match present(contrast) {
        None => defaults.contrast,
        Some(raw) => bounded("contrast", parse_int("contrast", raw)?, -100, 100)? as i8,
    };

    let led = match present(led) {
        None => defaults.led,
        Some(raw) => parse_bool("led", raw)?,
    };

    Ok(DeviceSettings {
        resolution,
        iso,
        brightness,
        contrast,
        led,
    })
}

/// Treats empty query values as absent.
fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_int(field: &'static str, raw: &str) -> Result<i64, ValidationError> {
    raw.parse::<i64>().map_err(|_| ValidationError::Malformed {
        field,
        value: raw.to_string(),
        expected: "integer",
    })
}

fn parse_bool(field: &'static str, raw: &str) -> Result<bool, ValidationError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ValidationError::Malformed {
            field,
            value: raw.to_string(),
            expected: "boolean",
        }),
    }
}

fn bounded(field: &'static str, value: i64, min: i64, max: i64) -> Result<i64, ValidationError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
