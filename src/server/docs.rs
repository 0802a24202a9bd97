//! Machine-readable API description served at `/apidocs`.

use crate::capture::{
    DeviceSettings, Resolution, StillFormat, VideoFormat, STILL_RESOLUTIONS, SUPPORTED_ISO,
    VIDEO_RESOLUTIONS,
};
use axum::Json;
use serde_json::{json, Value};

pub(super) async fn api_docs() -> Json<Value> {
    Json(describe())
}

fn names(resolutions: &[Resolution]) -> Vec<&'static str> {
    resolutions.iter().map(|r| r.as_str()).collect()
}

/// Describes every endpoint with its parameters, defaults and allowed values.
pub fn describe() -> Value {
    let defaults = DeviceSettings::default();
    let framerate_limits: Vec<String> = VIDEO_RESOLUTIONS
        .iter()
        .map(|r| format!("{} up to {} fps", r.as_str(), r.max_framerate()))
        .collect();

    let common = |resolutions: &[Resolution]| {
        json!([
            {
                "name": "resolution",
                "type": "string",
                "default": defaults.resolution.as_str(),
                "enum": names(resolutions),
            },
            {
                "name": "isoIndex",
                "type": "integer",
                "default": defaults.iso,
                "description": "Snapped to the nearest supported value",
                "supported": SUPPORTED_ISO,
            },
            {
                "name": "brightness",
                "type": "integer",
                "default": defaults.brightness,
                "minimum": 0,
                "maximum": 100,
            },
            {
                "name": "contrast",
                "type": "integer",
                "default": defaults.contrast,
                "minimum": -100,
                "maximum": 100,
            },
            {
                "name": "led",
                "type": "boolean",
                "default": defaults.led,
            },
        ])
    };

    let mut capture_params = common(&STILL_RESOLUTIONS);
    if let Some(list) = capture_params.as_array_mut() {
        list.push(json!({
            "name": "useFastPort",
            "type": "boolean",
            "default": false,
            "description": "Capture through the video port: faster, lower quality",
        }));
        list.push(json!({
            "name": "fileType",
            "type": "string",
            "default": StillFormat::default().extension(),
            "enum": StillFormat::ALL.iter().map(|f| f.extension()).collect::<Vec<_>>(),
        }));
    }

    let mut record_params = common(&VIDEO_RESOLUTIONS);
    if let Some(list) = record_params.as_array_mut() {
        list.push(json!({
            "name": "framerate",
            "type": "integer",
            "default": 30,
            "description": framerate_limits.join(", "),
        }));
        list.push(json!({
            "name": "fileType",
            "type": "string",
            "default": VideoFormat::default().extension(),
            "enum": VideoFormat::ALL.iter().map(|f| f.extension()).collect::<Vec<_>>(),
        }));
        list.push(json!({
            "name": "duration",
            "type": "integer",
            "default": 0,
            "minimum": 0,
            "description": "Seconds to record; 0 records until /record/video/stop",
        }));
    }

    json!({
        "title": "Pi Cam",
        "version": crate::VERSION,
        "endpoints": [
            {
                "path": "/capture/picture",
                "method": "POST",
                "summary": "Take a picture",
                "parameters": capture_params,
                "responses": { "200": "OK, <file name>", "400": "NOK: <cause>" },
            },
            {
                "path": "/record/video",
                "method": "POST",
                "summary": "Record a video",
                "parameters": record_params,
                "responses": {
                    "200": "OK, <file name> or OK, recording started: <file name>",
                    "400": "NOK: <cause>",
                },
            },
            {
                "path": "/record/video/stop",
                "method": "POST",
                "summary": "Stop the running recording",
                "responses": { "200": "OK, <file name>", "400": "NOK: <cause>" },
            },
            {
                "path": "/status/record/video",
                "method": "GET",
                "summary": "Whether a recording is in progress",
                "responses": { "200": "Recording | Not Recording", "400": "NOK: <cause>" },
            },
            {
                "path": "/metrics",
                "method": "GET",
                "summary": "Prometheus metrics",
            },
            {
                "path": "/health",
                "method": "GET",
                "summary": "Liveness probe",
            },
        ],
    })
}
