//! End-to-end tests of the HTTP surface against the mock camera.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use picam::{
    capture::{CameraGate, MockDriver, MockFaults},
    metrics::MetricsRegistry,
    output::OutputDirectory,
    router, CameraService,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

struct Harness {
    app: Router,
    driver: Arc<MockDriver>,
    dir: tempfile::TempDir,
}

fn harness(faults: MockFaults) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(MockDriver::with_faults(faults));
    let service = CameraService::new(
        CameraGate::new(driver.clone()),
        OutputDirectory::new(dir.path()),
        Arc::new(MetricsRegistry::new().unwrap()),
    );
    Harness {
        app: router(Arc::new(service)),
        driver,
        dir,
    }
}

async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn artifacts(dir: &tempfile::TempDir) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

#[tokio::test]
async fn capture_picture_writes_named_artifact() {
    let h = harness(MockFaults::default());
    let (status, body) = call(
        &h.app,
        "POST",
        "/capture/picture?resolution=1920x1080&fileType=jpeg",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let name = body.strip_prefix("OK, ").unwrap();
    assert!(name.starts_with("pi_"));
    assert!(name.ends_with(".jpeg"));

    let path = h.dir.path().join(name);
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
    assert_eq!(h.driver.stats().live(), 0);
}

#[tokio::test]
async fn out_of_range_contrast_never_opens_camera() {
    let h = harness(MockFaults::default());
    let (status, body) = call(&h.app, "POST", "/capture/picture?contrast=500").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("NOK: "));
    assert!(body.contains("contrast"));
    assert_eq!(h.driver.stats().opened(), 0);
    assert!(artifacts(&h.dir).is_empty());
}

#[tokio::test]
async fn unknown_resolution_is_rejected() {
    let h = harness(MockFaults::default());
    let (status, _) = call(&h.app, "POST", "/record/video?resolution=800x600").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.driver.stats().opened(), 0);
}

#[tokio::test]
async fn unparseable_query_is_reported_as_nok() {
    let h = harness(MockFaults::default());
    let (status, body) = call(
        &h.app,
        "POST",
        "/capture/picture?brightness=1&brightness=2",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("NOK: invalid parameter"), "{body}");

    let (status, body) = call(&h.app, "POST", "/record/video?duration=1&duration=2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("NOK: invalid parameter"), "{body}");
    assert_eq!(h.driver.stats().opened(), 0);
    assert!(artifacts(&h.dir).is_empty());
}

#[tokio::test]
async fn status_is_not_recording_when_idle() {
    let h = harness(MockFaults::default());
    let (status, body) = call(&h.app, "GET", "/status/record/video").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Not Recording");
}

#[tokio::test]
async fn bounded_recording_reports_recording_meanwhile() {
    let h = harness(MockFaults::default());
    let recorder = {
        let app = h.app.clone();
        tokio::spawn(async move {
            call(&app, "POST", "/record/video?duration=1&fileType=h264").await
        })
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let (_, body) = call(&h.app, "GET", "/status/record/video").await;
        if body == "Recording" {
            break;
        }
        assert!(Instant::now() < deadline, "recording never reported");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let (status, body) = recorder.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("OK, pi_"));
    assert!(body.ends_with(".h264"));

    let (_, body) = call(&h.app, "GET", "/status/record/video").await;
    assert_eq!(body, "Not Recording");
    assert_eq!(artifacts(&h.dir).len(), 1);
    assert_eq!(h.driver.stats().live(), 0);
}

#[tokio::test]
async fn unbounded_recording_until_stop() {
    let h = harness(MockFaults::default());
    let (status, body) = call(&h.app, "POST", "/record/video?duration=0").await;
    assert_eq!(status, StatusCode::OK);
    let name = body
        .strip_prefix("OK, recording started: ")
        .unwrap()
        .to_string();

    let (status, body) = call(&h.app, "POST", "/capture/picture").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "NOK: camera is busy");

    tokio::time::sleep(Duration::from_millis(200)).await;
    let (status, body) = call(&h.app, "POST", "/record/video/stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, format!("OK, {name}"));
    assert!(std::fs::metadata(h.dir.path().join(&name)).unwrap().len() > 0);
}

#[tokio::test]
async fn stop_without_recording_is_rejected() {
    let h = harness(MockFaults::default());
    let (status, body) = call(&h.app, "POST", "/record/video/stop").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("NOK: invalid state"));
}

#[tokio::test]
async fn device_fault_is_reported_and_camera_released() {
    let h = harness(MockFaults {
        capture: true,
        ..Default::default()
    });
    let (status, body) = call(&h.app, "POST", "/capture/picture").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("NOK: device error"));
    assert!(artifacts(&h.dir).is_empty());
    assert_eq!(h.driver.stats().live(), 0);

    h.driver.set_faults(MockFaults::default());
    let (status, _) = call(&h.app, "POST", "/capture/picture").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn root_redirects_to_docs() {
    let h = harness(MockFaults::default());
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/apidocs");

    let (status, body) = call(&h.app, "GET", "/apidocs").await;
    assert_eq!(status, StatusCode::OK);
    let docs: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(docs["title"], "Pi Cam");
}

#[tokio::test]
async fn metrics_count_requests() {
    let h = harness(MockFaults::default());
    call(&h.app, "POST", "/capture/picture").await;
    call(&h.app, "POST", "/capture/picture?brightness=abc").await;

    let (status, body) = call(&h.app, "GET", "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("picam_captures_total 1"));
    assert!(body.contains("picam_validation_failures_total 1"));

    let (status, body) = call(&h.app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}
