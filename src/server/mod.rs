//! HTTP front end of the camera service.
//!
//! Every route is a thin adapter over [`CameraService`]: it extracts the
//! query parameters, calls one service operation and renders the result as
//! `OK, ...` text. Failures render through
//! [`ServiceError`](crate::error::ServiceError) as `400 NOK: <cause>`.

mod docs;
mod routes;

use crate::session::CameraService;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use docs::describe;

/// Errors that can occur while serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// Builds the router with every camera endpoint.
pub fn router(service: Arc<CameraService>) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/apidocs", get(docs::api_docs))
        .route("/capture/picture", post(routes::capture_picture))
        .route("/record/video", post(routes::record_video))
        .route("/record/video/stop", post(routes::stop_recording))
        .route("/status/record/video", get(routes::recording_status))
        .route("/metrics", get(routes::metrics))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// HTTP server owning the camera service.
pub struct ApiServer {
    bind_addr: SocketAddr,
    service: Arc<CameraService>,
}

impl ApiServer {
    pub fn new(bind_addr: SocketAddr, service: Arc<CameraService>) -> Self {
        Self { bind_addr, service }
    }

    pub fn service(&self) -> Arc<CameraService> {
        Arc::clone(&self.service)
    }

    /// Serves until `shutdown` resolves.
    ///
    /// In-flight requests are drained first, then a running recording is
    /// stopped so its artifact is committed before the camera is closed.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(Arc::clone(&self.service));
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!(
            addr = %self.bind_addr,
            driver = self.service.gate().driver_name(),
            "Camera API listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        self.service.shutdown().await;
        tracing::info!("Camera API stopped");
        Ok(())
    }
}
