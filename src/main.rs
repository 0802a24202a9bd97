//! Pi Cam HTTP server
//!
//! Serves the camera over HTTP until interrupted with Ctrl-C. A running
//! recording is committed before the process exits.

use clap::Parser;
use picam::{
    capture::{CameraDriver, CameraGate, MockDriver},
    config::{Backend, ConfigError, FileConfig},
    metrics::MetricsRegistry,
    output::OutputDirectory,
    server::ApiServer,
    session::CameraService,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "picam-server", version, about = "Single-camera capture and recording service")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:6060.
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Directory pictures and recordings are written to.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Camera backend: mock or native.
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Camera device index for the native backend.
    #[arg(long)]
    device_index: Option<u32>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum BackendArg {
    Mock,
    Native,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Mock => Backend::Mock,
            BackendArg::Native => Backend::Native,
        }
    }
}

fn load_config(args: &Args) -> Result<FileConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if let Some(dir) = &args.output_dir {
        config.output.directory = dir.clone();
    }
    if let Some(backend) = args.backend {
        config.camera.backend = backend.into();
    }
    if let Some(index) = args.device_index {
        config.camera.device_index = index;
    }
    config.validate()?;
    Ok(config)
}

fn driver(config: &FileConfig) -> Arc<dyn CameraDriver> {
    match config.camera.backend {
        #[cfg(feature = "camera")]
        Backend::Native => Arc::new(picam::capture::NativeDriver::new(config.camera.device_index)),
        // Rejected by validation when the feature is off.
        #[cfg(not(feature = "camera"))]
        Backend::Native => Arc::new(MockDriver::new()),
        Backend::Mock => Arc::new(MockDriver::new()),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured filter.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Pi Cam v{}", picam::VERSION);

    let metrics = match MetricsRegistry::new() {
        Ok(m) => Arc::new(m),
        Err(e) => {
            error!("Failed to create metrics registry: {}", e);
            std::process::exit(1);
        }
    };

    let driver = driver(&config);
    info!(
        backend = driver.name(),
        output = %config.output.directory.display(),
        acquire_timeout_ms = config.camera.acquire_timeout_ms,
        "Camera configured"
    );
    let gate = CameraGate::with_timeout(driver, config.camera.acquire_timeout());
    let service = Arc::new(CameraService::new(
        gate,
        OutputDirectory::new(&config.output.directory),
        metrics,
    ));

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || signal.notify_one()) {
        error!("Failed to set Ctrl-C handler: {}", e);
        std::process::exit(1);
    }

    let server = ApiServer::new(config.server.bind_addr, service);
    let result = server
        .run(async move {
            shutdown.notified().await;
            info!("Shutdown signal received");
        })
        .await;

    if let Err(e) = result {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
    info!("Done.");
}
