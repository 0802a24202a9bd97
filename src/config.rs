//! Service configuration.
//!
//! Loaded from an optional TOML file; every section and field has a
//! default, and command-line flags override what the file says.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for the camera acquire wait.
pub const MAX_ACQUIRE_TIMEOUT_MS: u64 = 10_000;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("output directory does not exist: {}", .0.display())]
    MissingOutputDir(PathBuf),
    #[error("acquire timeout {0} ms exceeds the 10000 ms limit")]
    AcquireTimeoutTooLong(u64),
    #[error("camera backend '{0}' is not available in this build")]
    BackendUnavailable(String),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 6060).into(),
        }
    }
}

/// Where artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

/// Which camera implementation to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Synthetic output, no hardware needed.
    #[default]
    Mock,
    /// Real device through the `camera` feature.
    Native,
}

/// Camera device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub backend: Backend,
    /// Camera device index for the native backend.
    pub device_index: u32,
    /// How long a request may wait for a busy camera; 0 fails fast.
    pub acquire_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Mock,
            device_index: 0,
            acquire_timeout_ms: 0,
        }
    }
}

impl CameraConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins if set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.output.directory.is_dir() {
            return Err(ConfigError::MissingOutputDir(self.output.directory.clone()));
        }
        if self.camera.acquire_timeout_ms > MAX_ACQUIRE_TIMEOUT_MS {
            return Err(ConfigError::AcquireTimeoutTooLong(
                self.camera.acquire_timeout_ms,
            ));
        }
        if self.camera.backend == Backend::Native && !cfg!(feature = "camera") {
            return Err(ConfigError::BackendUnavailable("native".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_addr.port(), 6060);
        assert_eq!(config.camera.acquire_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [camera]
            acquire_timeout_ms = 250

            [logging]
            filter = "picam=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.acquire_timeout_ms, 250);
        assert_eq!(config.camera.backend, Backend::Mock);
        assert_eq!(config.logging.filter, "picam=debug");
        assert_eq!(config.output.directory, PathBuf::from("."));
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(matches!(
            FileConfig::from_toml("[cameras]\nbackend = \"mock\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_timeout_cap() {
        let mut config = FileConfig::default();
        config.camera.acquire_timeout_ms = MAX_ACQUIRE_TIMEOUT_MS + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::AcquireTimeoutTooLong(_))
        ));
    }

    #[test]
    fn test_missing_output_dir() {
        let mut config = FileConfig::default();
        config.output.directory = PathBuf::from("/nonexistent/picam");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingOutputDir(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picam.toml");
        std::fs::write(&path, "[server]\nbind_addr = \"127.0.0.1:8080\"\n").unwrap();
        let config = FileConfig::from_file(&path).unwrap();
        assert_eq!(config.server.bind_addr.port(), 8080);

        assert!(matches!(
            FileConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::FileReadError(_))
        ));
    }
}
