//! Artifact sinks: the files captures and recordings are written into.

use super::naming::{artifact_name, disambiguated};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// How many `_n` suffixes to try before giving up on a name.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Errors from creating or committing an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("cannot write artifact {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
    #[error("artifact {name} is empty")]
    Empty { name: String },
}

impl SinkError {
    fn io(path: &Path, err: io::Error) -> Self {
        SinkError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// A committed artifact, now owned by the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// File name, `pi_<timestamp>.<ext>`.
    pub name: String,
    /// Full path of the file.
    pub path: PathBuf,
    /// Size in bytes.
    pub bytes: u64,
}

/// Directory artifacts are created in.
#[derive(Debug, Clone)]
pub struct OutputDirectory {
    root: PathBuf,
}

impl OutputDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a new, empty artifact named after the current time.
    pub fn open(&self, extension: &str) -> Result<ArtifactSink, SinkError> {
        self.open_at(Utc::now(), extension)
    }

    /// Creates a new artifact for an operation started at `at`.
    ///
    /// Never overwrites: a taken name gets a numeric suffix.
    pub fn open_at(&self, at: DateTime<Utc>, extension: &str) -> Result<ArtifactSink, SinkError> {
        let base = artifact_name(at, extension);
        let mut name = base.clone();
        let mut attempt = 0;
        loop {
            let path = self.root.join(&name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    tracing::debug!(artifact = %name, "Artifact opened");
                    return Ok(ArtifactSink {
                        name,
                        path,
                        writer: SinkWriter(Arc::new(Mutex::new(Counting {
                            inner: BufWriter::new(file),
                            bytes: 0,
                        }))),
                        committed: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    attempt += 1;
                    name = disambiguated(&base, attempt);
                }
                Err(e) => return Err(SinkError::io(&path, e)),
            }
        }
    }
}

struct Counting {
    inner: BufWriter<File>,
    bytes: u64,
}

/// Cloneable writer into an artifact; all clones share one file.
#[derive(Clone)]
pub struct SinkWriter(Arc<Mutex<Counting>>);

impl SinkWriter {
    fn lock(&self) -> io::Result<MutexGuard<'_, Counting>> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "artifact writer poisoned"))
    }
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock()?;
        let n = state.inner.write(buf)?;
        state.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.inner.flush()
    }
}

/// An artifact being written.
///
/// Owned by the session until [`ArtifactSink::commit`]. Dropping an
/// uncommitted sink deletes the file.
pub struct ArtifactSink {
    name: String,
    path: PathBuf,
    writer: SinkWriter,
    committed: bool,
}

impl ArtifactSink {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A writer for the device; clones write to the same file.
    pub fn writer(&self) -> SinkWriter {
        self.writer.clone()
    }

    /// Flushes, syncs and hands the file over to the filesystem.
    ///
    /// An empty artifact is deleted and reported as [`SinkError::Empty`].
    pub fn commit(mut self) -> Result<Artifact, SinkError> {
        let bytes = {
            let mut state = self.writer.lock().map_err(|e| SinkError::io(&self.path, e))?;
            state
                .inner
                .flush()
                .and_then(|_| state.inner.get_ref().sync_all())
                .map_err(|e| SinkError::io(&self.path, e))?;
            state.bytes
        };
        if bytes == 0 {
            return Err(SinkError::Empty {
                name: self.name.clone(),
            });
        }

        self.committed = true;
        tracing::info!(artifact = %self.name, bytes, "Artifact committed");
        Ok(Artifact {
            name: self.name.clone(),
            path: self.path.clone(),
            bytes,
        })
    }

    /// Deletes the file.
    pub fn discard(self) {
        tracing::debug!(artifact = %self.name, "Artifact discarded");
    }
}

impl Drop for ArtifactSink {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(artifact = %self.name, error = %e, "Failed to remove artifact");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_commit_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputDirectory::new(dir.path());
        let sink = output.open("jpeg").unwrap();
        assert!(sink.name().starts_with("pi_"));
        assert!(sink.name().ends_with(".jpeg"));

        let mut writer = sink.writer();
        writer.write_all(b"picture").unwrap();
        let artifact = sink.commit().unwrap();

        assert_eq!(artifact.bytes, 7);
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"picture");
    }

    #[test]
    fn test_uncommitted_sink_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputDirectory::new(dir.path());
        let sink = output.open("h264").unwrap();
        let path = sink.path().to_path_buf();
        assert!(path.exists());
        sink.discard();
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_commit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputDirectory::new(dir.path());
        let sink = output.open("png").unwrap();
        let path = sink.path().to_path_buf();
        assert!(matches!(sink.commit(), Err(SinkError::Empty { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn test_same_timestamp_gets_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputDirectory::new(dir.path());
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let first = output.open_at(at, "jpeg").unwrap();
        let second = output.open_at(at, "jpeg").unwrap();
        assert_ne!(first.name(), second.name());
        assert_eq!(second.name(), "pi_20260102T030405.000000Z_1.jpeg");
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let output = OutputDirectory::new("/nonexistent/picam/output");
        assert!(matches!(output.open("jpeg"), Err(SinkError::Io { .. })));
    }
}
