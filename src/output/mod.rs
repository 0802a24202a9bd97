//! Artifact naming and output sinks.
//!
//! Every capture or recording writes into exactly one artifact file named
//! `pi_<timestamp>.<extension>`. The sink is created before the camera is
//! acquired, and removes its file again unless it is committed.

mod naming;
mod sink;

pub use naming::{artifact_name, ARTIFACT_PREFIX};
pub use sink::{Artifact, ArtifactSink, OutputDirectory, SinkError, SinkWriter};
