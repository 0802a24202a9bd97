//! Artifact file names.

use chrono::{DateTime, Utc};

/// Prefix shared by every artifact.
pub const ARTIFACT_PREFIX: &str = "pi_";

/// Builds `pi_<timestamp>.<extension>`.
///
/// The timestamp is ISO 8601 basic format in UTC with microseconds, which
/// keeps the name free of `:` and sortable.
pub fn artifact_name(at: DateTime<Utc>, extension: &str) -> String {
    format!(
        "{ARTIFACT_PREFIX}{}.{extension}",
        at.format("%Y%m%dT%H%M%S%.6fZ")
    )
}

/// Name used when `base` is already taken: `pi_<ts>_<n>.<ext>`.
pub fn disambiguated(base: &str, attempt: u32) -> String {
    match base.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{attempt}.{ext}"),
        None => format!("{base}_{attempt}"),
    }
}
