//! Durable error reporting for failed records.
//!
//! Failures are buffered in memory for the duration of the run and persisted
//! once, at the end, as a single JSON artifact: `{ "errors": [...] }`. The
//! artifact location is deterministic, derived from the stack name, the
//! migration name, and a run timestamp.

use crate::error::{MigrateError, Result};
use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Name under which this migration writes its error artifact.
pub const MIGRATION_NAME: &str = "data-migration2-granulesAndFiles";

/// Destination of the error artifact.
///
/// `root` is the local artifact root standing in for the object store; the
/// client that uploads from it is an external collaborator.
#[derive(Debug, Clone)]
pub struct ErrorReportConfig {
    /// Artifact root directory.
    pub root: PathBuf,

    /// Stack name, the first path component of the object key.
    pub stack_name: String,

    /// Run timestamp. Defaults to epoch millis at flush time when unset;
    /// callers pin it for deterministic keys.
    pub timestamp: Option<String>,
}

impl ErrorReportConfig {
    pub fn new(root: impl Into<PathBuf>, stack_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            stack_name: stack_name.into(),
            timestamp: None,
        }
    }

    /// Pin the run timestamp used in the object key.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Object key of the artifact: `{stack}/{migration}-errors-{timestamp}.json`.
    pub fn object_key(&self, timestamp: &str) -> String {
        format!(
            "{}/{}-errors-{}.json",
            self.stack_name, MIGRATION_NAME, timestamp
        )
    }
}

/// Append-only buffer of per-record failure descriptions.
pub struct ErrorReporter {
    errors: Vec<String>,
    flushed: bool,
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            flushed: false,
        }
    }

    /// Record one failed granule record.
    pub fn record(&mut self, granule_id: &str, cause: &MigrateError) {
        self.errors.push(format!(
            "Could not create granule record in RDS for Dynamo Granule granuleId: {}: {}",
            granule_id, cause
        ));
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Persist the buffer as one JSON artifact (atomic write).
    ///
    /// Idempotent: the first call writes and returns the artifact path,
    /// later calls are no-ops. The artifact is written even when no record
    /// failed, so a run always leaves a report behind.
    pub fn flush(&mut self, config: &ErrorReportConfig) -> Result<Option<PathBuf>> {
        if self.flushed {
            return Ok(None);
        }

        let timestamp = config
            .timestamp
            .clone()
            .unwrap_or_else(|| Utc::now().timestamp_millis().to_string());
        let path = config.root.join(config.object_key(&timestamp));

        let body = serde_json::to_string_pretty(&json!({ "errors": self.errors }))?;
        write_atomic(&path, &body)?;

        self.flushed = true;
        tracing::info!(
            "Wrote error report with {} entries to {}",
            self.errors.len(),
            path.display()
        );
        Ok(Some(path))
    }
}

/// Atomic write: write to a temp file, then rename into place.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}
