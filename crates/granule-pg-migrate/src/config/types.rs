//! Migration parameter definitions.

use serde::{Deserialize, Serialize};

/// Parameters controlling a granule/file migration run.
///
/// Field names match the parameter object the migration is invoked with,
/// so the struct deserializes directly from the caller's JSON payload.
/// The two mode flags are strings ("true"/"false", case-insensitive) for
/// compatibility with the source system's parameter conventions; they are
/// normalized into a [`MigrationMode`](super::MigrationMode) before any
/// record is processed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GranuleMigrationParams {
    /// Unconditionally overwrite existing target rows ("true"/"false").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_and_overwrite: Option<String>,

    /// Only sync file rows against already-migrated granules ("true"/"false").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_only_files: Option<String>,

    /// Emit a progress log line every this many granules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging_interval: Option<usize>,

    /// Maximum record migrations in flight at once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_concurrency: Option<usize>,

    /// Number of disjoint segments for the full parallel scan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_scan_segments: Option<usize>,

    /// Page size bound for each scan segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_scan_limit: Option<usize>,

    /// Restrict the run to a single granule (targeted query mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granule_id: Option<String>,

    /// Restrict the run to a single collection (targeted query mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
}

impl GranuleMigrationParams {
    // Accessor methods that return the effective value (with fallback defaults).

    pub fn get_logging_interval(&self) -> usize {
        self.logging_interval.unwrap_or(100)
    }

    pub fn get_write_concurrency(&self) -> usize {
        self.write_concurrency.unwrap_or(10)
    }

    pub fn get_parallel_scan_segments(&self) -> usize {
        self.parallel_scan_segments.unwrap_or(20)
    }
}

/// Normalized migration mode.
///
/// Collapses the `migrateAndOverwrite`/`migrateOnlyFiles` flag pair into one
/// explicit three-valued mode, validated once up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationMode {
    /// Upsert with skip-if-not-newer conflict resolution.
    #[default]
    Migrate,

    /// Unconditionally write, ignoring existing target recency.
    Overwrite,

    /// Do not write granule fields; sync files against the existing row.
    FilesOnly,
}
