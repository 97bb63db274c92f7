//! Migration result counters and outcome folding.

use serde::{Deserialize, Serialize};

/// Applied-filter descriptor, reported when a targeted query was used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granule_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
}

/// Counters for one record category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Source records seen.
    pub total: u64,

    /// Records written to the target store.
    pub migrated: u64,

    /// Records skipped because the target was already up to date.
    pub skipped: u64,

    /// Records that failed to migrate.
    pub failed: u64,

    /// Filters applied by the scanner (granule group only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<AppliedFilters>,
}

/// Summary of a granule/file migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub granules_result: MigrationResult,
    pub files_result: MigrationResult,
}

/// Terminal disposition of one granule record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GranuleOutcome {
    /// The granule (or, in files-only mode, its files) was written.
    Migrated { files_written: usize },

    /// An existing target row was same-age-or-newer.
    Skipped,

    /// The record failed; the cause goes to the error reporter.
    Failed,
}

impl MigrationSummary {
    /// Merge one completed record outcome into the counters.
    ///
    /// File counters move by the source record's file count, except
    /// `migrated`, which counts file rows actually written.
    pub fn merge_outcome(&mut self, outcome: &GranuleOutcome, source_file_count: usize) {
        self.granules_result.total += 1;
        self.files_result.total += source_file_count as u64;

        match outcome {
            GranuleOutcome::Migrated { files_written } => {
                self.granules_result.migrated += 1;
                self.files_result.migrated += *files_written as u64;
            }
            GranuleOutcome::Skipped => {
                self.granules_result.skipped += 1;
                self.files_result.skipped += source_file_count as u64;
            }
            GranuleOutcome::Failed => {
                self.granules_result.failed += 1;
                self.files_result.failed += source_file_count as u64;
            }
        }
    }

    /// Record the filters a targeted query applied.
    pub fn set_filters(&mut self, filters: AppliedFilters) {
        self.granules_result.filters = Some(filters);
    }

    /// Convert to a pretty JSON string.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
