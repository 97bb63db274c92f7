//! Per-record migration engine.
//!
//! One [`RecordMigrator::migrate`] call moves exactly one source granule
//! (plus its files) through resolve → conflict-check → transactional write.
//! Terminal outcomes: written, skipped (already migrated), or failed; the
//! coordinator folds them into the run summary.

pub mod translate;

pub use translate::ResolvedRefs;

use crate::config::MigrationMode;
use crate::error::{MigrateError, Result};
use crate::source::SourceGranuleRecord;
use crate::target::{TargetFileRecord, TargetStore};
use std::sync::Arc;
use tracing::warn;

/// Result of a successful record migration.
#[derive(Debug, Clone)]
pub struct MigratedGranule {
    pub cumulus_id: i64,

    /// File rows actually written for this granule.
    pub files: Vec<TargetFileRecord>,
}

/// Migrates one source granule record at a time under a fixed mode.
#[derive(Clone)]
pub struct RecordMigrator {
    store: Arc<dyn TargetStore>,
    mode: MigrationMode,
}

impl RecordMigrator {
    pub fn new(store: Arc<dyn TargetStore>, mode: MigrationMode) -> Self {
        Self { store, mode }
    }

    /// Migrate one granule and its files.
    ///
    /// Collection, provider, and PDR references are hard dependencies: a
    /// missing row fails the record. The execution reference is best-effort:
    /// a missing row is logged and the granule proceeds unlinked.
    ///
    /// Returns [`MigrateError::AlreadyMigrated`] when the existing target
    /// row is same-age-or-newer (counted as a skip, not a failure).
    pub async fn migrate(&self, record: &SourceGranuleRecord) -> Result<MigratedGranule> {
        let (name, version) = record.collection_name_version()?;
        let collection_cumulus_id = self
            .store
            .collection_cumulus_id(name, version)
            .await?
            .ok_or_else(|| MigrateError::MissingDependency {
                table: "collections".into(),
                key: record.collection_id.clone(),
            })?;

        let provider_cumulus_id = match &record.provider {
            Some(provider) => Some(
                self.store
                    .provider_cumulus_id(provider)
                    .await?
                    .ok_or_else(|| MigrateError::MissingDependency {
                        table: "providers".into(),
                        key: provider.clone(),
                    })?,
            ),
            None => None,
        };

        let pdr_cumulus_id = match &record.pdr_name {
            Some(pdr_name) => Some(
                self.store
                    .pdr_cumulus_id(pdr_name)
                    .await?
                    .ok_or_else(|| MigrateError::MissingDependency {
                        table: "pdrs".into(),
                        key: pdr_name.clone(),
                    })?,
            ),
            None => None,
        };

        let execution_cumulus_id = match &record.execution {
            Some(url) => {
                let id = self.store.execution_cumulus_id(url).await?;
                if id.is_none() {
                    warn!(
                        "Granule {} referenced execution {} which does not exist, \
                         migrating without execution linkage",
                        record.granule_id, url
                    );
                }
                id
            }
            None => None,
        };

        let files = record
            .files()
            .iter()
            .map(translate::translate_file)
            .collect::<Result<Vec<_>>>()?;

        if self.mode != MigrationMode::Overwrite {
            let existing = self
                .store
                .find_granule(&record.granule_id, collection_cumulus_id)
                .await?;

            match (self.mode, existing) {
                (MigrationMode::FilesOnly, None) => {
                    return Err(MigrateError::GranuleNotFound {
                        granule_id: record.granule_id.clone(),
                    });
                }
                (MigrationMode::FilesOnly, Some(existing)) => {
                    // Granule fields are left untouched; only the file set
                    // is synced against the existing row.
                    let written = self.store.sync_files(existing.cumulus_id, &files).await?;
                    return Ok(MigratedGranule {
                        cumulus_id: existing.cumulus_id,
                        files: written,
                    });
                }
                (_, Some(existing))
                    if existing.updated_at >= record.updated_at_datetime() =>
                {
                    return Err(MigrateError::AlreadyMigrated {
                        granule_id: record.granule_id.clone(),
                    });
                }
                _ => {}
            }
        }

        let granule = translate::translate_granule(
            record,
            &ResolvedRefs {
                collection_cumulus_id,
                provider_cumulus_id,
                pdr_cumulus_id,
                execution_cumulus_id,
            },
        );

        let write = self
            .store
            .write_granule(&granule, &files, self.mode == MigrationMode::Overwrite)
            .await?;

        Ok(MigratedGranule {
            cumulus_id: write.cumulus_id,
            files: write.files,
        })
    }
}
