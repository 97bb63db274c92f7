//! Migration run driver and batch coordinator.
//!
//! [`GranuleMigration`] validates the parameters, selects the scan mode,
//! fans record migrations out under the write-concurrency bound, folds
//! outcomes into the summary, and flushes the error report. A single
//! record's failure never stops the remaining records or the run.

use crate::config::{GranuleMigrationParams, MigrationMode};
use crate::error::{MigrateError, Result};
use crate::migrate::RecordMigrator;
use crate::report::{ErrorReportConfig, ErrorReporter};
use crate::source::{scan, GranuleFilter, SearchQueue, SourceGranuleRecord, SourceStore};
use crate::summary::{AppliedFilters, GranuleOutcome, MigrationSummary};
use crate::target::TargetStore;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

/// Interval progress logging over the running granule total.
struct ProgressLog {
    interval: usize,
    total: usize,
}

impl ProgressLog {
    fn new(interval: usize) -> Self {
        Self { interval, total: 0 }
    }

    fn bump(&mut self) {
        self.total += 1;
        if self.total % self.interval == 0 {
            info!(
                "Batch of {} granule records processed, {} total",
                self.interval, self.total
            );
        }
    }
}

/// Granule/file migration run.
pub struct GranuleMigration {
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    params: GranuleMigrationParams,
    mode: MigrationMode,
}

impl GranuleMigration {
    /// Create a new run. The parameter combination is validated here, so an
    /// invalid mode is rejected before any record is processed.
    pub fn new(
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
        params: GranuleMigrationParams,
    ) -> Result<Self> {
        let mode = params.validate()?;
        Ok(Self {
            source,
            target,
            params,
            mode,
        })
    }

    /// Run the migration to completion and return the summary.
    ///
    /// Per-record failures are counted and written to the error report,
    /// never returned as `Err`; only configuration, scan-layer, and
    /// report-flush errors surface here.
    pub async fn run(&self, report: &ErrorReportConfig) -> Result<MigrationSummary> {
        info!("Starting granule/file migration (mode: {:?})", self.mode);

        let mut summary = MigrationSummary::default();
        let mut reporter = ErrorReporter::new();
        let mut progress = ProgressLog::new(self.params.get_logging_interval());
        let semaphore = Arc::new(Semaphore::new(self.params.get_write_concurrency()));

        let filter = self.filter();
        let outcome = match &filter {
            Some(f) => {
                self.run_query(f, &semaphore, &mut summary, &mut reporter, &mut progress)
                    .await
            }
            None => {
                self.run_scan(&semaphore, &mut summary, &mut reporter, &mut progress)
                    .await
            }
        };

        if let Some(f) = filter {
            summary.set_filters(AppliedFilters {
                granule_id: f.granule_id,
                collection_id: f.collection_id,
            });
        }

        // Flush before surfacing a scan failure so errors recorded up to
        // that point are not lost.
        reporter.flush(report)?;
        outcome?;

        info!(
            "Successfully migrated {} granule records",
            summary.granules_result.migrated
        );
        info!(
            "Successfully migrated {} file records",
            summary.files_result.migrated
        );
        Ok(summary)
    }

    fn filter(&self) -> Option<GranuleFilter> {
        let filter = GranuleFilter {
            granule_id: self.params.granule_id.clone(),
            collection_id: self.params.collection_id.clone(),
        };
        if filter.is_empty() {
            None
        } else {
            Some(filter)
        }
    }

    /// Full scan: segments feed pages into a channel, each page is handed
    /// to the coordinator as one batch.
    async fn run_scan(
        &self,
        semaphore: &Arc<Semaphore>,
        summary: &mut MigrationSummary,
        reporter: &mut ErrorReporter,
        progress: &mut ProgressLog,
    ) -> Result<()> {
        let segments = self.params.get_parallel_scan_segments();
        let (tx, mut rx) = mpsc::channel(segments);

        let scan_handle = tokio::spawn(scan::parallel_scan(
            self.source.clone(),
            segments,
            self.params.parallel_scan_limit,
            tx,
        ));

        while let Some(batch) = rx.recv().await {
            self.process_batch(batch, semaphore, summary, reporter, progress)
                .await;
        }

        match scan_handle.await {
            Ok(result) => result,
            Err(e) => Err(MigrateError::Source(format!(
                "Scan driver task panicked: {}",
                e
            ))),
        }
    }

    /// Targeted query: drain the peek/shift cursor into concurrency-sized
    /// batches.
    async fn run_query(
        &self,
        filter: &GranuleFilter,
        semaphore: &Arc<Semaphore>,
        summary: &mut MigrationSummary,
        reporter: &mut ErrorReporter,
        progress: &mut ProgressLog,
    ) -> Result<()> {
        let mut queue = SearchQueue::new(self.source.clone(), filter.clone());
        let batch_size = self.params.get_write_concurrency();

        loop {
            let mut batch = Vec::with_capacity(batch_size);
            while batch.len() < batch_size {
                match queue.shift().await? {
                    Some(item) => batch.push(item),
                    None => break,
                }
            }
            if batch.is_empty() {
                return Ok(());
            }
            self.process_batch(batch, semaphore, summary, reporter, progress)
                .await;
        }
    }

    /// Fan one batch out under the concurrency bound and fold the outcomes.
    async fn process_batch(
        &self,
        items: Vec<serde_json::Value>,
        semaphore: &Arc<Semaphore>,
        summary: &mut MigrationSummary,
        reporter: &mut ErrorReporter,
        progress: &mut ProgressLog,
    ) {
        let migrator = RecordMigrator::new(self.target.clone(), self.mode);
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let granule_id = item
                .get("granuleId")
                .and_then(|v| v.as_str())
                .unwrap_or("<unknown>")
                .to_string();

            // Boundary validation: malformed items are quarantined as
            // failed records here instead of reaching the migrator.
            let record = match SourceGranuleRecord::from_item(item) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed source record {}: {}", granule_id, e);
                    summary.merge_outcome(&GranuleOutcome::Failed, 0);
                    reporter.record(&granule_id, &e);
                    progress.bump();
                    continue;
                }
            };

            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let migrator = migrator.clone();
            let file_count = record.file_count();

            handles.push(tokio::spawn(async move {
                let result = migrator.migrate(&record).await;
                drop(permit);
                (record.granule_id, file_count, result)
            }));
        }

        for handle in handles {
            match handle.await {
                Ok((_, file_count, Ok(migrated))) => {
                    summary.merge_outcome(
                        &GranuleOutcome::Migrated {
                            files_written: migrated.files.len(),
                        },
                        file_count,
                    );
                }
                Ok((_, file_count, Err(e @ MigrateError::AlreadyMigrated { .. }))) => {
                    info!("{}", e);
                    summary.merge_outcome(&GranuleOutcome::Skipped, file_count);
                }
                Ok((granule_id, file_count, Err(e))) => {
                    error!(
                        "Could not create granule record in RDS for Dynamo Granule \
                         granuleId: {}: {}",
                        granule_id, e
                    );
                    summary.merge_outcome(&GranuleOutcome::Failed, file_count);
                    reporter.record(&granule_id, &e);
                }
                Err(e) => {
                    error!("Record migration task panicked: {}", e);
                    summary.merge_outcome(&GranuleOutcome::Failed, 0);
                    reporter.record(
                        "<unknown>",
                        &MigrateError::Source(format!("Migration task panicked: {}", e)),
                    );
                }
            }
            progress.bump();
        }
    }
}
