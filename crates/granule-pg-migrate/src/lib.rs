//! # granule-pg-migrate
//!
//! Migration engine for moving granule and file records from a paged
//! key-value store into PostgreSQL while the relational store becomes the
//! system of record. Supports:
//!
//! - **Parallel scans** over disjoint keyspace segments, or targeted
//!   secondary-index queries by granule or collection
//! - **Bounded write concurrency** for record migrations
//! - **Transactional writes**: a granule and its files land atomically,
//!   with stale file rows reconciled away
//! - **Idempotent re-runs** via skip-if-not-newer conflict resolution
//! - **Partial-failure isolation**: one bad record never stops the run;
//!   failures are counted and persisted to a JSON error report
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use granule_pg_migrate::{
//!     ErrorReportConfig, GranuleMigration, GranuleMigrationParams, PgStore, PgStoreConfig,
//! };
//! # use granule_pg_migrate::SourceStore;
//! # async fn example(source: Arc<dyn SourceStore>) -> granule_pg_migrate::Result<()> {
//! let target = Arc::new(
//!     PgStore::new(
//!         &PgStoreConfig {
//!             host: "localhost".into(),
//!             port: 5432,
//!             database: "cumulus".into(),
//!             user: "postgres".into(),
//!             password: "password".into(),
//!         },
//!         10,
//!     )
//!     .await?,
//! );
//!
//! let params = GranuleMigrationParams::from_json(r#"{ "writeConcurrency": 10 }"#)?;
//! let migration = GranuleMigration::new(source, target, params)?;
//! let report = ErrorReportConfig::new("/var/artifacts", "my-stack");
//! let summary = migration.run(&report).await?;
//! println!("{}", summary.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod migrate;
pub mod orchestrator;
pub mod report;
pub mod source;
pub mod summary;
pub mod target;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports for convenient access
pub use config::{GranuleMigrationParams, MigrationMode};
pub use error::{MigrateError, Result};
pub use migrate::{MigratedGranule, RecordMigrator};
pub use orchestrator::GranuleMigration;
pub use report::{ErrorReportConfig, ErrorReporter, MIGRATION_NAME};
pub use source::{
    GranuleFilter, SearchQueue, SourceFileRecord, SourceGranuleRecord, SourcePage, SourceStore,
};
pub use summary::{AppliedFilters, GranuleOutcome, MigrationResult, MigrationSummary};
pub use target::{
    GranuleWrite, PgStore, PgStoreConfig, StoredGranule, TargetFileRecord, TargetGranuleRecord,
    TargetStore,
};
