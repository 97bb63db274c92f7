//! Target store interface and row types.

pub mod postgres;

pub use postgres::{PgStore, PgStoreConfig};

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Relational granule row, keyed naturally by
/// `(granule_id, collection_cumulus_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGranuleRecord {
    pub granule_id: String,
    pub status: String,
    pub collection_cumulus_id: i64,
    pub provider_cumulus_id: Option<i64>,
    pub pdr_cumulus_id: Option<i64>,
    pub execution_cumulus_id: Option<i64>,
    pub published: Option<bool>,
    pub duration: Option<f64>,
    pub time_to_archive: Option<f64>,
    pub time_to_process: Option<f64>,
    pub product_volume: Option<String>,
    pub error: Option<serde_json::Value>,
    pub query_fields: Option<serde_json::Value>,
    pub cmr_link: Option<String>,
    pub beginning_date_time: Option<DateTime<Utc>>,
    pub ending_date_time: Option<DateTime<Utc>>,
    pub last_update_date_time: Option<DateTime<Utc>>,
    pub processing_start_date_time: Option<DateTime<Utc>>,
    pub processing_end_date_time: Option<DateTime<Utc>>,
    pub production_date_time: Option<DateTime<Utc>>,
    pub timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Relational file row, keyed naturally by `(bucket, key)`.
/// `granule_cumulus_id` is assigned by the store at write time.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFileRecord {
    pub bucket: String,
    pub key: String,
    pub file_size: Option<i64>,
    pub file_name: Option<String>,
    pub checksum_value: Option<String>,
    pub checksum_type: Option<String>,
    pub source: Option<String>,
    pub path: Option<String>,
    pub file_type: Option<String>,
}

/// The slice of an existing granule row that conflict resolution needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredGranule {
    pub cumulus_id: i64,
    pub updated_at: DateTime<Utc>,
}

/// Result of a transactional granule write.
#[derive(Debug, Clone)]
pub struct GranuleWrite {
    pub cumulus_id: i64,

    /// File rows actually written (drives the migrated-files counter).
    pub files: Vec<TargetFileRecord>,
}

/// Relational target store.
///
/// `write_granule` and `sync_files` are each one atomic transaction: on any
/// error the transaction rolls back and no partial granule/file state is
/// ever visible. The granule upsert relies on the store's unique constraint
/// on the natural key for correctness under concurrent writers.
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn collection_cumulus_id(&self, name: &str, version: &str) -> Result<Option<i64>>;

    async fn provider_cumulus_id(&self, name: &str) -> Result<Option<i64>>;

    async fn pdr_cumulus_id(&self, name: &str) -> Result<Option<i64>>;

    async fn execution_cumulus_id(&self, url: &str) -> Result<Option<i64>>;

    /// Look up an existing granule row by natural key.
    async fn find_granule(
        &self,
        granule_id: &str,
        collection_cumulus_id: i64,
    ) -> Result<Option<StoredGranule>>;

    /// Upsert the granule and its files, then delete every existing file
    /// row for the granule whose `(bucket, key)` is not among the
    /// just-written set. A granule upsert affecting zero rows fails with
    /// [`MigrateError::UpsertRejected`](crate::MigrateError::UpsertRejected).
    ///
    /// When `overwrite` is false the upsert carries a recency guard
    /// (`updated_at <= excluded.updated_at`) so a racing writer cannot
    /// regress a newer row.
    async fn write_granule(
        &self,
        granule: &TargetGranuleRecord,
        files: &[TargetFileRecord],
        overwrite: bool,
    ) -> Result<GranuleWrite>;

    /// Files-only write: upsert and reconcile file rows against an existing
    /// granule without touching granule fields.
    async fn sync_files(
        &self,
        granule_cumulus_id: i64,
        files: &[TargetFileRecord],
    ) -> Result<Vec<TargetFileRecord>>;
}
