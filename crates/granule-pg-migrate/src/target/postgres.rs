//! PostgreSQL target store.

use super::{GranuleWrite, StoredGranule, TargetFileRecord, TargetGranuleRecord, TargetStore};
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{types::ToSql, Config as PgConfig, NoTls, Transaction};
use tracing::{debug, info};

/// Connection settings for the target database.
#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

const GRANULE_COLUMNS: &str = "granule_id, status, collection_cumulus_id, provider_cumulus_id, \
     pdr_cumulus_id, execution_cumulus_id, published, duration, time_to_archive, \
     time_to_process, product_volume, error, query_fields, cmr_link, beginning_date_time, \
     ending_date_time, last_update_date_time, processing_start_date_time, \
     processing_end_date_time, production_date_time, timestamp, created_at, updated_at";

const GRANULE_UPDATE_SET: &str = "status = EXCLUDED.status, \
     provider_cumulus_id = EXCLUDED.provider_cumulus_id, \
     pdr_cumulus_id = EXCLUDED.pdr_cumulus_id, \
     execution_cumulus_id = EXCLUDED.execution_cumulus_id, \
     published = EXCLUDED.published, duration = EXCLUDED.duration, \
     time_to_archive = EXCLUDED.time_to_archive, time_to_process = EXCLUDED.time_to_process, \
     product_volume = EXCLUDED.product_volume, error = EXCLUDED.error, \
     query_fields = EXCLUDED.query_fields, cmr_link = EXCLUDED.cmr_link, \
     beginning_date_time = EXCLUDED.beginning_date_time, \
     ending_date_time = EXCLUDED.ending_date_time, \
     last_update_date_time = EXCLUDED.last_update_date_time, \
     processing_start_date_time = EXCLUDED.processing_start_date_time, \
     processing_end_date_time = EXCLUDED.processing_end_date_time, \
     production_date_time = EXCLUDED.production_date_time, \
     timestamp = EXCLUDED.timestamp, created_at = EXCLUDED.created_at, \
     updated_at = EXCLUDED.updated_at";

const FILE_UPSERT: &str = "INSERT INTO files (granule_cumulus_id, bucket, key, file_size, \
     file_name, checksum_value, checksum_type, source, path, type) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
     ON CONFLICT (bucket, key) DO UPDATE SET \
     granule_cumulus_id = EXCLUDED.granule_cumulus_id, file_size = EXCLUDED.file_size, \
     file_name = EXCLUDED.file_name, checksum_value = EXCLUDED.checksum_value, \
     checksum_type = EXCLUDED.checksum_type, source = EXCLUDED.source, \
     path = EXCLUDED.path, type = EXCLUDED.type";

/// Build the granule upsert statement, optionally guarded on recency.
fn granule_upsert_sql(guard_recency: bool) -> String {
    let placeholders: Vec<String> = (1..=23).map(|i| format!("${}", i)).collect();
    let guard = if guard_recency {
        " WHERE granules.updated_at <= EXCLUDED.updated_at"
    } else {
        ""
    };
    format!(
        "INSERT INTO granules ({}) VALUES ({}) \
         ON CONFLICT (granule_id, collection_cumulus_id) DO UPDATE SET {}{} \
         RETURNING cumulus_id",
        GRANULE_COLUMNS,
        placeholders.join(", "),
        GRANULE_UPDATE_SET,
        guard
    )
}

/// Build the reconciliation delete: every file row of the granule whose
/// `(bucket, key)` is not among the `kept` just-written pairs.
fn file_delete_sql(kept: usize) -> String {
    let mut sql = String::from("DELETE FROM files WHERE granule_cumulus_id = $1");
    if kept > 0 {
        sql.push_str(" AND (bucket, key) NOT IN (");
        for i in 0..kept {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("(${}, ${})", 2 * i + 2, 2 * i + 3));
        }
        sql.push(')');
    }
    sql
}

fn granule_params(g: &TargetGranuleRecord) -> Vec<&(dyn ToSql + Sync)> {
    vec![
        &g.granule_id,
        &g.status,
        &g.collection_cumulus_id,
        &g.provider_cumulus_id,
        &g.pdr_cumulus_id,
        &g.execution_cumulus_id,
        &g.published,
        &g.duration,
        &g.time_to_archive,
        &g.time_to_process,
        &g.product_volume,
        &g.error,
        &g.query_fields,
        &g.cmr_link,
        &g.beginning_date_time,
        &g.ending_date_time,
        &g.last_update_date_time,
        &g.processing_start_date_time,
        &g.processing_end_date_time,
        &g.production_date_time,
        &g.timestamp,
        &g.created_at,
        &g.updated_at,
    ]
}

/// PostgreSQL target store backed by a deadpool-managed connection pool.
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Create a new store and verify connectivity.
    pub async fn new(config: &PgStoreConfig, max_conns: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(max_conns)
            .build()
            .map_err(|e| MigrateError::Pool(format!("Failed to create pool: {}", e)))?;

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::Pool(format!("Failed to get connection: {}", e)))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }

    async fn lookup_id(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<i64>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::Pool(e.to_string()))?;
        let row = client.query_opt(sql, params).await?;
        Ok(row.map(|r| r.get(0)))
    }

    /// Upsert the given file rows for a granule, then delete every other
    /// file row still attached to it.
    async fn upsert_and_reconcile_files(
        tx: &Transaction<'_>,
        granule_cumulus_id: i64,
        files: &[TargetFileRecord],
    ) -> Result<Vec<TargetFileRecord>> {
        for f in files {
            tx.execute(
                FILE_UPSERT,
                &[
                    &granule_cumulus_id,
                    &f.bucket,
                    &f.key,
                    &f.file_size,
                    &f.file_name,
                    &f.checksum_value,
                    &f.checksum_type,
                    &f.source,
                    &f.path,
                    &f.file_type,
                ],
            )
            .await?;
        }

        let sql = file_delete_sql(files.len());
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&granule_cumulus_id];
        for f in files {
            params.push(&f.bucket);
            params.push(&f.key);
        }
        let deleted = tx.execute(&sql, &params).await?;
        if deleted > 0 {
            debug!(
                "Reconciled {} stale file rows for granule {}",
                deleted, granule_cumulus_id
            );
        }

        Ok(files.to_vec())
    }
}

#[async_trait]
impl TargetStore for PgStore {
    async fn collection_cumulus_id(&self, name: &str, version: &str) -> Result<Option<i64>> {
        self.lookup_id(
            "SELECT cumulus_id FROM collections WHERE name = $1 AND version = $2",
            &[&name, &version],
        )
        .await
    }

    async fn provider_cumulus_id(&self, name: &str) -> Result<Option<i64>> {
        self.lookup_id("SELECT cumulus_id FROM providers WHERE name = $1", &[&name])
            .await
    }

    async fn pdr_cumulus_id(&self, name: &str) -> Result<Option<i64>> {
        self.lookup_id("SELECT cumulus_id FROM pdrs WHERE name = $1", &[&name])
            .await
    }

    async fn execution_cumulus_id(&self, url: &str) -> Result<Option<i64>> {
        self.lookup_id("SELECT cumulus_id FROM executions WHERE url = $1", &[&url])
            .await
    }

    async fn find_granule(
        &self,
        granule_id: &str,
        collection_cumulus_id: i64,
    ) -> Result<Option<StoredGranule>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::Pool(e.to_string()))?;
        let row = client
            .query_opt(
                "SELECT cumulus_id, updated_at FROM granules \
                 WHERE granule_id = $1 AND collection_cumulus_id = $2",
                &[&granule_id, &collection_cumulus_id],
            )
            .await?;
        Ok(row.map(|r| StoredGranule {
            cumulus_id: r.get(0),
            updated_at: r.get(1),
        }))
    }

    async fn write_granule(
        &self,
        granule: &TargetGranuleRecord,
        files: &[TargetFileRecord],
        overwrite: bool,
    ) -> Result<GranuleWrite> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::Pool(e.to_string()))?;
        let tx = client.transaction().await?;

        let sql = granule_upsert_sql(!overwrite);
        let row = tx.query_opt(&sql, &granule_params(granule)).await?;
        let cumulus_id: i64 = match row {
            Some(r) => r.get(0),
            // Dropping the transaction rolls it back.
            None => {
                return Err(MigrateError::UpsertRejected {
                    granule_id: granule.granule_id.clone(),
                })
            }
        };

        let written = Self::upsert_and_reconcile_files(&tx, cumulus_id, files).await?;
        tx.commit().await?;

        Ok(GranuleWrite {
            cumulus_id,
            files: written,
        })
    }

    async fn sync_files(
        &self,
        granule_cumulus_id: i64,
        files: &[TargetFileRecord],
    ) -> Result<Vec<TargetFileRecord>> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::Pool(e.to_string()))?;
        let tx = client.transaction().await?;

        let written = Self::upsert_and_reconcile_files(&tx, granule_cumulus_id, files).await?;
        tx.commit().await?;

        Ok(written)
    }
}
