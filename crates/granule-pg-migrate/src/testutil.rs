//! In-memory source and target fakes shared across test modules.
//!
//! Both honor the same contracts the production implementations do: the
//! target fake applies the recency guard and file reconciliation, the
//! source fake partitions its items into disjoint segments and pages
//! through them with continuation keys.

use crate::error::{MigrateError, Result};
use crate::source::{GranuleFilter, SourcePage, SourceStore};
use crate::target::{
    GranuleWrite, StoredGranule, TargetFileRecord, TargetGranuleRecord, TargetStore,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// Build a minimal valid source granule item.
pub fn granule_item(
    granule_id: &str,
    collection_id: &str,
    updated_at_ms: i64,
    files: &[Value],
) -> Value {
    json!({
        "granuleId": granule_id,
        "collectionId": collection_id,
        "status": "completed",
        "createdAt": updated_at_ms - 1000,
        "updatedAt": updated_at_ms,
        "files": files,
    })
}

/// In-memory paged source store.
pub struct MemSource {
    items: Vec<Value>,
    page_size: usize,
    fail_segment: Option<usize>,
}

impl MemSource {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items,
            page_size: 2,
            fail_segment: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every fetch on the given segment fail, to exercise the
    /// fatal-scan-error path.
    pub fn failing_on_segment(mut self, segment: usize) -> Self {
        self.fail_segment = Some(segment);
        self
    }

    fn page_of<'a>(
        &self,
        selected: &[&'a Value],
        limit: Option<usize>,
        start_key: Option<String>,
    ) -> SourcePage {
        let offset: usize = start_key
            .as_deref()
            .and_then(|k| k.parse().ok())
            .unwrap_or(0);
        let size = limit.unwrap_or(self.page_size).max(1);

        let items: Vec<Value> = selected
            .iter()
            .skip(offset)
            .take(size)
            .map(|v| (*v).clone())
            .collect();
        let next = offset + items.len();
        let last_evaluated_key = if next < selected.len() {
            Some(next.to_string())
        } else {
            None
        };

        SourcePage {
            items,
            last_evaluated_key,
        }
    }
}

#[async_trait]
impl SourceStore for MemSource {
    async fn scan_page(
        &self,
        segment: usize,
        total_segments: usize,
        limit: Option<usize>,
        start_key: Option<String>,
    ) -> Result<SourcePage> {
        if self.fail_segment == Some(segment) {
            return Err(MigrateError::Source(format!(
                "scan failed on segment {}",
                segment
            )));
        }

        // Items are partitioned round-robin so segments are disjoint.
        let selected: Vec<&Value> = self
            .items
            .iter()
            .enumerate()
            .filter(|(i, _)| i % total_segments == segment)
            .map(|(_, v)| v)
            .collect();
        Ok(self.page_of(&selected, limit, start_key))
    }

    async fn query_page(
        &self,
        filter: &GranuleFilter,
        start_key: Option<String>,
    ) -> Result<SourcePage> {
        let selected: Vec<&Value> = self
            .items
            .iter()
            .filter(|v| {
                filter
                    .granule_id
                    .as_deref()
                    .map_or(true, |g| v["granuleId"] == g)
                    && filter
                        .collection_id
                        .as_deref()
                        .map_or(true, |c| v["collectionId"] == c)
            })
            .collect();
        Ok(self.page_of(&selected, None, start_key))
    }
}

/// One stored granule row plus its surrogate id.
#[derive(Debug, Clone)]
pub struct MemGranuleRow {
    pub cumulus_id: i64,
    pub record: TargetGranuleRecord,
}

impl MemGranuleRow {
    pub fn updated_at_millis(&self) -> i64 {
        self.record.updated_at.timestamp_millis()
    }
}

#[derive(Default)]
struct MemInner {
    collections: HashMap<(String, String), i64>,
    providers: HashMap<String, i64>,
    pdrs: HashMap<String, i64>,
    executions: HashMap<String, i64>,
    granules: HashMap<(String, i64), MemGranuleRow>,
    files: HashMap<(String, String), (i64, TargetFileRecord)>,
    next_id: i64,
}

impl MemInner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn upsert_and_reconcile_files(
        &mut self,
        granule_cumulus_id: i64,
        files: &[TargetFileRecord],
    ) -> Vec<TargetFileRecord> {
        for f in files {
            self.files.insert(
                (f.bucket.clone(), f.key.clone()),
                (granule_cumulus_id, f.clone()),
            );
        }
        let keep: Vec<(String, String)> = files
            .iter()
            .map(|f| (f.bucket.clone(), f.key.clone()))
            .collect();
        self.files
            .retain(|key, (owner, _)| *owner != granule_cumulus_id || keep.contains(key));
        files.to_vec()
    }
}

/// In-memory relational target store.
pub struct MemStore {
    inner: Mutex<MemInner>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemInner::default()),
        }
    }

    pub fn add_collection(&self, name: &str, version: &str) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner
            .collections
            .insert((name.to_string(), version.to_string()), id);
        id
    }

    pub fn add_provider(&self, name: &str) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.providers.insert(name.to_string(), id);
        id
    }

    pub fn add_pdr(&self, name: &str) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.pdrs.insert(name.to_string(), id);
        id
    }

    pub fn add_execution(&self, url: &str) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.executions.insert(url.to_string(), id);
        id
    }

    pub fn granule_count(&self) -> usize {
        self.inner.lock().unwrap().granules.len()
    }

    pub fn file_count(&self) -> usize {
        self.inner.lock().unwrap().files.len()
    }

    pub fn stored_granule(&self, cumulus_id: i64) -> MemGranuleRow {
        self.inner
            .lock()
            .unwrap()
            .granules
            .values()
            .find(|row| row.cumulus_id == cumulus_id)
            .cloned()
            .unwrap()
    }

    pub fn files_for(&self, granule_cumulus_id: i64) -> Vec<TargetFileRecord> {
        self.inner
            .lock()
            .unwrap()
            .files
            .values()
            .filter(|(owner, _)| *owner == granule_cumulus_id)
            .map(|(_, f)| f.clone())
            .collect()
    }

    /// Simulate an out-of-band writer bumping a granule's `updated_at`.
    pub fn bump_updated_at(&self, granule_id: &str, updated_at_ms: i64) {
        let mut inner = self.inner.lock().unwrap();
        for row in inner.granules.values_mut() {
            if row.record.granule_id == granule_id {
                row.record.updated_at =
                    Utc.timestamp_millis_opt(updated_at_ms).single().unwrap();
            }
        }
    }
}

#[async_trait]
impl TargetStore for MemStore {
    async fn collection_cumulus_id(&self, name: &str, version: &str) -> Result<Option<i64>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .collections
            .get(&(name.to_string(), version.to_string()))
            .copied())
    }

    async fn provider_cumulus_id(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.inner.lock().unwrap().providers.get(name).copied())
    }

    async fn pdr_cumulus_id(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.inner.lock().unwrap().pdrs.get(name).copied())
    }

    async fn execution_cumulus_id(&self, url: &str) -> Result<Option<i64>> {
        Ok(self.inner.lock().unwrap().executions.get(url).copied())
    }

    async fn find_granule(
        &self,
        granule_id: &str,
        collection_cumulus_id: i64,
    ) -> Result<Option<StoredGranule>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .granules
            .get(&(granule_id.to_string(), collection_cumulus_id))
            .map(|row| StoredGranule {
                cumulus_id: row.cumulus_id,
                updated_at: row.record.updated_at,
            }))
    }

    async fn write_granule(
        &self,
        granule: &TargetGranuleRecord,
        files: &[TargetFileRecord],
        overwrite: bool,
    ) -> Result<GranuleWrite> {
        let mut inner = self.inner.lock().unwrap();
        let key = (granule.granule_id.clone(), granule.collection_cumulus_id);

        let cumulus_id = match inner.granules.get_mut(&key) {
            Some(row) => {
                // Same guard the SQL upsert carries: the update only lands
                // when the incoming row is at least as new.
                if !overwrite && row.record.updated_at > granule.updated_at {
                    return Err(MigrateError::UpsertRejected {
                        granule_id: granule.granule_id.clone(),
                    });
                }
                row.record = granule.clone();
                row.cumulus_id
            }
            None => {
                let id = inner.next_id();
                inner.granules.insert(
                    key,
                    MemGranuleRow {
                        cumulus_id: id,
                        record: granule.clone(),
                    },
                );
                id
            }
        };

        let written = inner.upsert_and_reconcile_files(cumulus_id, files);
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
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.upsert_and_reconcile_files(granule_cumulus_id, files))
    }
}
