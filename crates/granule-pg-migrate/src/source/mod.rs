//! Source store interface.
//!
//! The source is a paged key-value store traversed either by a full
//! parallel scan over disjoint segments or by a targeted secondary-index
//! query. Pages carry raw JSON items; typing and validation happen once, at
//! this boundary, in [`record`].

mod queue;
mod record;
pub mod scan;

pub use queue::SearchQueue;
pub use record::{DateValue, SourceFileRecord, SourceGranuleRecord};

use crate::error::Result;
use async_trait::async_trait;

/// Filter for a targeted secondary-index query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GranuleFilter {
    pub granule_id: Option<String>,
    pub collection_id: Option<String>,
}

impl GranuleFilter {
    pub fn is_empty(&self) -> bool {
        self.granule_id.is_none() && self.collection_id.is_none()
    }
}

/// One page of raw source items plus the continuation key.
///
/// A `None` continuation key marks the end of the segment or query.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub items: Vec<serde_json::Value>,
    pub last_evaluated_key: Option<String>,
}

/// Paged access to the source store.
///
/// Backend errors propagate to the caller and are fatal to the run; any
/// retrying is the backend client's concern.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Fetch one page of segment `segment` (0-based) out of `total_segments`
    /// disjoint partitions of the keyspace. `limit` bounds the page size.
    async fn scan_page(
        &self,
        segment: usize,
        total_segments: usize,
        limit: Option<usize>,
        start_key: Option<String>,
    ) -> Result<SourcePage>;

    /// Fetch one page of a targeted secondary-index query.
    async fn query_page(
        &self,
        filter: &GranuleFilter,
        start_key: Option<String>,
    ) -> Result<SourcePage>;
}
