//! Streaming cursor over a targeted source query.

use super::{GranuleFilter, SourceStore};
use crate::error::Result;
use std::collections::VecDeque;
use std::sync::Arc;

/// Pull-based cursor over a secondary-index query.
///
/// `peek` returns the next record without consuming it; `shift` consumes
/// and advances. Both return `None` once the query is exhausted. Pages are
/// prefetched on demand, one at a time.
pub struct SearchQueue {
    source: Arc<dyn SourceStore>,
    filter: GranuleFilter,
    buffer: VecDeque<serde_json::Value>,
    next_key: Option<String>,
    exhausted: bool,
}

impl SearchQueue {
    pub fn new(source: Arc<dyn SourceStore>, filter: GranuleFilter) -> Self {
        Self {
            source,
            filter,
            buffer: VecDeque::new(),
            next_key: None,
            exhausted: false,
        }
    }

    /// Return the next record without consuming it.
    pub async fn peek(&mut self) -> Result<Option<&serde_json::Value>> {
        self.fill().await?;
        Ok(self.buffer.front())
    }

    /// Consume and return the next record.
    pub async fn shift(&mut self) -> Result<Option<serde_json::Value>> {
        self.fill().await?;
        Ok(self.buffer.pop_front())
    }

    /// Fetch pages until a record is buffered or the query is exhausted.
    /// Empty pages mid-stream are skipped over.
    async fn fill(&mut self) -> Result<()> {
        while self.buffer.is_empty() && !self.exhausted {
            let page = self
                .source
                .query_page(&self.filter, self.next_key.take())
                .await?;
            self.next_key = page.last_evaluated_key;
            self.buffer.extend(page.items);
            if self.next_key.is_none() {
                self.exhausted = true;
            }
        }
        Ok(())
    }
}
