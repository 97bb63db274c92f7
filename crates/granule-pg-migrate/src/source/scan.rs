//! Parallel segment scan of the source keyspace.

use super::SourceStore;
use crate::error::{MigrateError, Result};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Scan the whole keyspace, sending each fetched page to `tx`.
///
/// One task per segment pages through its disjoint partition, so every
/// record is visited exactly once across the run. Pages from different
/// segments interleave on the channel in completion order. The first
/// backend error is fatal: it is returned to the caller once all segment
/// tasks have wound down, while pages already sent may still be consumed.
pub async fn parallel_scan(
    source: Arc<dyn SourceStore>,
    total_segments: usize,
    limit: Option<usize>,
    tx: mpsc::Sender<Vec<serde_json::Value>>,
) -> Result<()> {
    let mut handles = Vec::with_capacity(total_segments);

    for segment in 0..total_segments {
        let source = source.clone();
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            let mut start_key: Option<String> = None;
            let mut pages = 0usize;

            loop {
                let page = source
                    .scan_page(segment, total_segments, limit, start_key.take())
                    .await?;
                let next_key = page.last_evaluated_key;

                if !page.items.is_empty() {
                    pages += 1;
                    if tx.send(page.items).await.is_err() {
                        // Consumer hung up; nothing left to deliver to.
                        return Ok(());
                    }
                }

                match next_key {
                    Some(key) => start_key = Some(key),
                    None => break,
                }
            }

            debug!("Scan segment {} exhausted after {} pages", segment, pages);
            Ok::<(), MigrateError>(())
        }));
    }
    drop(tx);

    let mut first_error = None;
    for result in join_all(handles).await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(e) => {
                if first_error.is_none() {
                    first_error =
                        Some(MigrateError::Source(format!("Scan task panicked: {}", e)));
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
