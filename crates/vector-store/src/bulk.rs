//! Batched, concurrent point upload.
//!
//! Points are cut into fixed-size batches; up to `parallel` upsert requests
//! are in flight at once. Transient failures are retried per batch with
//! exponential backoff. Completion order across batches is unspecified.

use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use futures::stream::{Stream, TryChunksError, TryStreamExt};
use tracing::{debug, error, warn};

use vector_types::Point;

use crate::error::StoreError;
use crate::store::VectorStore;

/// Batching parameters.
#[derive(Debug, Clone)]
pub struct BulkOptions {
    /// Points per upsert request
    pub batch_size: usize,

    /// Requests in flight at once
    pub parallel: usize,

    /// Retries per batch on transient errors
    pub max_retries: u32,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            batch_size: 512,
            parallel: 1,
            max_retries: 3,
        }
    }
}

/// What an upload wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub batches: u64,
    pub points: u64,
}

/// Upload a stream of points.
///
/// The first error, whether from the input stream or from a batch that ran out
/// of retries, stops the upload; batches already written stay written.
pub async fn upload_points<S, E>(
    store: &dyn VectorStore,
    collection: &str,
    points: S,
    options: &BulkOptions,
) -> Result<BulkSummary, E>
where
    S: Stream<Item = Result<Point, E>>,
    E: From<StoreError>,
{
    let batch_size = options.batch_size.max(1);
    let parallel = options.parallel.max(1);
    let max_retries = options.max_retries;

    points
        .try_chunks(batch_size)
        .map_err(|TryChunksError(_, e)| e)
        .map_ok(move |batch| async move {
            upsert_with_retry(store, collection, &batch, max_retries)
                .await
                .map_err(E::from)?;
            Ok::<u64, E>(batch.len() as u64)
        })
        .try_buffer_unordered(parallel)
        .try_fold(BulkSummary::default(), |mut summary, written| async move {
            summary.batches += 1;
            summary.points += written;
            Ok::<_, E>(summary)
        })
        .await
}

/// Upsert one batch, retrying transient failures.
pub async fn upsert_with_retry(
    store: &dyn VectorStore,
    collection: &str,
    batch: &[Point],
    max_retries: u32,
) -> Result<(), StoreError> {
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(200),
        max_interval: Duration::from_secs(10),
        max_elapsed_time: None,
        ..Default::default()
    };
    let mut attempt = 0u32;

    loop {
        match store.upsert_points(collection, batch).await {
            Ok(()) => {
                debug!(collection, points = batch.len(), attempt, "Batch written");
                return Ok(());
            }
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                let delay = backoff
                    .next_backoff()
                    .unwrap_or(backoff.max_interval);
                warn!(
                    error = %e,
                    collection,
                    attempt,
                    retry_in_ms = delay.as_millis(),
                    "Upsert failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(error = %e, collection, points = batch.len(), "Upsert failed");
                return Err(e);
            }
        }
    }
}
