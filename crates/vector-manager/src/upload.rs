//! Validated bulk ingestion.
//!
//! Pipeline:
//! 1. Map entities to points; mapping failures are logged and skipped
//! 2. Validate each point against the live collection schema (fetched once)
//! 3. Optionally drop points whose ids already exist
//! 4. Batched, concurrent upsert with per-batch retry
//! 5. Wait for the index to turn green

use std::collections::HashSet;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::stream::{self, Stream, StreamExt, TryChunksError, TryStreamExt};
use tracing::{debug, info, warn};

use vector_store::{bulk, BulkOptions, VectorStore};
use vector_types::{Point, PointId, UploadSettings};

use crate::error::{ManagerError, MappingError};
use crate::readiness::{Readiness, ReadinessPoller};
use crate::schema;

/// Upload tuning.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Points per upsert request and per existence check
    pub batch_size: usize,

    /// Upsert requests in flight at once
    pub parallel: usize,

    /// Skip points whose ids are already stored
    pub check_existing: bool,

    /// How long to wait for the index after writing
    pub wait_timeout: Duration,

    /// Retries per batch on transient store errors
    pub max_retries: u32,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::from_settings(&UploadSettings::default())
    }
}

impl UploadOptions {
    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self {
            batch_size: settings.batch_size,
            parallel: settings.parallel,
            check_existing: settings.check_existing,
            wait_timeout: Duration::from_secs(settings.wait_timeout_secs),
            max_retries: settings.max_retries,
        }
    }

    pub fn validate(&self) -> Result<(), ManagerError> {
        if self.batch_size == 0 {
            return Err(ManagerError::InvalidArgument(
                "batch_size must be > 0".to_string(),
            ));
        }
        if self.parallel == 0 {
            return Err(ManagerError::InvalidArgument(
                "parallel must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Counts from one upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Entities turned into points that passed schema validation
    pub mapped: u64,

    /// Entities skipped because mapping failed
    pub mapping_failures: u64,

    /// Points dropped because their id already existed
    pub skipped_existing: u64,

    /// Points sent to the store
    pub written: u64,

    /// Upsert batches sent
    pub batches: u64,

    /// `None` when there was nothing to upload
    pub readiness: Option<Readiness>,
}

/// Streams entities into a collection.
pub struct Uploader {
    store: Arc<dyn VectorStore>,
    poller: ReadinessPoller,
}

impl Uploader {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        let poller = ReadinessPoller::new(store.clone());
        Self { store, poller }
    }

    /// Replace the readiness poller (poll interval, cancellation).
    pub fn with_poller(mut self, poller: ReadinessPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Map, validate, deduplicate and write `entities` to `collection`.
    ///
    /// Schema mismatches and write failures abort the upload. Batches written
    /// before the failure stay written.
    pub async fn upload<E, S, F>(
        &self,
        collection: &str,
        entities: S,
        mut map: F,
        options: &UploadOptions,
    ) -> Result<UploadReport, ManagerError>
    where
        S: Stream<Item = E>,
        F: FnMut(E) -> Result<Point, MappingError>,
    {
        options.validate()?;
        let mut entities = pin!(entities);

        let mut failures = 0u64;
        let first = loop {
            match entities.next().await {
                Some(entity) => match map(entity) {
                    Ok(point) => break point,
                    Err(e) => {
                        failures += 1;
                        warn!(collection, error = %e, "Skipping entity");
                    }
                },
                None => {
                    info!(collection, mapping_failures = failures, "Nothing to upload");
                    return Ok(UploadReport {
                        mapping_failures: failures,
                        ..Default::default()
                    });
                }
            }
        };

        let info = self.store.get_collection(collection).await?;
        let schema = &info.vectors;
        let missing = schema::validate_point(collection, schema, &first)?;
        if !missing.is_empty() {
            warn!(collection, missing = ?missing, "Points do not carry every declared vector space");
        }

        info!(
            collection,
            batch_size = options.batch_size,
            parallel = options.parallel,
            check_existing = options.check_existing,
            "Starting upload"
        );

        let mapped = AtomicU64::new(1);
        let mapping_failures = AtomicU64::new(failures);
        let skipped = AtomicU64::new(0);

        let rest = entities.filter_map(|entity| {
            let next = match map(entity) {
                Ok(point) => match schema::validate_point(collection, schema, &point) {
                    Ok(_) => {
                        mapped.fetch_add(1, Ordering::Relaxed);
                        Some(Ok(point))
                    }
                    Err(e) => Some(Err(ManagerError::from(e))),
                },
                Err(e) => {
                    mapping_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(collection, error = %e, "Skipping entity");
                    None
                }
            };
            future::ready(next)
        });
        let points = stream::once(future::ready(Ok(first))).chain(rest);

        let points = if options.check_existing {
            let store = self.store.as_ref();
            let skipped = &skipped;
            points
                .try_chunks(options.batch_size)
                .map_err(|TryChunksError(_, e)| e)
                .and_then(move |batch| async move {
                    let fresh = retain_new(store, collection, batch, skipped).await;
                    Ok::<_, ManagerError>(stream::iter(
                        fresh.into_iter().map(Ok::<Point, ManagerError>),
                    ))
                })
                .try_flatten()
                .left_stream()
        } else {
            points.right_stream()
        };

        let bulk_options = BulkOptions {
            batch_size: options.batch_size,
            parallel: options.parallel,
            max_retries: options.max_retries,
        };
        let summary = bulk::upload_points(self.store.as_ref(), collection, points, &bulk_options)
            .await
            .map_err(|e| match e {
                ManagerError::Store(source) => ManagerError::BulkWrite {
                    collection: collection.to_string(),
                    source,
                },
                other => other,
            })?;

        info!(
            collection,
            written = summary.points,
            batches = summary.batches,
            skipped_existing = skipped.load(Ordering::Relaxed),
            mapping_failures = mapping_failures.load(Ordering::Relaxed),
            "Upload finished, waiting for index"
        );

        let readiness = self
            .poller
            .wait_until_ready(collection, options.wait_timeout)
            .await;

        Ok(UploadReport {
            mapped: mapped.load(Ordering::Relaxed),
            mapping_failures: mapping_failures.load(Ordering::Relaxed),
            skipped_existing: skipped.load(Ordering::Relaxed),
            written: summary.points,
            batches: summary.batches,
            readiness: Some(readiness),
        })
    }
}

/// Drop points whose ids are already stored.
///
/// If the lookup fails the whole batch is kept: upserts are idempotent, so the
/// only cost is rewriting existing points.
async fn retain_new(
    store: &dyn VectorStore,
    collection: &str,
    batch: Vec<Point>,
    skipped: &AtomicU64,
) -> Vec<Point> {
    let ids: Vec<PointId> = batch.iter().map(|p| p.id).collect();
    match store.retrieve_ids(collection, &ids).await {
        Ok(existing) if existing.is_empty() => batch,
        Ok(existing) => {
            let existing: HashSet<PointId> = existing.into_iter().collect();
            let total = batch.len();
            let fresh: Vec<Point> = batch
                .into_iter()
                .filter(|p| !existing.contains(&p.id))
                .collect();
            let dropped = (total - fresh.len()) as u64;
            skipped.fetch_add(dropped, Ordering::Relaxed);
            debug!(collection, total, dropped, "Filtered existing points");
            fresh
        }
        Err(e) => {
            warn!(
                collection,
                error = %e,
                points = batch.len(),
                "Existence check failed, upserting whole batch"
            );
            batch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaValidationError;
    use std::collections::BTreeMap;
    use vector_store::InMemoryStore;
    use vector_types::{CollectionSpec, Distance, HnswParams, VectorParams};

    async fn store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_collection(&CollectionSpec {
                name: "c".to_string(),
                vectors: BTreeMap::from([("v".to_string(), VectorParams::new(2, Distance::Dot))]),
                quantization: None,
                hnsw: HnswParams::default(),
                max_segment_size: None,
                replication_factor: 1,
                shard_number: None,
            })
            .await
            .unwrap();
        store
    }

    fn to_point(id: u64) -> Result<Point, MappingError> {
        Ok(Point::new(id).with_vector("v", vec![id as f32, 1.0]))
    }

    fn options(batch_size: usize) -> UploadOptions {
        UploadOptions {
            batch_size,
            wait_timeout: Duration::from_secs(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_source_is_noop() {
        let store = store().await;
        let uploader = Uploader::new(store.clone());

        let report = uploader
            .upload("c", stream::iter(Vec::<u64>::new()), to_point, &options(4))
            .await
            .unwrap();

        assert_eq!(report, UploadReport::default());
        assert_eq!(store.stats().upsert_calls, 0);
    }

    #[tokio::test]
    async fn test_uploads_all_points() {
        let store = store().await;
        let uploader = Uploader::new(store.clone());

        let report = uploader
            .upload("c", stream::iter(0..10u64), to_point, &options(3))
            .await
            .unwrap();

        assert_eq!(report.mapped, 10);
        assert_eq!(report.written, 10);
        assert_eq!(report.batches, 4);
        assert_eq!(report.readiness, Some(Readiness::Ready));
        assert_eq!(store.point_count("c"), 10);
    }

    #[tokio::test]
    async fn test_leading_mapping_failures_are_skipped() {
        let store = store().await;
        let uploader = Uploader::new(store.clone());
        let map = |id: u64| {
            if id < 2 {
                Err(MappingError::new(format!("entity {id} is malformed")))
            } else {
                to_point(id)
            }
        };

        let report = uploader
            .upload("c", stream::iter(0..5u64), map, &options(8))
            .await
            .unwrap();

        assert_eq!(report.mapping_failures, 2);
        assert_eq!(report.mapped, 3);
        assert_eq!(report.written, 3);
    }

    #[tokio::test]
    async fn test_all_mapping_failures_is_noop() {
        let store = store().await;
        let uploader = Uploader::new(store.clone());

        let report = uploader
            .upload(
                "c",
                stream::iter(0..3u64),
                |_| Err(MappingError::new("bad")),
                &options(8),
            )
            .await
            .unwrap();

        assert_eq!(report.mapping_failures, 3);
        assert_eq!(report.readiness, None);
        assert_eq!(store.stats().upsert_calls, 0);
    }

    #[tokio::test]
    async fn test_later_mismatch_aborts_before_its_batch() {
        let store = store().await;
        let uploader = Uploader::new(store.clone());
        let map = |id: u64| {
            if id == 5 {
                Ok(Point::new(id).with_vector("v", vec![1.0, 2.0, 3.0]))
            } else {
                to_point(id)
            }
        };

        let err = uploader
            .upload("c", stream::iter(0..8u64), map, &options(2))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ManagerError::SchemaValidation(SchemaValidationError::DimensionMismatch { .. })
        ));
        assert!(store.point("c", 4).is_none());
        assert!(store.point("c", 5).is_none());
    }

    #[tokio::test]
    async fn test_check_existing_disabled_skips_lookup() {
        let store = store().await;
        let uploader = Uploader::new(store.clone());
        let options = UploadOptions {
            check_existing: false,
            ..options(4)
        };

        uploader
            .upload("c", stream::iter(0..6u64), to_point, &options)
            .await
            .unwrap();
        let report = uploader
            .upload("c", stream::iter(0..6u64), to_point, &options)
            .await
            .unwrap();

        assert_eq!(report.written, 6);
        assert_eq!(store.stats().retrieve_calls, 0);
        assert_eq!(store.stats().upserted_points, 12);
    }

    #[tokio::test]
    async fn test_bulk_write_error_is_wrapped() {
        let store = store().await;
        store.fail_next_upserts(100);
        let uploader = Uploader::new(store.clone());
        let options = UploadOptions {
            max_retries: 0,
            ..options(4)
        };

        let err = uploader
            .upload("c", stream::iter(0..3u64), to_point, &options)
            .await
            .unwrap_err();

        match err {
            ManagerError::BulkWrite { collection, .. } => assert_eq!(collection, "c"),
            other => panic!("Expected BulkWrite, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_options() {
        let store = store().await;
        let uploader = Uploader::new(store);
        let options = UploadOptions {
            parallel: 0,
            ..Default::default()
        };

        let err = uploader
            .upload("c", stream::iter(0..3u64), to_point, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_missing_collection_is_store_error() {
        let store = Arc::new(InMemoryStore::new());
        let uploader = Uploader::new(store);

        let err = uploader
            .upload("nope", stream::iter(0..3u64), to_point, &options(4))
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::Store(_)));
    }
}
