//! Dimension-checked similarity search.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, error, info};

use vector_store::{StoreError, VectorStore};
use vector_types::{Filter, Point, PointId, QueryRequest, ScoredResult};

use crate::error::ManagerError;
use crate::schema::{self, Schema};

/// Default number of hits returned by a search.
pub const DEFAULT_LIMIT: usize = 10;

const SCROLL_PAGE_SIZE: usize = 256;

/// Runs queries against one store.
///
/// Collection schemas are fetched on first use and cached. A query the cached
/// schema rejects, or one the store refuses as malformed or missing, drops the
/// entry so a recreated collection is picked up.
pub struct SearchClient {
    store: Arc<dyn VectorStore>,
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

impl SearchClient {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Top-`limit` hits for `query` in the space `vector_name`, best first,
    /// with payload and stored vectors.
    pub async fn search(
        &self,
        collection: &str,
        vector_name: &str,
        query: Vec<f32>,
        filter: Option<Filter>,
        limit: usize,
    ) -> Result<Vec<ScoredResult>, ManagerError> {
        let request = QueryRequest::new(collection, vector_name, query, limit).with_filter(filter);
        self.execute(request).await
    }

    /// Like [`search`](Self::search) but returns ids and scores only.
    pub async fn search_lean(
        &self,
        collection: &str,
        vector_name: &str,
        query: Vec<f32>,
        filter: Option<Filter>,
        limit: usize,
    ) -> Result<Vec<ScoredResult>, ManagerError> {
        let request = QueryRequest::new(collection, vector_name, query, limit)
            .with_filter(filter)
            .lean();
        self.execute(request).await
    }

    async fn execute(&self, request: QueryRequest) -> Result<Vec<ScoredResult>, ManagerError> {
        if request.limit == 0 {
            return Err(ManagerError::InvalidArgument(
                "limit must be >= 1".to_string(),
            ));
        }

        let search_error = |source: StoreError| {
            error!(
                collection = %request.collection,
                vector_name = %request.using,
                error = %source,
                "Search failed"
            );
            ManagerError::Search {
                collection: request.collection.clone(),
                vector_name: request.using.clone(),
                source,
            }
        };

        self.validate(&request).await.map_err(|e| match e {
            ManagerError::Store(source) => search_error(source),
            other => other,
        })?;

        let start = Instant::now();
        let results = match self.store.query(&request).await {
            Ok(results) => results,
            Err(e) => {
                if matches!(e, StoreError::NotFound(_) | StoreError::Api { status: 400, .. }) {
                    // The collection may have been dropped or recreated with
                    // other vector spaces since its schema was cached.
                    self.invalidate(&request.collection).await;
                    if let Ok((schema, _)) = self.schema(&request.collection).await {
                        schema::validate_query(
                            &request.collection,
                            &schema,
                            &request.using,
                            request.vector.len(),
                        )?;
                    }
                }
                return Err(search_error(e));
            }
        };

        info!(
            collection = %request.collection,
            vector_name = %request.using,
            limit = request.limit,
            hits = results.len(),
            duration_ms = start.elapsed().as_millis(),
            "Search completed"
        );
        Ok(results)
    }

    /// Check the query against the collection schema. A mismatch against a
    /// cached schema is re-checked once against a fresh one.
    async fn validate(&self, request: &QueryRequest) -> Result<(), ManagerError> {
        let (schema, cached) = self.schema(&request.collection).await?;
        let checked = schema::validate_query(
            &request.collection,
            &schema,
            &request.using,
            request.vector.len(),
        );
        match checked {
            Ok(_) => Ok(()),
            Err(_) if cached => {
                debug!(collection = %request.collection, "Cached schema rejected query, refetching");
                self.invalidate(&request.collection).await;
                let (schema, _) = self.schema(&request.collection).await?;
                schema::validate_query(
                    &request.collection,
                    &schema,
                    &request.using,
                    request.vector.len(),
                )?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Schema of `collection` and whether it came from the cache.
    async fn schema(&self, collection: &str) -> Result<(Arc<Schema>, bool), StoreError> {
        if let Some(schema) = self.schemas.read().await.get(collection) {
            return Ok((schema.clone(), true));
        }

        let info = self.store.get_collection(collection).await?;
        let schema = Arc::new(info.vectors);
        self.schemas
            .write()
            .await
            .insert(collection.to_string(), schema.clone());
        Ok((schema, false))
    }

    /// Forget the cached schema of `collection`. Call after deleting or
    /// recreating it through another client.
    pub async fn invalidate(&self, collection: &str) {
        self.schemas.write().await.remove(collection);
    }

    /// Exact number of points matching `filter`.
    pub async fn count(
        &self,
        collection: &str,
        filter: Option<&Filter>,
    ) -> Result<u64, ManagerError> {
        Ok(self.store.count(collection, filter).await?)
    }

    /// Up to `limit` points in id order, with vectors and payload.
    pub async fn scroll_all(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<Point>, ManagerError> {
        let mut points = Vec::new();
        let mut offset: Option<PointId> = None;

        while points.len() < limit {
            let page_size = (limit - points.len()).min(SCROLL_PAGE_SIZE);
            let page = self.store.scroll(collection, page_size, offset).await?;
            if page.points.is_empty() {
                break;
            }
            points.extend(page.points);
            match page.next_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        points.truncate(limit);
        Ok(points)
    }
}
