//! Vector store trait.
//!
//! Defines the calls issued against the external similarity store. The wire
//! protocol belongs to each implementation.

use async_trait::async_trait;

use vector_types::{
    CollectionInfo, CollectionSpec, Filter, Point, PointId, QueryRequest, ScoredResult,
    ScrollPage,
};

use crate::error::StoreError;

/// Trait for networked vector stores.
///
/// Implementations must be safe to share across tasks; every call may suspend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check whether a collection exists.
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Create a collection.
    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError>;

    /// Fetch the live description of a collection.
    async fn get_collection(&self, name: &str) -> Result<CollectionInfo, StoreError>;

    /// Names of all collections.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    /// Delete a collection. Returns whether the store acknowledged the deletion.
    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError>;

    /// Insert or overwrite points, waiting until the write is applied.
    async fn upsert_points(&self, collection: &str, points: &[Point]) -> Result<(), StoreError>;

    /// Return the subset of `ids` present in the collection.
    ///
    /// Fetches neither payload nor vectors.
    async fn retrieve_ids(
        &self,
        collection: &str,
        ids: &[PointId],
    ) -> Result<Vec<PointId>, StoreError>;

    /// Top-K similarity query. Results are sorted best match first.
    async fn query(&self, request: &QueryRequest) -> Result<Vec<ScoredResult>, StoreError>;

    /// Exact number of points matching `filter`.
    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<u64, StoreError>;

    /// One page of points in id order, with payload and vectors.
    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<PointId>,
    ) -> Result<ScrollPage, StoreError>;
}
