//! Collection lifecycle: create, inspect, list and delete.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};

use vector_store::VectorStore;
use vector_types::{
    CollectionInfo, CollectionSpec, HnswParams, ScalarQuantization, VectorParams,
    DEFAULT_HNSW_M, DEFAULT_MAX_SEGMENT_SIZE,
};

use crate::error::ManagerError;

/// Indexing and placement choices for a new collection.
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    /// Keep vectors on disk and attach int8 scalar quantization
    pub use_quantization: bool,

    /// HNSW fan-out, passed through verbatim
    pub hnsw_m: usize,

    pub replication_factor: u32,

    /// Store default when unset
    pub shard_number: Option<u32>,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            use_quantization: true,
            hnsw_m: DEFAULT_HNSW_M,
            replication_factor: 2,
            shard_number: None,
        }
    }
}

/// Build the full collection definition.
///
/// The `on_disk` flag of each space is taken from `use_quantization`; the
/// HNSW graph always stays in memory.
pub fn collection_spec(
    name: &str,
    spaces: &BTreeMap<String, VectorParams>,
    options: &CollectionOptions,
) -> Result<CollectionSpec, ManagerError> {
    if spaces.is_empty() {
        return Err(ManagerError::Schema(format!(
            "collection '{}' needs at least one vector space",
            name
        )));
    }
    if let Some((space, _)) = spaces.iter().find(|(_, p)| p.size == 0) {
        return Err(ManagerError::Schema(format!(
            "vector space '{}' of collection '{}' has dimension 0",
            space, name
        )));
    }

    let vectors = spaces
        .iter()
        .map(|(space, params)| {
            (
                space.clone(),
                VectorParams::new(params.size, params.distance).on_disk(options.use_quantization),
            )
        })
        .collect();

    Ok(CollectionSpec {
        name: name.to_string(),
        vectors,
        quantization: options
            .use_quantization
            .then(ScalarQuantization::default),
        hnsw: HnswParams {
            m: options.hnsw_m,
            on_disk: false,
        },
        max_segment_size: Some(DEFAULT_MAX_SEGMENT_SIZE),
        replication_factor: options.replication_factor,
        shard_number: options.shard_number,
    })
}

/// Creates, inspects and removes collections.
pub struct CollectionManager {
    store: Arc<dyn VectorStore>,
}

impl CollectionManager {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub async fn exists(&self, name: &str) -> Result<bool, ManagerError> {
        Ok(self.store.collection_exists(name).await?)
    }

    pub async fn create(
        &self,
        name: &str,
        spaces: &BTreeMap<String, VectorParams>,
        options: &CollectionOptions,
    ) -> Result<(), ManagerError> {
        let spec = collection_spec(name, spaces, options)?;
        self.store.create_collection(&spec).await?;
        info!(
            collection = name,
            spaces = ?spec.vectors.keys().collect::<Vec<_>>(),
            quantization = options.use_quantization,
            hnsw_m = options.hnsw_m,
            replication_factor = options.replication_factor,
            "Created collection"
        );
        Ok(())
    }

    /// Create the collection unless it already exists. Returns whether it was created.
    pub async fn ensure(
        &self,
        name: &str,
        spaces: &BTreeMap<String, VectorParams>,
        options: &CollectionOptions,
    ) -> Result<bool, ManagerError> {
        if self.exists(name).await? {
            info!(collection = name, "Collection already exists");
            return Ok(false);
        }
        self.create(name, spaces, options).await?;
        Ok(true)
    }

    pub async fn info(&self, name: &str) -> Result<CollectionInfo, ManagerError> {
        Ok(self.store.get_collection(name).await?)
    }

    pub async fn list(&self) -> Result<BTreeSet<String>, ManagerError> {
        Ok(self.store.list_collections().await?.into_iter().collect())
    }

    /// Delete a collection. Failures are logged, never returned.
    pub async fn delete(&self, name: &str) {
        match self.store.delete_collection(name).await {
            Ok(true) => info!(collection = name, "Deleted collection"),
            Ok(false) => warn!(collection = name, "Store did not acknowledge deletion"),
            Err(e) => warn!(collection = name, error = %e, "Failed to delete collection"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vector_store::InMemoryStore;
    use vector_types::{Distance, ScalarType};

    fn image_space() -> BTreeMap<String, VectorParams> {
        BTreeMap::from([("image".to_string(), VectorParams::new(1408, Distance::Cosine))])
    }

    #[test]
    fn test_spec_with_quantization() {
        let spec = collection_spec("c", &image_space(), &CollectionOptions::default()).unwrap();

        assert!(spec.vectors["image"].on_disk);
        let quantization = spec.quantization.unwrap();
        assert_eq!(quantization.kind, ScalarType::Int8);
        assert!((quantization.quantile - 0.99).abs() < f32::EPSILON);
        assert!(quantization.always_ram);
        assert_eq!(spec.hnsw, HnswParams { m: 16, on_disk: false });
        assert_eq!(spec.max_segment_size, Some(5_000_000));
        assert_eq!(spec.replication_factor, 2);
        assert_eq!(spec.shard_number, None);
    }

    #[test]
    fn test_spec_without_quantization() {
        let options = CollectionOptions {
            use_quantization: false,
            hnsw_m: 4,
            replication_factor: 1,
            shard_number: Some(3),
        };
        let spec = collection_spec("c", &image_space(), &options).unwrap();

        assert!(!spec.vectors["image"].on_disk);
        assert!(spec.quantization.is_none());
        assert_eq!(spec.hnsw.m, 4);
        assert!(!spec.hnsw.on_disk);
        assert_eq!(spec.shard_number, Some(3));
    }

    #[test]
    fn test_spec_rejects_empty_or_zero_dimension() {
        let err = collection_spec("c", &BTreeMap::new(), &CollectionOptions::default());
        assert!(matches!(err, Err(ManagerError::Schema(_))));

        let zero = BTreeMap::from([("v".to_string(), VectorParams::new(0, Distance::Dot))]);
        let err = collection_spec("c", &zero, &CollectionOptions::default());
        assert!(matches!(err, Err(ManagerError::Schema(_))));
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let store = Arc::new(InMemoryStore::new());
        let manager = CollectionManager::new(store.clone());

        assert!(!manager.exists("c").await.unwrap());
        assert!(manager
            .ensure("c", &image_space(), &CollectionOptions::default())
            .await
            .unwrap());
        assert!(!manager
            .ensure("c", &image_space(), &CollectionOptions::default())
            .await
            .unwrap());

        let info = manager.info("c").await.unwrap();
        assert_eq!(info.vector("image").map(|p| p.size), Some(1408));
        assert_eq!(info.hnsw_m, Some(16));

        assert_eq!(
            manager.list().await.unwrap().into_iter().collect::<Vec<_>>(),
            vec!["c".to_string()]
        );

        manager.delete("c").await;
        assert!(!manager.exists("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_never_fails() {
        let store = Arc::new(InMemoryStore::new());
        let manager = CollectionManager::new(store.clone());

        // missing collection: store answers false
        manager.delete("missing").await;

        manager
            .create("c", &image_space(), &CollectionOptions::default())
            .await
            .unwrap();
        store.fail_deletes(true);
        manager.delete("c").await;
        assert!(manager.exists("c").await.unwrap());
    }
}
