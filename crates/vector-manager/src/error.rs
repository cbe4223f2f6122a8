//! Error types for collection management, ingestion and search.

use thiserror::Error;

use vector_store::StoreError;
use vector_types::PointId;

/// A point or query does not fit the collection's declared vector spaces.
///
/// Always raised before anything is written or queried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaValidationError {
    /// Point carries a vector space the collection does not declare
    #[error("Point {id} has vector '{name}' not declared by collection '{collection}'")]
    UnknownVector {
        collection: String,
        id: PointId,
        name: String,
    },

    /// Vector length differs from the declared dimension
    #[error(
        "Vector '{name}' of collection '{collection}' expects dimension {expected}, got {actual}"
    )]
    DimensionMismatch {
        collection: String,
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Query names a vector space the collection does not declare
    #[error("Collection '{collection}' has no vector space '{name}'")]
    UnknownCollectionVector { collection: String, name: String },
}

/// A single entity could not be turned into a point. The upload skips it.
#[derive(Debug, Clone, Error)]
#[error("Failed to map entity: {0}")]
pub struct MappingError(pub String);

impl MappingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors surfaced by the manager components.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Collection definition is unusable
    #[error("Schema error: {0}")]
    Schema(String),

    #[error(transparent)]
    SchemaValidation(#[from] SchemaValidationError),

    /// A batch could not be written; the upload was aborted
    #[error("Bulk write to '{collection}' failed: {source}")]
    BulkWrite {
        collection: String,
        #[source]
        source: StoreError,
    },

    /// Similarity query failed
    #[error("Search on '{collection}' using '{vector_name}' failed: {source}")]
    Search {
        collection: String,
        vector_name: String,
        #[source]
        source: StoreError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
