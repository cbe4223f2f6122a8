//! # vector-types
//!
//! Shared data model for vector-etl: collection schemas, points, scored
//! results, payload filters and layered settings.

pub mod collection;
pub mod error;
pub mod filter;
pub mod point;
pub mod query;
pub mod settings;

pub use collection::{
    CollectionInfo, CollectionSpec, CollectionStatus, Distance, HnswParams, ScalarQuantization,
    ScalarType, VectorParams, DEFAULT_HNSW_M, DEFAULT_MAX_SEGMENT_SIZE, DEFAULT_QUANTILE,
    DEFAULT_VECTOR_NAME,
};
pub use error::TypesError;
pub use filter::{Condition, Filter, MatchValue, Predicate, Range};
pub use point::{NamedVectors, Payload, Point, PointId, ScoredResult, ScrollPage};
pub use query::QueryRequest;
pub use settings::{QdrantSettings, Settings, UploadSettings};
