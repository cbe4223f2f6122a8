//! # vector-store
//!
//! The seam between vector-etl and the similarity store.
//!
//! - [`VectorStore`]: async trait covering collection management, upserts,
//!   id lookups, top-K queries, counting and scrolling
//! - [`QdrantStore`]: REST implementation
//! - [`InMemoryStore`]: brute-force implementation with fault injection
//! - [`bulk`]: batched concurrent upload with per-batch retry

pub mod bulk;
pub mod error;
pub mod in_memory;
pub mod qdrant;
pub mod store;

pub use bulk::{upload_points, upsert_with_retry, BulkOptions, BulkSummary};
pub use error::StoreError;
pub use in_memory::{InMemoryStore, StoreStats};
pub use qdrant::{QdrantConfig, QdrantStore};
pub use store::VectorStore;
