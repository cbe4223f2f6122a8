//! # vector-manager
//!
//! Collection lifecycle, validated bulk ingestion, readiness polling and
//! similarity search on top of a [`VectorStore`](vector_store::VectorStore).
//!
//! Every component takes an `Arc<dyn VectorStore>`; there is no global client.
//!
//! ## Failure policy
//!
//! Failures that could lose data or return wrong results surface as errors:
//! schema mismatches, bulk writes and searches. Failures that only cost
//! efficiency degrade: a failed existence check uploads the whole batch, and
//! a readiness timeout is logged and reported as [`Readiness::TimedOut`].

pub mod error;
pub mod lifecycle;
pub mod readiness;
pub mod schema;
pub mod search;
pub mod upload;

pub use error::{ManagerError, MappingError, SchemaValidationError};
pub use lifecycle::{collection_spec, CollectionManager, CollectionOptions};
pub use readiness::{Readiness, ReadinessPoller, DEFAULT_POLL_INTERVAL};
pub use schema::Schema;
pub use search::{SearchClient, DEFAULT_LIMIT};
pub use upload::{UploadOptions, UploadReport, Uploader};
