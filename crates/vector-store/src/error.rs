//! Vector store error types.

use thiserror::Error;

/// Errors returned by a [`VectorStore`](crate::VectorStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store rejected the request
    #[error("Store returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Collection does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request or response body could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Client could not be configured
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failure injected by the in-memory store
    #[error("Injected failure: {0}")]
    Injected(String),
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            StoreError::Api { status, .. } => *status == 429 || *status >= 500,
            StoreError::Injected(_) => true,
            StoreError::NotFound(_) | StoreError::Serialization(_) | StoreError::Config(_) => false,
        }
    }
}
