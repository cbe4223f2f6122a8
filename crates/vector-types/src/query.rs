//! Similarity query request.

use serde::{Deserialize, Serialize};

use crate::filter::Filter;

/// Top-K query against one named vector space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub collection: String,
    /// Named vector space to search
    pub using: String,
    pub vector: Vec<f32>,
    pub filter: Option<Filter>,
    pub limit: usize,
    pub with_payload: bool,
    pub with_vectors: bool,
}

impl QueryRequest {
    /// A query returning payload and stored vectors with every hit.
    pub fn new(
        collection: impl Into<String>,
        using: impl Into<String>,
        vector: Vec<f32>,
        limit: usize,
    ) -> Self {
        Self {
            collection: collection.into(),
            using: using.into(),
            vector,
            filter: None,
            limit,
            with_payload: true,
            with_vectors: true,
        }
    }

    pub fn with_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter;
        self
    }

    /// Drop payload and vectors from the response.
    pub fn lean(mut self) -> Self {
        self.with_payload = false;
        self.with_vectors = false;
        self
    }
}
