//! Points and scored search results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Numeric point identifier, unique within a collection.
pub type PointId = u64;

/// Opaque key/value payload attached to a point.
pub type Payload = Map<String, Value>;

/// Vectors of a point, keyed by vector space name.
pub type NamedVectors = BTreeMap<String, Vec<f32>>;

/// A record stored in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    #[serde(rename = "vector")]
    pub vectors: NamedVectors,
    #[serde(default)]
    pub payload: Payload,
}

impl Point {
    pub fn new(id: PointId) -> Self {
        Self {
            id,
            vectors: NamedVectors::new(),
            payload: Payload::new(),
        }
    }

    pub fn with_vector(mut self, name: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(name.into(), vector);
        self
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn vector(&self, name: &str) -> Option<&[f32]> {
        self.vectors.get(name).map(Vec::as_slice)
    }
}

/// One hit of a similarity query.
///
/// Results are returned best match first. `score` is the raw metric value:
/// a similarity for Cosine/Dot, a distance for Euclid/Manhattan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub vectors: Option<NamedVectors>,
}

/// One page of a scroll over a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollPage {
    pub points: Vec<Point>,
    /// Id to resume from, `None` when the collection is exhausted
    pub next_offset: Option<PointId>,
}
