//! Collection schema types.
//!
//! A collection declares one or more named vector spaces. The set of spaces
//! and each space's dimension are fixed when the collection is created; the
//! store never changes them afterwards, which lets clients cache schemas.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Name used by the store for a collection's single unnamed vector.
pub const DEFAULT_VECTOR_NAME: &str = "";

/// Default HNSW graph fan-out.
pub const DEFAULT_HNSW_M: usize = 16;

/// Quantile used to clip outliers before int8 scalar quantization.
pub const DEFAULT_QUANTILE: f32 = 0.99;

/// Larger segments search faster but take longer to index.
pub const DEFAULT_MAX_SEGMENT_SIZE: usize = 5_000_000;

/// Distance metric of a vector space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Euclid,
    Dot,
    Manhattan,
}

impl Distance {
    /// Whether a larger score means a closer match.
    ///
    /// Cosine and Dot report similarities; Euclid and Manhattan report distances.
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Distance::Cosine | Distance::Dot)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Euclid => "Euclid",
            Distance::Dot => "Dot",
            Distance::Manhattan => "Manhattan",
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Distance {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Distance::Cosine),
            "euclid" | "euclidean" => Ok(Distance::Euclid),
            "dot" => Ok(Distance::Dot),
            "manhattan" => Ok(Distance::Manhattan),
            other => Err(TypesError::InvalidDistance(other.to_string())),
        }
    }
}

/// Storage parameters of one named vector space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorParams {
    /// Vector dimension
    pub size: usize,
    pub distance: Distance,
    /// Keep original vectors on disk instead of in RAM
    #[serde(default)]
    pub on_disk: bool,
}

impl VectorParams {
    pub fn new(size: usize, distance: Distance) -> Self {
        Self {
            size,
            distance,
            on_disk: false,
        }
    }

    pub fn on_disk(mut self, on_disk: bool) -> Self {
        self.on_disk = on_disk;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Int8,
}

/// Scalar quantization policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarQuantization {
    #[serde(rename = "type")]
    pub kind: ScalarType,
    pub quantile: f32,
    /// Keep quantized codes resident in RAM
    pub always_ram: bool,
}

impl Default for ScalarQuantization {
    fn default() -> Self {
        Self {
            kind: ScalarType::Int8,
            quantile: DEFAULT_QUANTILE,
            always_ram: true,
        }
    }
}

/// HNSW index parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Edges per node. Lower values give a sparser graph: faster inserts and
    /// less memory, at the cost of recall.
    pub m: usize,
    /// Keep the graph on disk
    pub on_disk: bool,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: DEFAULT_HNSW_M,
            on_disk: false,
        }
    }
}

/// Everything needed to create a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub vectors: BTreeMap<String, VectorParams>,
    pub quantization: Option<ScalarQuantization>,
    pub hnsw: HnswParams,
    pub max_segment_size: Option<usize>,
    pub replication_factor: u32,
    /// Store default (usually one shard per CPU) when unset
    pub shard_number: Option<u32>,
}

/// Readiness of a collection's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    /// All optimizations finished
    Green,
    /// Optimizing; "grey" (optimization pending) is folded in here
    #[serde(alias = "grey")]
    Yellow,
    /// Store reported an error
    Red,
    #[default]
    #[serde(other)]
    Unknown,
}

impl CollectionStatus {
    pub fn is_ready(&self) -> bool {
        *self == CollectionStatus::Green
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CollectionStatus::Green => "green",
            CollectionStatus::Yellow => "yellow",
            CollectionStatus::Red => "red",
            CollectionStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Live description of a collection as reported by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub status: CollectionStatus,
    pub vectors: BTreeMap<String, VectorParams>,
    pub quantization: Option<ScalarQuantization>,
    pub hnsw_m: Option<usize>,
    pub replication_factor: Option<u32>,
    pub shard_number: Option<u32>,
    pub points_count: Option<u64>,
}

impl CollectionInfo {
    /// Look up a named vector space.
    pub fn vector(&self, name: &str) -> Option<&VectorParams> {
        self.vectors.get(name)
    }

    /// Declared vector space names, sorted.
    pub fn vector_names(&self) -> Vec<&str> {
        self.vectors.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_from_str() {
        assert_eq!("cosine".parse::<Distance>().unwrap(), Distance::Cosine);
        assert_eq!("Euclidean".parse::<Distance>().unwrap(), Distance::Euclid);
        assert_eq!("DOT".parse::<Distance>().unwrap(), Distance::Dot);
        assert_eq!(" manhattan ".parse::<Distance>().unwrap(), Distance::Manhattan);
        assert!(matches!(
            "hamming".parse::<Distance>(),
            Err(TypesError::InvalidDistance(_))
        ));
    }

    #[test]
    fn test_distance_ordering_direction() {
        assert!(Distance::Cosine.higher_is_better());
        assert!(Distance::Dot.higher_is_better());
        assert!(!Distance::Euclid.higher_is_better());
        assert!(!Distance::Manhattan.higher_is_better());
    }

    #[test]
    fn test_status_wire_names() {
        let status: CollectionStatus = serde_json::from_str("\"green\"").unwrap();
        assert!(status.is_ready());

        let status: CollectionStatus = serde_json::from_str("\"grey\"").unwrap();
        assert_eq!(status, CollectionStatus::Yellow);

        let status: CollectionStatus = serde_json::from_str("\"purple\"").unwrap();
        assert_eq!(status, CollectionStatus::Unknown);
    }

    #[test]
    fn test_scalar_quantization_wire_shape() {
        let json = serde_json::to_value(ScalarQuantization::default()).unwrap();
        assert_eq!(json["type"], "int8");
        assert_eq!(json["always_ram"], true);
        assert!((json["quantile"].as_f64().unwrap() - 0.99).abs() < 1e-6);
    }

    #[test]
    fn test_vector_params_on_disk_defaults_false() {
        let params: VectorParams =
            serde_json::from_str(r#"{"size": 4, "distance": "Dot"}"#).unwrap();
        assert_eq!(params, VectorParams::new(4, Distance::Dot));
    }
}
