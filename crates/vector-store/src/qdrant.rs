//! Qdrant REST client.
//!
//! Talks to the store's HTTP API (default port 6333). Every response body is
//! wrapped in `{"result": ..., "status": ..., "time": ...}`; errors carry a
//! message under `status.error`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client, Method, RequestBuilder, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use vector_types::{
    CollectionInfo, CollectionSpec, CollectionStatus, Filter, HnswParams, NamedVectors, Payload,
    Point, PointId, QdrantSettings, QueryRequest, ScalarQuantization, ScalarType, ScoredResult,
    ScrollPage, VectorParams, DEFAULT_VECTOR_NAME,
};

use crate::error::StoreError;
use crate::store::VectorStore;

/// Connection configuration for [`QdrantStore`].
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Base URL, e.g. `http://localhost:6333`
    pub url: String,

    pub api_key: Option<SecretString>,

    /// Per-request timeout
    pub timeout: Duration,

    /// Verify TLS certificates
    pub verify: bool,

    /// Extra root certificate (PEM)
    pub ca_cert: Option<PathBuf>,
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            timeout: Duration::from_secs(60),
            verify: true,
            ca_cert: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build from loaded settings.
    pub fn from_settings(settings: &QdrantSettings) -> Self {
        Self {
            url: settings.url(),
            api_key: settings
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            timeout: Duration::from_secs(settings.timeout_secs),
            verify: settings.verify,
            ca_cert: settings.ca_cert.as_ref().map(PathBuf::from),
        }
    }
}

/// [`VectorStore`] backed by a Qdrant server.
pub struct QdrantStore {
    client: Client,
    base: Url,
    api_key: Option<SecretString>,
}

impl QdrantStore {
    /// Create a client. No request is made until the first call.
    pub fn new(config: QdrantConfig) -> Result<Self, StoreError> {
        let base = Url::parse(&config.url)
            .map_err(|e| StoreError::Config(format!("invalid url '{}': {}", config.url, e)))?;

        let mut builder = Client::builder().timeout(config.timeout);
        if !config.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path).map_err(|e| {
                StoreError::Config(format!(
                    "failed to read CA certificate {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|e| StoreError::Config(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;

        info!(url = %base, "Initialized Qdrant store client");
        Ok(Self {
            client,
            base,
            api_key: config.api_key,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Config(format!("unusable base url: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key.expose_secret()),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> Result<T, StoreError> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            let envelope: ApiResponse<T> = response
                .json()
                .await
                .map_err(|e| StoreError::Serialization(format!("{}: {}", context, e)))?;
            return Ok(envelope.result);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.status)
            .and_then(|s| s.error)
            .unwrap_or(body);

        debug!(context, status = status.as_u16(), %message, "Store request failed");
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(format!("{}: {}", context, message)));
        }
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let url = self.endpoint(&["collections", name, "exists"])?;
        let result: ExistsResult = self.send(self.request(Method::GET, url), name).await?;
        Ok(result.exists)
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
        let url = self.endpoint(&["collections", &spec.name])?;
        let body = CreateCollectionBody {
            vectors: &spec.vectors,
            quantization_config: spec
                .quantization
                .as_ref()
                .map(|scalar| QuantizationBody { scalar }),
            optimizers_config: spec
                .max_segment_size
                .map(|max_segment_size| OptimizersBody { max_segment_size }),
            hnsw_config: &spec.hnsw,
            replication_factor: spec.replication_factor,
            shard_number: spec.shard_number,
        };
        let _: IgnoredAny = self
            .send(self.request(Method::PUT, url).json(&body), &spec.name)
            .await?;
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionInfo, StoreError> {
        let url = self.endpoint(&["collections", name])?;
        let dto: CollectionInfoDto = self.send(self.request(Method::GET, url), name).await?;
        Ok(dto.into_info(name))
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let url = self.endpoint(&["collections"])?;
        let result: CollectionsResult = self
            .send(self.request(Method::GET, url), "collections")
            .await?;
        Ok(result.collections.into_iter().map(|c| c.name).collect())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError> {
        let url = self.endpoint(&["collections", name])?;
        self.send(self.request(Method::DELETE, url), name).await
    }

    async fn upsert_points(&self, collection: &str, points: &[Point]) -> Result<(), StoreError> {
        let mut url = self.endpoint(&["collections", collection, "points"])?;
        url.query_pairs_mut().append_pair("wait", "true");
        let body = UpsertBody {
            points: points.iter().map(PointBody::from).collect(),
        };
        let _: IgnoredAny = self
            .send(self.request(Method::PUT, url).json(&body), collection)
            .await?;
        debug!(collection, count = points.len(), "Upserted points");
        Ok(())
    }

    async fn retrieve_ids(
        &self,
        collection: &str,
        ids: &[PointId],
    ) -> Result<Vec<PointId>, StoreError> {
        let url = self.endpoint(&["collections", collection, "points"])?;
        let body = RetrieveBody {
            ids,
            with_payload: false,
            with_vector: false,
        };
        let records: Vec<RecordIdDto> = self
            .send(self.request(Method::POST, url).json(&body), collection)
            .await?;
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<ScoredResult>, StoreError> {
        let url = self.endpoint(&["collections", &request.collection, "points", "query"])?;
        let body = QueryBody {
            query: &request.vector,
            using: &request.using,
            filter: request.filter.as_ref(),
            limit: request.limit,
            with_payload: request.with_payload,
            with_vector: request.with_vectors,
        };
        let result: QueryResult = self
            .send(
                self.request(Method::POST, url).json(&body),
                &request.collection,
            )
            .await?;
        Ok(result
            .points
            .into_iter()
            .map(|p| ScoredResult {
                id: p.id,
                score: p.score,
                payload: p.payload.unwrap_or_default(),
                vectors: p.vector.map(VectorOutput::into_named),
            })
            .collect())
    }

    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<u64, StoreError> {
        let url = self.endpoint(&["collections", collection, "points", "count"])?;
        let body = CountBody {
            filter,
            exact: true,
        };
        let result: CountResult = self
            .send(self.request(Method::POST, url).json(&body), collection)
            .await?;
        Ok(result.count)
    }

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<PointId>,
    ) -> Result<ScrollPage, StoreError> {
        let url = self.endpoint(&["collections", collection, "points", "scroll"])?;
        let body = ScrollBody {
            limit,
            offset,
            with_payload: true,
            with_vector: true,
        };
        let result: ScrollResult = self
            .send(self.request(Method::POST, url).json(&body), collection)
            .await?;
        Ok(ScrollPage {
            points: result
                .points
                .into_iter()
                .map(|r| Point {
                    id: r.id,
                    vectors: r.vector.map(VectorOutput::into_named).unwrap_or_default(),
                    payload: r.payload.unwrap_or_default(),
                })
                .collect(),
            next_offset: result.next_page_offset,
        })
    }
}

// ===== Wire types =====

#[derive(Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    status: Option<ApiErrorStatus>,
}

#[derive(Deserialize)]
struct ApiErrorStatus {
    error: Option<String>,
}

#[derive(Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionName>,
}

#[derive(Deserialize)]
struct CollectionName {
    name: String,
}

#[derive(Serialize)]
struct CreateCollectionBody<'a> {
    vectors: &'a BTreeMap<String, VectorParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantization_config: Option<QuantizationBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optimizers_config: Option<OptimizersBody>,
    hnsw_config: &'a HnswParams,
    replication_factor: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    shard_number: Option<u32>,
}

#[derive(Serialize)]
struct QuantizationBody<'a> {
    scalar: &'a ScalarQuantization,
}

#[derive(Serialize)]
struct OptimizersBody {
    max_segment_size: usize,
}

#[derive(Deserialize)]
struct CollectionInfoDto {
    #[serde(default)]
    status: CollectionStatus,
    #[serde(default)]
    points_count: Option<u64>,
    config: CollectionConfigDto,
}

#[derive(Deserialize)]
struct CollectionConfigDto {
    params: CollectionParamsDto,
    #[serde(default)]
    hnsw_config: Option<HnswConfigDto>,
    #[serde(default)]
    quantization_config: Option<Value>,
}

#[derive(Deserialize)]
struct CollectionParamsDto {
    #[serde(default)]
    vectors: Option<VectorsConfigDto>,
    #[serde(default)]
    shard_number: Option<u32>,
    #[serde(default)]
    replication_factor: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VectorsConfigDto {
    Single(VectorParams),
    Named(BTreeMap<String, VectorParams>),
}

#[derive(Deserialize)]
struct HnswConfigDto {
    m: Option<usize>,
}

#[derive(Deserialize)]
struct ScalarDto {
    #[serde(default)]
    quantile: Option<f32>,
    #[serde(default)]
    always_ram: Option<bool>,
}

impl CollectionInfoDto {
    fn into_info(self, name: &str) -> CollectionInfo {
        let vectors = match self.config.params.vectors {
            Some(VectorsConfigDto::Single(params)) => {
                BTreeMap::from([(DEFAULT_VECTOR_NAME.to_string(), params)])
            }
            Some(VectorsConfigDto::Named(map)) => map,
            None => BTreeMap::new(),
        };

        // Only scalar quantization is modelled; product/binary configs are reported as none.
        let quantization = self
            .config
            .quantization_config
            .as_ref()
            .and_then(|q| q.get("scalar"))
            .and_then(|s| serde_json::from_value::<ScalarDto>(s.clone()).ok())
            .map(|s| ScalarQuantization {
                kind: ScalarType::Int8,
                quantile: s.quantile.unwrap_or(1.0),
                always_ram: s.always_ram.unwrap_or(false),
            });

        CollectionInfo {
            name: name.to_string(),
            status: self.status,
            vectors,
            quantization,
            hnsw_m: self.config.hnsw_config.and_then(|h| h.m),
            replication_factor: self.config.params.replication_factor,
            shard_number: self.config.params.shard_number,
            points_count: self.points_count,
        }
    }
}

#[derive(Serialize)]
struct UpsertBody<'a> {
    points: Vec<PointBody<'a>>,
}

#[derive(Serialize)]
struct PointBody<'a> {
    id: PointId,
    vector: VectorInput<'a>,
    payload: &'a Payload,
}

/// A point holding only the unnamed vector is sent in the plain array form.
#[derive(Serialize)]
#[serde(untagged)]
enum VectorInput<'a> {
    Single(&'a [f32]),
    Named(&'a NamedVectors),
}

impl<'a> From<&'a Point> for PointBody<'a> {
    fn from(point: &'a Point) -> Self {
        let vector = match point.vector(DEFAULT_VECTOR_NAME) {
            Some(v) if point.vectors.len() == 1 => VectorInput::Single(v),
            _ => VectorInput::Named(&point.vectors),
        };
        Self {
            id: point.id,
            vector,
            payload: &point.payload,
        }
    }
}

#[derive(Serialize)]
struct RetrieveBody<'a> {
    ids: &'a [PointId],
    with_payload: bool,
    with_vector: bool,
}

#[derive(Deserialize)]
struct RecordIdDto {
    id: PointId,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a [f32],
    #[serde(skip_serializing_if = "str::is_empty")]
    using: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Filter>,
    limit: usize,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Deserialize)]
struct QueryResult {
    points: Vec<ScoredPointDto>,
}

#[derive(Deserialize)]
struct ScoredPointDto {
    id: PointId,
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
    #[serde(default)]
    vector: Option<VectorOutput>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VectorOutput {
    Single(Vec<f32>),
    Named(NamedVectors),
}

impl VectorOutput {
    fn into_named(self) -> NamedVectors {
        match self {
            VectorOutput::Single(v) => NamedVectors::from([(DEFAULT_VECTOR_NAME.to_string(), v)]),
            VectorOutput::Named(map) => map,
        }
    }
}

#[derive(Serialize)]
struct CountBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Filter>,
    exact: bool,
}

#[derive(Deserialize)]
struct CountResult {
    count: u64,
}

#[derive(Serialize)]
struct ScrollBody {
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<PointId>,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<RecordDto>,
    #[serde(default)]
    next_page_offset: Option<PointId>,
}

#[derive(Deserialize)]
struct RecordDto {
    id: PointId,
    #[serde(default)]
    payload: Option<Payload>,
    #[serde(default)]
    vector: Option<VectorOutput>,
}
