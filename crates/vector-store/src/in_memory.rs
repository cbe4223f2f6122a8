//! In-process vector store for tests and local dry runs.
//!
//! Scores by brute force over every stored point. Enforces collection schemas
//! the way the server does and can inject faults into individual calls.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use vector_types::{
    CollectionInfo, CollectionSpec, CollectionStatus, Distance, Filter, Point, PointId,
    QueryRequest, ScoredResult, ScrollPage,
};

use crate::error::StoreError;
use crate::store::VectorStore;

/// Call counters, for asserting on traffic in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Points accepted by successful upserts
    pub upserted_points: u64,
    /// Upsert calls, failed ones included
    pub upsert_calls: u64,
    pub retrieve_calls: u64,
    pub query_calls: u64,
}

#[derive(Debug, Default)]
struct Faults {
    fail_existence_checks: bool,
    failing_upserts: u32,
    fail_queries: bool,
    fail_deletes: bool,
    status_delay: Option<Duration>,
}

struct StoredCollection {
    spec: CollectionSpec,
    points: BTreeMap<PointId, Point>,
    pinned_status: Option<CollectionStatus>,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, StoredCollection>,
    faults: Faults,
    stats: StoreStats,
}

/// Vector store held entirely in memory.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report `status` for a collection instead of green.
    pub fn pin_status(&self, collection: &str, status: CollectionStatus) {
        if let Some(c) = self.lock().collections.get_mut(collection) {
            c.pinned_status = Some(status);
        }
    }

    /// Make id existence checks fail until reset.
    pub fn fail_existence_checks(&self, fail: bool) {
        self.lock().faults.fail_existence_checks = fail;
    }

    /// Fail the next `n` upsert calls with a transient error.
    pub fn fail_next_upserts(&self, n: u32) {
        self.lock().faults.failing_upserts = n;
    }

    /// Delay every `get_collection` call by `delay` (tokio time).
    pub fn delay_status_checks(&self, delay: Duration) {
        self.lock().faults.status_delay = Some(delay);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.lock().faults.fail_queries = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.lock().faults.fail_deletes = fail;
    }

    pub fn stats(&self) -> StoreStats {
        self.lock().stats
    }

    /// Number of points stored in a collection (0 if it does not exist).
    pub fn point_count(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map_or(0, |c| c.points.len())
    }

    /// Copy of a stored point.
    pub fn point(&self, collection: &str, id: PointId) -> Option<Point> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|c| c.points.get(&id).cloned())
    }
}

fn not_found(collection: &str) -> StoreError {
    StoreError::NotFound(format!("Collection `{}` doesn't exist", collection))
}

fn bad_request(message: String) -> StoreError {
    StoreError::Api {
        status: 400,
        message,
    }
}

fn score(distance: Distance, a: &[f32], b: &[f32]) -> f32 {
    let pairs = a.iter().zip(b);
    match distance {
        Distance::Dot => pairs.map(|(x, y)| x * y).sum(),
        Distance::Cosine => {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                0.0
            } else {
                dot / (norm_a * norm_b)
            }
        }
        Distance::Euclid => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt(),
        Distance::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.lock().collections.contains_key(name))
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.collections.contains_key(&spec.name) {
            return Err(bad_request(format!(
                "Wrong input: Collection `{}` already exists!",
                spec.name
            )));
        }
        state.collections.insert(
            spec.name.clone(),
            StoredCollection {
                spec: spec.clone(),
                points: BTreeMap::new(),
                pinned_status: None,
            },
        );
        debug!(collection = %spec.name, "Created in-memory collection");
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionInfo, StoreError> {
        let delay = self.lock().faults.status_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.lock();
        let c = state.collections.get(name).ok_or_else(|| not_found(name))?;
        Ok(CollectionInfo {
            name: name.to_string(),
            status: c.pinned_status.unwrap_or(CollectionStatus::Green),
            vectors: c.spec.vectors.clone(),
            quantization: c.spec.quantization.clone(),
            hnsw_m: Some(c.spec.hnsw.m),
            replication_factor: Some(c.spec.replication_factor),
            shard_number: Some(c.spec.shard_number.unwrap_or(1)),
            points_count: Some(c.points.len() as u64),
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.lock().collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError> {
        let mut state = self.lock();
        if state.faults.fail_deletes {
            return Err(StoreError::Injected("delete failed".to_string()));
        }
        Ok(state.collections.remove(name).is_some())
    }

    async fn upsert_points(&self, collection: &str, points: &[Point]) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.stats.upsert_calls += 1;
        if state.faults.failing_upserts > 0 {
            state.faults.failing_upserts -= 1;
            return Err(StoreError::Injected("upsert failed".to_string()));
        }

        let c = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;

        // Reject the whole batch on the first bad point, like the server.
        for point in points {
            for (name, vector) in &point.vectors {
                let params = c.spec.vectors.get(name).ok_or_else(|| {
                    bad_request(format!("Wrong input: Not existing vector name: {}", name))
                })?;
                if vector.len() != params.size {
                    return Err(bad_request(format!(
                        "Wrong input: Vector dimension error: expected dim: {}, got {}",
                        params.size,
                        vector.len()
                    )));
                }
            }
        }

        for point in points {
            c.points.insert(point.id, point.clone());
        }
        state.stats.upserted_points += points.len() as u64;
        Ok(())
    }

    async fn retrieve_ids(
        &self,
        collection: &str,
        ids: &[PointId],
    ) -> Result<Vec<PointId>, StoreError> {
        let mut state = self.lock();
        state.stats.retrieve_calls += 1;
        if state.faults.fail_existence_checks {
            return Err(StoreError::Injected("retrieve failed".to_string()));
        }
        let c = state
            .collections
            .get(collection)
            .ok_or_else(|| not_found(collection))?;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| c.points.contains_key(id))
            .collect())
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<ScoredResult>, StoreError> {
        let mut state = self.lock();
        state.stats.query_calls += 1;
        if state.faults.fail_queries {
            return Err(StoreError::Injected("query failed".to_string()));
        }

        let c = state
            .collections
            .get(&request.collection)
            .ok_or_else(|| not_found(&request.collection))?;
        let params = c.spec.vectors.get(&request.using).ok_or_else(|| {
            bad_request(format!(
                "Wrong input: Not existing vector name: {}",
                request.using
            ))
        })?;
        if request.vector.len() != params.size {
            return Err(bad_request(format!(
                "Wrong input: Vector dimension error: expected dim: {}, got {}",
                params.size,
                request.vector.len()
            )));
        }

        let mut hits: Vec<(PointId, f32)> = c
            .points
            .values()
            .filter(|p| request.filter.as_ref().map_or(true, |f| f.matches(&p.payload)))
            .filter_map(|p| {
                p.vector(&request.using)
                    .map(|v| (p.id, score(params.distance, &request.vector, v)))
            })
            .collect();

        let higher_is_better = params.distance.higher_is_better();
        hits.sort_by(|(id_a, a), (id_b, b)| {
            let ord = if higher_is_better {
                b.total_cmp(a)
            } else {
                a.total_cmp(b)
            };
            ord.then(id_a.cmp(id_b))
        });
        hits.truncate(request.limit);

        Ok(hits
            .into_iter()
            .filter_map(|(id, score)| c.points.get(&id).map(|p| (p, score)))
            .map(|(p, score)| ScoredResult {
                id: p.id,
                score,
                payload: if request.with_payload {
                    p.payload.clone()
                } else {
                    Default::default()
                },
                vectors: request.with_vectors.then(|| p.vectors.clone()),
            })
            .collect())
    }

    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<u64, StoreError> {
        let state = self.lock();
        let c = state
            .collections
            .get(collection)
            .ok_or_else(|| not_found(collection))?;
        Ok(c.points
            .values()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.payload)))
            .count() as u64)
    }

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<PointId>,
    ) -> Result<ScrollPage, StoreError> {
        let state = self.lock();
        let c = state
            .collections
            .get(collection)
            .ok_or_else(|| not_found(collection))?;

        // The offset id is inclusive, matching the server.
        let mut remaining = c.points.range(offset.unwrap_or(0)..).map(|(_, p)| p);
        let points: Vec<Point> = remaining.by_ref().take(limit).cloned().collect();
        let next_offset = remaining.next().map(|p| p.id);
        Ok(ScrollPage {
            points,
            next_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vector_types::{Condition, HnswParams, VectorParams};

    fn spec(name: &str, distance: Distance) -> CollectionSpec {
        CollectionSpec {
            name: name.to_string(),
            vectors: BTreeMap::from([("image".to_string(), VectorParams::new(2, distance))]),
            quantization: None,
            hnsw: HnswParams::default(),
            max_segment_size: None,
            replication_factor: 1,
            shard_number: None,
        }
    }

    async fn seeded(distance: Distance) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create_collection(&spec("c", distance)).await.unwrap();
        let points = vec![
            Point::new(1)
                .with_vector("image", vec![0.1, 0.2])
                .with_payload("city", "London"),
            Point::new(2)
                .with_vector("image", vec![0.9, 0.9])
                .with_payload("city", "Berlin"),
            Point::new(3)
                .with_vector("image", vec![0.5, 0.4])
                .with_payload("city", "London"),
        ];
        store.upsert_points("c", &points).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_dot_query_orders_best_first() {
        let store = seeded(Distance::Dot).await;
        let results = store
            .query(&QueryRequest::new("c", "image", vec![0.9, 0.9], 1))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 2);
        assert_eq!(results[0].payload["city"], json!("Berlin"));
        assert!((results[0].score - 1.62).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_euclid_query_orders_smallest_distance_first() {
        let store = seeded(Distance::Euclid).await;
        let results = store
            .query(&QueryRequest::new("c", "image", vec![0.1, 0.2], 3))
            .await
            .unwrap();
        let ids: Vec<PointId> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
        assert!(results[0].score.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_filter_and_lean() {
        let store = seeded(Distance::Cosine).await;
        let request = QueryRequest::new("c", "image", vec![0.9, 0.9], 10)
            .with_filter(Some(Filter::must([Condition::matches_value(
                "city", "London",
            )])))
            .lean();
        let results = store.query(&request).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.payload.is_empty()));
        assert!(results.iter().all(|r| r.vectors.is_none()));
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let store = seeded(Distance::Dot).await;
        let err = store
            .upsert_points("c", &[Point::new(9).with_vector("image", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 400, .. }));
        assert_eq!(store.point_count("c"), 3);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let store = seeded(Distance::Dot).await;
        store
            .upsert_points(
                "c",
                &[Point::new(1)
                    .with_vector("image", vec![0.0, 0.0])
                    .with_payload("city", "Paris")],
            )
            .await
            .unwrap();
        assert_eq!(store.point_count("c"), 3);
        assert_eq!(store.point("c", 1).unwrap().payload["city"], json!("Paris"));
    }

    #[tokio::test]
    async fn test_retrieve_ids_and_faults() {
        let store = seeded(Distance::Dot).await;
        assert_eq!(store.retrieve_ids("c", &[1, 4, 3]).await.unwrap(), vec![1, 3]);

        store.fail_existence_checks(true);
        assert!(store.retrieve_ids("c", &[1]).await.is_err());

        store.fail_next_upserts(1);
        let point = Point::new(5).with_vector("image", vec![0.0, 1.0]);
        assert!(store
            .upsert_points("c", std::slice::from_ref(&point))
            .await
            .unwrap_err()
            .is_transient());
        store.upsert_points("c", &[point]).await.unwrap();
        assert_eq!(store.stats().upsert_calls, 3);
    }

    #[tokio::test]
    async fn test_scroll_pages() {
        let store = seeded(Distance::Dot).await;
        let page = store.scroll("c", 2, None).await.unwrap();
        assert_eq!(page.points.len(), 2);
        assert_eq!(page.next_offset, Some(3));

        let page = store.scroll("c", 2, page.next_offset).await.unwrap();
        assert_eq!(page.points.len(), 1);
        assert_eq!(page.points[0].id, 3);
        assert_eq!(page.next_offset, None);
    }

    #[tokio::test]
    async fn test_status_pinning_and_count() {
        let store = seeded(Distance::Dot).await;
        assert!(store.get_collection("c").await.unwrap().status.is_ready());

        store.pin_status("c", CollectionStatus::Yellow);
        assert_eq!(
            store.get_collection("c").await.unwrap().status,
            CollectionStatus::Yellow
        );

        let london = Filter::must([Condition::matches_value("city", "London")]);
        assert_eq!(store.count("c", Some(&london)).await.unwrap(), 2);
        assert_eq!(store.count("c", None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let store = InMemoryStore::new();
        assert!(!store.collection_exists("nope").await.unwrap());
        assert!(matches!(
            store.get_collection("nope").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.delete_collection("nope").await.unwrap());
    }
}
