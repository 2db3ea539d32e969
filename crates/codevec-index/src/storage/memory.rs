//! In-process vector store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{cosine_similarity, PayloadFilter, PointPayload, SearchHit, StorageError, VectorStore};

#[derive(Debug, Clone)]
struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: PointPayload,
}

#[derive(Debug, Default)]
struct Collection {
    dimension: usize,
    points: Vec<StoredPoint>,
}

/// [`VectorStore`] that keeps collections in memory with exact cosine search.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points in a collection (0 if it does not exist).
    pub async fn count(&self, name: &str) -> usize {
        self.collections
            .read()
            .await
            .get(name)
            .map_or(0, |c| c.points.len())
    }

    /// All `(vector, payload)` pairs of a collection in insertion order.
    pub async fn points(&self, name: &str) -> Vec<(Vec<f32>, PointPayload)> {
        self.collections
            .read()
            .await
            .get(name)
            .map(|c| {
                c.points
                    .iter()
                    .map(|p| (p.vector.clone(), p.payload.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<(), StorageError> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_insert_with(|| {
            debug!("Creating in-memory collection {} ({} dims)", name, dimension);
            Collection {
                dimension,
                points: Vec::new(),
            }
        });
        Ok(())
    }

    async fn upsert(
        &self,
        name: &str,
        vectors: Vec<Vec<f32>>,
        payloads: Vec<PointPayload>,
    ) -> Result<(), StorageError> {
        if vectors.len() != payloads.len() {
            return Err(StorageError::LengthMismatch {
                vectors: vectors.len(),
                payloads: payloads.len(),
            });
        }

        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| StorageError::CollectionMissing(name.to_string()))?;

        // Validate everything before writing anything.
        if let Some(bad) = vectors.iter().find(|v| v.len() != collection.dimension) {
            return Err(StorageError::DimensionMismatch {
                expected: collection.dimension,
                actual: bad.len(),
            });
        }

        collection
            .points
            .extend(vectors.into_iter().zip(payloads).map(|(vector, payload)| StoredPoint {
                id: Uuid::new_v4().to_string(),
                vector,
                payload,
            }));

        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: &PayloadFilter,
    ) -> Result<Vec<SearchHit>, StorageError> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| StorageError::CollectionMissing(name.to_string()))?;

        if vector.len() != collection.dimension {
            return Err(StorageError::DimensionMismatch {
                expected: collection.dimension,
                actual: vector.len(),
            });
        }

        let mut hits: Vec<SearchHit> = collection
            .points
            .iter()
            .filter(|p| filter.matches(&p.payload))
            .map(|p| SearchHit {
                id: p.id.clone(),
                score: cosine_similarity(&vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);

        Ok(hits)
    }

    async fn delete_where(&self, name: &str, filter: &PayloadFilter) -> Result<(), StorageError> {
        if filter.is_empty() {
            return Err(StorageError::EmptyFilter);
        }

        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| StorageError::CollectionMissing(name.to_string()))?;

        let before = collection.points.len();
        collection.points.retain(|p| !filter.matches(&p.payload));
        debug!(
            "Deleted {} points from {}",
            before - collection.points.len(),
            name
        );

        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.collections.read().await.contains_key(name))
    }
}
