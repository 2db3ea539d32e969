//! Semantic search over an indexed project.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::embeddings::EmbeddingProvider;
use crate::storage::{PayloadFilter, PointPayload, StorageError, VectorStore};

/// Errors from a query.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Failed to embed query: {0:#}")]
    Embedding(#[source] anyhow::Error),

    #[error("Search failed: {0}")]
    Storage(#[from] StorageError),
}

/// One search result.
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    /// Cosine similarity, higher is closer
    pub score: f32,
    pub payload: PointPayload,
}

/// Answers natural-language questions against a project's stored vectors.
pub struct QueryEngine<E: EmbeddingProvider, S: VectorStore> {
    embeddings: Arc<E>,
    store: Arc<S>,
    collection_name: String,
}

impl<E: EmbeddingProvider, S: VectorStore> QueryEngine<E, S> {
    /// `embeddings` must be the provider the project was indexed with.
    pub fn new(embeddings: Arc<E>, store: Arc<S>, collection_name: impl Into<String>) -> Self {
        Self {
            embeddings,
            store,
            collection_name: collection_name.into(),
        }
    }

    /// Up to `limit` nearest files of `project`, in the store's order.
    ///
    /// A collection that was never created yields no hits.
    pub async fn try_query(
        &self,
        project: &str,
        question: &str,
        limit: usize,
    ) -> Result<Vec<QueryHit>, QueryError> {
        if !self.store.exists(&self.collection_name).await? {
            debug!("Collection {} does not exist yet", self.collection_name);
            return Ok(Vec::new());
        }

        let vector = self
            .embeddings
            .embed(question)
            .await
            .map_err(QueryError::Embedding)?;

        let hits = self
            .store
            .search(
                &self.collection_name,
                vector,
                limit,
                &PayloadFilter::project(project),
            )
            .await?;

        debug!("Query for project '{}' returned {} hits", project, hits.len());

        Ok(hits
            .into_iter()
            .map(|hit| QueryHit {
                score: hit.score,
                payload: hit.payload,
            })
            .collect())
    }

    /// Like [`try_query`](Self::try_query), but logs failures and returns no hits.
    pub async fn query(&self, project: &str, question: &str, limit: usize) -> Vec<QueryHit> {
        match self.try_query(project, question, limit).await {
            Ok(hits) => hits,
            Err(e) => {
                error!("Query for project '{}' failed: {}", project, e);
                Vec::new()
            }
        }
    }
}
