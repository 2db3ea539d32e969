//! Vector storage backends.
//!
//! [`VectorStore`] is the seam between the indexing pipeline and the vector
//! database. [`QdrantStore`] talks to a Qdrant server; [`InMemoryStore`] keeps
//! everything in process.

pub mod memory;
pub mod qdrant;

pub use memory::InMemoryStore;
pub use qdrant::{QdrantConfig, QdrantStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::{EmbeddingUnit, VectorMetadata};

/// Payload `code_type` for whole-file units.
pub const CODE_TYPE_FILE: &str = "file";

/// Errors reported by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Collection {0} does not exist")]
    CollectionMissing(String),

    #[error("Got {vectors} vectors but {payloads} payloads")]
    LengthMismatch { vectors: usize, payloads: usize },

    #[error("Vector has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Refusing to delete with an empty filter")]
    EmptyFilter,

    #[error("Storage backend error: {0:#}")]
    Backend(#[source] anyhow::Error),
}

/// Metadata stored with each vector point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    /// Project the point belongs to
    pub project_name: String,

    /// Granularity of the embedded text ("file")
    pub code_type: String,

    #[serde(flatten)]
    pub metadata: VectorMetadata,

    /// The embedded source text
    pub content: String,

    /// Line count of the source file
    pub size_in_lines: usize,
}

impl PointPayload {
    /// Build the payload stored for `unit` under `project_name`.
    pub fn from_unit(project_name: &str, unit: &EmbeddingUnit) -> Self {
        Self {
            project_name: project_name.to_string(),
            code_type: CODE_TYPE_FILE.to_string(),
            metadata: unit.metadata.clone(),
            content: unit.transfer_body.clone(),
            size_in_lines: unit.size_in_lines,
        }
    }
}

/// A search hit returned by a backend.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Point ID
    pub id: String,

    /// Cosine similarity (higher is closer)
    pub score: f32,

    pub payload: PointPayload,
}

/// Payload conditions; every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadFilter {
    pub project_name: Option<String>,
}

impl PayloadFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one project.
    pub fn project(name: impl Into<String>) -> Self {
        Self {
            project_name: Some(name.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.project_name.is_none()
    }

    pub fn matches(&self, payload: &PointPayload) -> bool {
        self.project_name
            .as_ref()
            .map_or(true, |p| *p == payload.project_name)
    }
}

/// Storage operations the pipeline needs from a vector database.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist yet.
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<(), StorageError>;

    /// Store `vectors[i]` with `payloads[i]`, all in one write.
    async fn upsert(
        &self,
        name: &str,
        vectors: Vec<Vec<f32>>,
        payloads: Vec<PointPayload>,
    ) -> Result<(), StorageError>;

    /// Nearest neighbours of `vector` among points matching `filter`,
    /// most similar first.
    async fn search(
        &self,
        name: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: &PayloadFilter,
    ) -> Result<Vec<SearchHit>, StorageError>;

    /// Delete every point matching `filter`.
    async fn delete_where(&self, name: &str, filter: &PayloadFilter) -> Result<(), StorageError>;

    async fn exists(&self, name: &str) -> Result<bool, StorageError>;
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
