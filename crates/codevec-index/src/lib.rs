//! Java codebase indexing and semantic search.
//!
//! This crate provides:
//! - Structure extraction from Java sources using tree-sitter
//! - Source discovery with directory exclusions
//! - Whole-file embedding units with class metadata
//! - Embedding generation via an OpenAI-compatible API
//! - Vector storage in Qdrant, or in memory
//! - Project-scoped update and query orchestration

pub mod embeddings;
pub mod indexer;
pub mod mapper;
pub mod parser;
pub mod query;
pub mod records;
pub mod storage;
pub mod walker;

// Re-exports
pub use embeddings::{EmbeddingProvider, HttpEmbeddings, HttpEmbeddingsConfig};
pub use indexer::{CodebaseIndexer, IndexError, IndexerSettings, UpdatePhase, UpdateStats};
pub use mapper::{to_embedding_unit, to_embedding_units};
pub use parser::{JavaParser, ParseError, ParserConfig};
pub use query::{QueryEngine, QueryError, QueryHit};
pub use records::{
    ClassRecord, EmbeddingUnit, FieldRecord, FileRecord, MethodRecord, ParameterRecord, Span,
    VectorMetadata,
};
pub use storage::{
    InMemoryStore, PayloadFilter, PointPayload, QdrantConfig, QdrantStore, SearchHit,
    StorageError, VectorStore,
};
pub use walker::SourceWalker;

/// Default vector store collection name
pub const DEFAULT_COLLECTION: &str = "code_vectors";

/// Default embedding dimensions (text-embedding-3-large)
pub const DEFAULT_DIMENSIONS: usize = 3072;
