//! Main indexer orchestrator.
//!
//! The indexer coordinates the walker, parser, embedding provider and vector
//! store to (re)index one project. Each update wipes the project's previous
//! vectors and stores a fresh set, one vector per parsed file.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::embeddings::EmbeddingProvider;
use crate::mapper::to_embedding_unit;
use crate::parser::JavaParser;
use crate::records::EmbeddingUnit;
use crate::storage::{PayloadFilter, PointPayload, VectorStore};
use crate::walker::SourceWalker;

/// Steps of a single update, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePhase {
    /// Collection setup and removal of the project's previous vectors
    DeletingOldVectors,
    Walking,
    /// Parsing and mapping to embedding units
    Parsing,
    Embedding,
    Storing,
    Done,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdatePhase::DeletingOldVectors => "deleting old vectors",
            UpdatePhase::Walking => "walking",
            UpdatePhase::Parsing => "parsing",
            UpdatePhase::Embedding => "embedding",
            UpdatePhase::Storing => "storing",
            UpdatePhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Errors that abort an update.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("update of project '{project}' failed while {phase}: {source:#}")]
    Failed {
        project: String,
        phase: UpdatePhase,
        #[source]
        source: anyhow::Error,
    },
}

impl IndexError {
    fn failed(project: &str, phase: UpdatePhase, source: impl Into<anyhow::Error>) -> Self {
        IndexError::Failed {
            project: project.to_string(),
            phase,
            source: source.into(),
        }
    }

    /// Phase the update was in when it failed.
    pub fn phase(&self) -> UpdatePhase {
        match self {
            IndexError::Failed { phase, .. } => *phase,
        }
    }
}

/// Settings for the indexer.
#[derive(Debug, Clone)]
pub struct IndexerSettings {
    /// Vector store collection name
    pub collection_name: String,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            collection_name: crate::DEFAULT_COLLECTION.to_string(),
        }
    }
}

/// Statistics about one update.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateStats {
    /// Source files found by the walker
    pub files_found: usize,
    /// Files parsed successfully
    pub files_parsed: usize,
    /// Files skipped because they failed to parse
    pub files_skipped: usize,
    /// Vectors written to the store
    pub vectors_stored: usize,
    /// Number of embedding API calls
    pub embedding_calls: usize,
    /// Total time in milliseconds
    pub duration_ms: u64,
}

/// Orchestrates indexing of whole projects into a vector store.
pub struct CodebaseIndexer<E: EmbeddingProvider, S: VectorStore> {
    embeddings: Arc<E>,
    store: Arc<S>,
    parser: Mutex<JavaParser>,
    walker: SourceWalker,
    settings: IndexerSettings,
    project_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<E: EmbeddingProvider, S: VectorStore> CodebaseIndexer<E, S> {
    pub fn new(
        embeddings: Arc<E>,
        store: Arc<S>,
        parser: JavaParser,
        walker: SourceWalker,
        settings: IndexerSettings,
    ) -> Self {
        Self {
            embeddings,
            store,
            parser: Mutex::new(parser),
            walker,
            settings,
            project_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &IndexerSettings {
        &self.settings
    }

    pub fn walker(&self) -> &SourceWalker {
        &self.walker
    }

    /// Re-index `project` from the source tree at `root`.
    ///
    /// Updates of the same project are serialized; different projects run
    /// concurrently. Files that fail to parse are skipped. A failure of the
    /// embedding provider or the store aborts the update, and vectors deleted
    /// in the first phase are not restored.
    pub async fn update(&self, project: &str, root: &Path) -> Result<UpdateStats, IndexError> {
        let lock = self.project_lock(project).await;
        let result = {
            let _guard = lock.lock().await;
            self.run_update(project, root).await
        };
        self.release_project_lock(project, lock).await;
        result
    }

    async fn run_update(&self, project: &str, root: &Path) -> Result<UpdateStats, IndexError> {
        let start = Instant::now();
        let collection = &self.settings.collection_name;
        let mut stats = UpdateStats::default();

        info!("Updating codebase for project '{}' from {:?}", project, root);

        // Phase 1: clear the project's previous vectors
        let phase = UpdatePhase::DeletingOldVectors;
        debug!("Phase: {}", phase);
        self.store
            .ensure_collection(collection, self.embeddings.dimensions())
            .await
            .map_err(|e| IndexError::failed(project, phase, e))?;
        self.store
            .delete_where(collection, &PayloadFilter::project(project))
            .await
            .map_err(|e| IndexError::failed(project, phase, e))?;

        // Phase 2: find source files
        debug!("Phase: {}", UpdatePhase::Walking);
        let files = self.walker.find_source_files(root);
        stats.files_found = files.len();
        info!("Found {} files to index", files.len());

        // Phase 3: parse and map
        debug!("Phase: {}", UpdatePhase::Parsing);
        let mut units = Vec::with_capacity(files.len());
        {
            let mut parser = self.parser.lock().await;
            for path in &files {
                match parser.parse(path) {
                    Ok(record) => {
                        stats.files_parsed += 1;
                        units.push(to_embedding_unit(&record));
                    }
                    Err(e) => {
                        warn!("Skipping file {:?}: {}", path, e);
                        stats.files_skipped += 1;
                    }
                }
            }
        }

        if units.is_empty() {
            stats.duration_ms = start.elapsed().as_millis() as u64;
            info!("No files parsed for project '{}', nothing to store", project);
            return Ok(stats);
        }

        // Phase 4: embed
        let phase = UpdatePhase::Embedding;
        debug!("Phase: {}", phase);
        let vectors = self
            .embed_units(&units, &mut stats)
            .await
            .map_err(|e| IndexError::failed(project, phase, e))?;

        // Phase 5: store everything in one write
        let phase = UpdatePhase::Storing;
        debug!("Phase: {}", phase);
        let payloads: Vec<PointPayload> = units
            .iter()
            .map(|unit| PointPayload::from_unit(project, unit))
            .collect();
        let count = vectors.len();
        self.store
            .upsert(collection, vectors, payloads)
            .await
            .map_err(|e| IndexError::failed(project, phase, e))?;
        stats.vectors_stored = count;

        stats.duration_ms = start.elapsed().as_millis() as u64;
        debug!("Phase: {}", UpdatePhase::Done);
        info!("Update of project '{}' complete: {:?}", project, stats);
        Ok(stats)
    }

    /// Walk, parse and map `root` without touching any backend.
    pub async fn scan(&self, root: &Path) -> Vec<EmbeddingUnit> {
        let records = self.parser.lock().await.parse_directory(root, &self.walker);
        records.iter().map(to_embedding_unit).collect()
    }

    /// Embed unit bodies batch by batch, keeping `vectors[i]` paired with `units[i]`.
    async fn embed_units(
        &self,
        units: &[EmbeddingUnit],
        stats: &mut UpdateStats,
    ) -> anyhow::Result<Vec<Vec<f32>>> {
        let batch_size = self.embeddings.max_batch_size().max(1);
        let mut vectors = Vec::with_capacity(units.len());

        for batch in units.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|u| u.transfer_body.clone()).collect();

            let embeddings = self.embeddings.embed_batch(&texts).await?;
            stats.embedding_calls += 1;

            if embeddings.len() != texts.len() {
                return Err(anyhow!(
                    "embedding provider returned {} vectors for {} texts",
                    embeddings.len(),
                    texts.len()
                ));
            }

            vectors.extend(embeddings);
        }

        Ok(vectors)
    }

    async fn project_lock(&self, project: &str) -> Arc<Mutex<()>> {
        let mut locks = self.project_locks.lock().await;
        locks
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forget the project's lock once no other update holds or awaits it.
    async fn release_project_lock(&self, project: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.project_locks.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(project);
        }
    }
}
