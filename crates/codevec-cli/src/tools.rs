//! Codebase tools: update, query and inspection commands rendered as text.
//!
//! The `try_` variants return failures as errors; the others render them as
//! a message naming the operation.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};

use codevec_index::{
    to_embedding_units, CodebaseIndexer, EmbeddingProvider, IndexerSettings, JavaParser,
    QueryEngine, QueryHit, SourceWalker, VectorStore,
};

/// Lines of file content shown per hit.
pub const EXCERPT_LINES: usize = 40;

/// Update and query tools over one embedding provider and vector store.
pub struct CodebaseTools<E: EmbeddingProvider, S: VectorStore> {
    indexer: CodebaseIndexer<E, S>,
    engine: QueryEngine<E, S>,
    default_limit: usize,
}

impl<E: EmbeddingProvider, S: VectorStore> CodebaseTools<E, S> {
    pub fn new(
        embeddings: Arc<E>,
        store: Arc<S>,
        parser: JavaParser,
        walker: SourceWalker,
        collection_name: &str,
        default_limit: usize,
    ) -> Self {
        let indexer = CodebaseIndexer::new(
            embeddings.clone(),
            store.clone(),
            parser,
            walker,
            IndexerSettings {
                collection_name: collection_name.to_string(),
            },
        );
        let engine = QueryEngine::new(embeddings, store, collection_name);

        Self {
            indexer,
            engine,
            default_limit,
        }
    }

    /// Re-index `project` from `path`, describing the outcome either way.
    pub async fn update_codebase(&self, project: &str, path: &str) -> String {
        self.try_update_codebase(project, path)
            .await
            .unwrap_or_else(|e| format!("{:#}", e))
    }

    /// Re-index `project` from `path`; a failed update is an error whose
    /// message reads "Error updating codebase: ...".
    pub async fn try_update_codebase(&self, project: &str, path: &str) -> Result<String> {
        info!("Updating codebase for project '{}' at {}", project, path);

        match self.indexer.update(project, Path::new(path)).await {
            Ok(stats) => Ok(format!(
                "Successfully updated codebase for project '{}'\n\
                 Files found: {}, parsed: {}, skipped: {}\n\
                 Vectors stored: {} ({} embedding calls, {} ms)",
                project,
                stats.files_found,
                stats.files_parsed,
                stats.files_skipped,
                stats.vectors_stored,
                stats.embedding_calls,
                stats.duration_ms
            )),
            Err(e) => {
                warn!("Error updating codebase: {}", e);
                Err(anyhow::Error::new(e).context("Error updating codebase"))
            }
        }
    }

    /// Answer `question` against `project`, up to `limit` hits.
    pub async fn read_codebase(&self, project: &str, question: &str, limit: Option<usize>) -> String {
        let limit = limit.unwrap_or(self.default_limit);
        let hits = self.engine.query(project, question, limit).await;
        render_hits(question, &hits)
    }

    /// Same query as [`read_codebase`](Self::read_codebase), as pretty JSON.
    pub async fn read_codebase_json(
        &self,
        project: &str,
        question: &str,
        limit: Option<usize>,
    ) -> Result<String> {
        let limit = limit.unwrap_or(self.default_limit);

        let result = match self.engine.try_query(project, question, limit).await {
            Ok(hits) => json!({
                "status": "success",
                "query": question,
                "project": project,
                "count": hits.len(),
                "results": hits,
            }),
            Err(e) => {
                warn!("Error querying codebase: {}", e);
                json!({
                    "status": "error",
                    "message": format!("Error querying codebase: {}", e),
                })
            }
        };

        Ok(serde_json::to_string_pretty(&result)?)
    }
}

/// Number of files under `path` that parse successfully.
pub fn files_count(parser: &mut JavaParser, walker: &SourceWalker, path: &str) -> String {
    let records = parser.parse_directory(Path::new(path), walker);
    format!("Files count: {}", records.len())
}

/// Number of embedding units `path` would produce.
pub fn get_points_for_vector(parser: &mut JavaParser, walker: &SourceWalker, path: &str) -> String {
    let records = parser.parse_directory(Path::new(path), walker);
    format!("Points: {}", to_embedding_units(&records).len())
}

/// Render query hits as numbered text blocks.
pub fn render_hits(question: &str, hits: &[QueryHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for query: {}", question);
    }

    let mut out = format!("Query: {}\n\nResults:\n", question);

    for (i, hit) in hits.iter().enumerate() {
        let metadata = &hit.payload.metadata;

        out.push_str(&format!(
            "\n--- Result {} (similarity: {:.4}) ---\n",
            i + 1,
            hit.score
        ));
        out.push_str(&format!("File: {}\n", or_unknown(&metadata.file_path)));
        out.push_str(&format!("Type: {}\n", or_unknown(&hit.payload.code_type)));
        if !metadata.primary_class_name.is_empty() {
            out.push_str(&format!("Class: {}\n", metadata.primary_class_name));
        }
        if !metadata.method_names.is_empty() {
            out.push_str(&format!("Methods: {}\n", metadata.method_names.join(", ")));
        }
        out.push_str(&format!("\n{}\n", excerpt(&hit.payload.content)));
    }

    out
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "Unknown"
    } else {
        value
    }
}

fn excerpt(content: &str) -> String {
    if content.is_empty() {
        return "No content available".to_string();
    }

    let total = content.lines().count();
    let mut shown: Vec<&str> = content.lines().take(EXCERPT_LINES).collect();
    if total > EXCERPT_LINES {
        shown.push("...");
    }
    shown.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use codevec_index::{PointPayload, VectorMetadata};

    fn hit(score: f32, class: &str, methods: &[&str], content: &str) -> QueryHit {
        QueryHit {
            score,
            payload: PointPayload {
                project_name: "proj".to_string(),
                code_type: "file".to_string(),
                metadata: VectorMetadata {
                    file_path: format!("src/{}.java", class),
                    package_name: "com.x".to_string(),
                    primary_class_name: class.to_string(),
                    method_names: methods.iter().map(|m| m.to_string()).collect(),
                    field_names: Vec::new(),
                },
                content: content.to_string(),
                size_in_lines: content.lines().count(),
            },
        }
    }

    #[test]
    fn test_render_no_hits() {
        assert_eq!(
            render_hits("where is auth?", &[]),
            "No results found for query: where is auth?"
        );
    }

    #[test]
    fn test_render_blocks() {
        let hits = vec![
            hit(0.91234, "UserService", &["findUser", "save"], "class UserService {}"),
            hit(0.5, "", &[], ""),
        ];

        let text = render_hits("users", &hits);

        assert!(text.starts_with("Query: users\n\nResults:\n"));
        assert!(text.contains("--- Result 1 (similarity: 0.9123) ---"));
        assert!(text.contains("File: src/UserService.java"));
        assert!(text.contains("Type: file"));
        assert!(text.contains("Class: UserService"));
        assert!(text.contains("Methods: findUser, save"));
        assert!(text.contains("class UserService {}"));

        let second = text.split("--- Result 2").nth(1).unwrap();
        assert!(second.contains("(similarity: 0.5000)"));
        assert!(!second.contains("Class:"));
        assert!(!second.contains("Methods:"));
        assert!(second.contains("No content available"));
    }

    #[test]
    fn test_excerpt_truncates_long_files() {
        let content: Vec<String> = (0..EXCERPT_LINES + 10).map(|i| format!("line {}", i)).collect();
        let shown = excerpt(&content.join("\n"));

        assert_eq!(shown.lines().count(), EXCERPT_LINES + 1);
        assert!(shown.ends_with("..."));
        assert!(!shown.contains(&format!("line {}", EXCERPT_LINES)));
    }
}
