//! Embedding provider trait and implementations.
//!
//! This module defines the interface for generating embeddings
//! and provides an OpenAI-compatible HTTP implementation.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_EMBEDDINGS_URL: &str = "https://openrouter.ai/api/v1/embeddings";
pub const DEFAULT_EMBEDDING_MODEL: &str = "openai/text-embedding-3-large";

/// Errors that can occur during embedding generation.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("API request failed ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited after {0} retries")]
    RateLimited(u32),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Trait for embedding providers.
///
/// `embed_batch` must return one vector per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts in a batch
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the number of dimensions
    fn dimensions(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the maximum batch size supported.
    fn max_batch_size(&self) -> usize {
        32
    }
}

/// Normalize source text before embedding.
///
/// Drops blank lines and collapses whitespace runs inside each line while
/// keeping the leading indentation.
pub fn preprocess_code(code: &str) -> String {
    code.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let body = line.trim_start();
            let indent = &line[..line.len() - body.len()];
            let collapsed: Vec<&str> = body.split_whitespace().collect();
            format!("{}{}", indent, collapsed.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Settings for [`HttpEmbeddings`].
#[derive(Debug, Clone)]
pub struct HttpEmbeddingsConfig {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub base_url: String,
    pub timeout: Duration,
    pub max_batch_size: usize,
    pub max_retries: u32,
}

impl Default for HttpEmbeddingsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: crate::DEFAULT_DIMENSIONS,
            base_url: DEFAULT_EMBEDDINGS_URL.to_string(),
            timeout: Duration::from_secs(60),
            max_batch_size: 32,
            max_retries: 3,
        }
    }
}

/// Request body for embedding API
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response from embedding API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Individual embedding data in response
#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Embedding provider speaking the OpenAI-compatible `/embeddings` protocol.
pub struct HttpEmbeddings {
    config: HttpEmbeddingsConfig,
    client: Client,
}

impl HttpEmbeddings {
    pub fn new(config: HttpEmbeddingsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(EmbeddingError::from)?;

        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Send embedding request with retry logic for rate limits.
    async fn send_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request_body = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        let mut retry_count = 0;
        let mut backoff_secs = 1u64;

        loop {
            debug!(
                "Sending embedding request for {} texts to {}",
                texts.len(),
                self.config.base_url
            );

            let response = self
                .client
                .post(&self.config.base_url)
                .bearer_auth(&self.config.api_key)
                .json(&request_body)
                .send()
                .await
                .map_err(EmbeddingError::from)?;

            let status = response.status();

            if status.is_success() {
                let embedding_response: EmbeddingResponse = response
                    .json()
                    .await
                    .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

                return Ok(order_by_index(embedding_response.data, texts.len())?);
            }

            if status.as_u16() == 429 {
                retry_count += 1;
                if retry_count > self.config.max_retries {
                    return Err(EmbeddingError::RateLimited(self.config.max_retries).into());
                }

                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(backoff_secs);

                warn!(
                    "Rate limited, retrying after {} seconds (attempt {}/{})",
                    retry_after, retry_count, self.config.max_retries
                );

                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                backoff_secs *= 2;
                continue;
            }

            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EmbeddingError::ApiError {
                status: status.as_u16(),
                body,
            }
            .into());
        }
    }
}

/// Sort response items by their `index` and check the indices are exactly `0..expected`.
fn order_by_index(
    data: Vec<EmbeddingData>,
    expected: usize,
) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }

    let mut embeddings: Vec<(usize, Vec<f32>)> =
        data.into_iter().map(|d| (d.index, d.embedding)).collect();
    embeddings.sort_by_key(|(idx, _)| *idx);

    if let Some((position, (idx, _))) = embeddings
        .iter()
        .enumerate()
        .find(|(position, (idx, _))| idx != position)
    {
        return Err(EmbeddingError::InvalidResponse(format!(
            "embedding index {} found at position {}, expected indices 0..{}",
            idx, position, expected
        )));
    }

    Ok(embeddings.into_iter().map(|(_, emb)| emb).collect())
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".into()).into())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Embedding batch of {} texts", texts.len());
        let processed: Vec<String> = texts.iter().map(|t| preprocess_code(t)).collect();
        self.send_request(&processed).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn max_batch_size(&self) -> usize {
        self.config.max_batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = HttpEmbeddings::new(HttpEmbeddingsConfig {
            api_key: "test-key".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(provider.dimensions(), crate::DEFAULT_DIMENSIONS);
        assert_eq!(provider.model_name(), DEFAULT_EMBEDDING_MODEL);
        assert_eq!(provider.max_batch_size(), 32);
        assert_eq!(provider.base_url(), DEFAULT_EMBEDDINGS_URL);
    }

    #[test]
    fn test_provider_custom_model() {
        let provider = HttpEmbeddings::new(HttpEmbeddingsConfig {
            model: "custom/model".to_string(),
            dimensions: 1024,
            base_url: "http://localhost:8080/embeddings".to_string(),
            max_batch_size: 8,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(provider.dimensions(), 1024);
        assert_eq!(provider.model_name(), "custom/model");
        assert_eq!(provider.max_batch_size(), 8);
        assert_eq!(provider.base_url(), "http://localhost:8080/embeddings");
    }

    #[test]
    fn test_preprocess_drops_blank_lines_and_keeps_indent() {
        let code = "class A {\n\n    int   x  =  1;\n   \n\tvoid m( ) {}\n}\n";
        assert_eq!(
            preprocess_code(code),
            "class A {\n    int x = 1;\n\tvoid m( ) {}\n}"
        );
    }

    #[test]
    fn test_preprocess_empty_input() {
        assert_eq!(preprocess_code(""), "");
        assert_eq!(preprocess_code("\n  \n\t\n"), "");
    }

    #[test]
    fn test_order_by_index_restores_input_order() {
        let data = vec![
            EmbeddingData { embedding: vec![2.0], index: 2 },
            EmbeddingData { embedding: vec![0.0], index: 0 },
            EmbeddingData { embedding: vec![1.0], index: 1 },
        ];
        let ordered = order_by_index(data, 3).unwrap();
        assert_eq!(ordered, vec![vec![0.0], vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_order_by_index_rejects_duplicate_indices() {
        let data = vec![
            EmbeddingData { embedding: vec![0.0], index: 0 },
            EmbeddingData { embedding: vec![1.0], index: 1 },
            EmbeddingData { embedding: vec![1.5], index: 1 },
        ];
        assert!(matches!(
            order_by_index(data, 3),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_order_by_index_rejects_out_of_range_index() {
        let data = vec![
            EmbeddingData { embedding: vec![0.0], index: 1 },
            EmbeddingData { embedding: vec![1.0], index: 2 },
        ];
        assert!(matches!(
            order_by_index(data, 2),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_order_by_index_rejects_short_response() {
        let data = vec![EmbeddingData { embedding: vec![0.0], index: 0 }];
        assert!(matches!(
            order_by_index(data, 2),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }
}
