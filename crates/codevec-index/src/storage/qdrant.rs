//! Qdrant vector database backend.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, ListValue,
    PointStruct, QuantizationType, ScalarQuantizationBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info};
use uuid::Uuid;

use super::{PayloadFilter, PointPayload, SearchHit, StorageError, VectorStore};
use crate::records::VectorMetadata;

/// Configuration for connecting to Qdrant.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Qdrant gRPC URL
    pub url: String,

    /// API key (optional)
    pub api_key: Option<String>,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
        }
    }
}

/// [`VectorStore`] backed by a Qdrant server.
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Create a client from configuration. No request is made until first use.
    pub fn from_config(config: &QdrantConfig) -> anyhow::Result<Self> {
        let mut builder = Qdrant::from_url(&config.url).skip_compatibility_check();

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder.build().context("Failed to connect to Qdrant")?;
        info!("Connected to Qdrant at {}", config.url);

        Ok(Self { client })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    /// Creates the collection with cosine distance and int8 scalar quantization.
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<(), StorageError> {
        if self.exists(name).await? {
            debug!("Collection {} already exists", name);
            return Ok(());
        }

        info!("Creating collection: {} with {} dimensions", name, dimension);

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine))
                    .quantization_config(
                        ScalarQuantizationBuilder::default()
                            .r#type(QuantizationType::Int8.into())
                            .quantile(0.99)
                            .always_ram(true),
                    ),
            )
            .await
            .context("Failed to create collection")
            .map_err(StorageError::Backend)?;

        info!("Collection {} created successfully", name);
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
        if vectors.is_empty() {
            debug!("No points to upsert");
            return Ok(());
        }

        debug!("Upserting {} points into {}", vectors.len(), name);

        let points: Vec<PointStruct> = vectors
            .into_iter()
            .zip(payloads.iter())
            .map(|(vector, payload)| {
                PointStruct::new(
                    Uuid::new_v4().to_string(),
                    vector,
                    payload_to_qdrant_map(payload),
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(name, points).wait(true))
            .await
            .context("Failed to upsert points")
            .map_err(StorageError::Backend)?;

        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: &PayloadFilter,
    ) -> Result<Vec<SearchHit>, StorageError> {
        debug!("Searching {} for {} similar vectors", name, limit);

        let mut search_builder =
            SearchPointsBuilder::new(name, vector, limit as u64).with_payload(true);

        if let Some(qdrant_filter) = to_qdrant_filter(filter) {
            search_builder = search_builder.filter(qdrant_filter);
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .context("Failed to search points")
            .map_err(StorageError::Backend)?;

        let hits: Vec<SearchHit> = results
            .result
            .into_iter()
            .map(|p| {
                let payload = qdrant_map_to_payload(&p.payload);

                let id = p
                    .id
                    .map(|id| match id.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                            n.to_string()
                        }
                        None => String::new(),
                    })
                    .unwrap_or_default();

                SearchHit {
                    id,
                    score: p.score,
                    payload,
                }
            })
            .collect();

        debug!("Found {} search hits", hits.len());
        Ok(hits)
    }

    async fn delete_where(&self, name: &str, filter: &PayloadFilter) -> Result<(), StorageError> {
        let qdrant_filter = to_qdrant_filter(filter).ok_or(StorageError::EmptyFilter)?;

        debug!("Deleting points in {} matching {:?}", name, filter);

        self.client
            .delete_points(
                DeletePointsBuilder::new(name)
                    .points(qdrant_filter)
                    .wait(true),
            )
            .await
            .context("Failed to delete points")
            .map_err(StorageError::Backend)?;

        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let collections = self
            .client
            .list_collections()
            .await
            .context("Failed to list collections")
            .map_err(StorageError::Backend)?;

        Ok(collections.collections.iter().any(|c| c.name == name))
    }
}

fn to_qdrant_filter(filter: &PayloadFilter) -> Option<Filter> {
    let mut conditions: Vec<Condition> = Vec::new();

    if let Some(ref project) = filter.project_name {
        conditions.push(Condition::matches("project_name", project.clone()));
    }

    if conditions.is_empty() {
        None
    } else {
        Some(Filter::must(conditions))
    }
}

/// Convert PointPayload to Qdrant's HashMap<String, Value>.
fn payload_to_qdrant_map(payload: &PointPayload) -> HashMap<String, Value> {
    let mut map = HashMap::new();

    map.insert(
        "project_name".to_string(),
        Value::from(payload.project_name.clone()),
    );
    map.insert("code_type".to_string(), Value::from(payload.code_type.clone()));
    map.insert(
        "file_path".to_string(),
        Value::from(payload.metadata.file_path.clone()),
    );
    map.insert(
        "package_name".to_string(),
        Value::from(payload.metadata.package_name.clone()),
    );
    map.insert(
        "primary_class_name".to_string(),
        Value::from(payload.metadata.primary_class_name.clone()),
    );
    map.insert(
        "method_names".to_string(),
        string_list(&payload.metadata.method_names),
    );
    map.insert(
        "field_names".to_string(),
        string_list(&payload.metadata.field_names),
    );
    map.insert("content".to_string(), Value::from(payload.content.clone()));
    map.insert(
        "size_in_lines".to_string(),
        Value::from(payload.size_in_lines as i64),
    );

    map
}

/// Convert Qdrant's HashMap<String, Value> back to PointPayload.
fn qdrant_map_to_payload(map: &HashMap<String, Value>) -> PointPayload {
    PointPayload {
        project_name: extract_string(map.get("project_name")),
        code_type: extract_string(map.get("code_type")),
        metadata: VectorMetadata {
            file_path: extract_string(map.get("file_path")),
            package_name: extract_string(map.get("package_name")),
            primary_class_name: extract_string(map.get("primary_class_name")),
            method_names: extract_string_list(map.get("method_names")),
            field_names: extract_string_list(map.get("field_names")),
        },
        content: extract_string(map.get("content")),
        size_in_lines: extract_integer(map.get("size_in_lines")).max(0) as usize,
    }
}

fn string_list(values: &[String]) -> Value {
    Value {
        kind: Some(Kind::ListValue(ListValue {
            values: values.iter().cloned().map(Value::from).collect(),
        })),
    }
}

fn extract_string(value: Option<&Value>) -> String {
    value
        .and_then(|v| match &v.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn extract_string_list(value: Option<&Value>) -> Vec<String> {
    match value.and_then(|v| v.kind.as_ref()) {
        Some(Kind::ListValue(list)) => list
            .values
            .iter()
            .filter_map(|v| match &v.kind {
                Some(Kind::StringValue(s)) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn extract_integer(value: Option<&Value>) -> i64 {
    value
        .and_then(|v| match &v.kind {
            Some(Kind::IntegerValue(i)) => Some(*i),
            _ => None,
        })
        .unwrap_or(0)
}
