//! Qdrant implementation for vector storage
//!
//! Provides connection management and vector operations over the
//! Qdrant gRPC API.

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use ragbot_core::{
    CollectionInfo, Embedding, Hit, MetadataValue, Metric, Payload, RagError, Record, Result,
    SetupOutcome, VectorConfig, VectorStore,
};
use std::collections::HashMap;
use std::time::Duration;

/// Qdrant vector store implementation
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
    metric: Metric,
}

impl QdrantStore {
    /// Create a new Qdrant connection
    pub fn new(config: &VectorConfig, timeout: Duration) -> Result<Self> {
        let url = config
            .endpoint()
            .ok_or_else(|| RagError::ConfigError("Qdrant URL required".to_string()))?;

        let client = Qdrant::from_url(&url)
            .api_key(config.token.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::VectorStoreError(format!("Qdrant connection failed: {e}")))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension: config.dimension,
            metric: config.metric,
        })
    }

    fn distance(&self) -> Distance {
        match self.metric {
            Metric::Cosine => Distance::Cosine,
            Metric::InnerProduct => Distance::Dot,
        }
    }
}

fn to_metadata(value: &QdrantValue) -> Option<MetadataValue> {
    match value.kind.as_ref()? {
        Kind::StringValue(s) => Some(MetadataValue::String(s.clone())),
        Kind::DoubleValue(d) => Some(MetadataValue::Number(*d)),
        Kind::IntegerValue(i) => Some(MetadataValue::Number(*i as f64)),
        Kind::BoolValue(b) => Some(MetadataValue::Bool(*b)),
        _ => None,
    }
}

fn to_qdrant(value: &MetadataValue) -> QdrantValue {
    match value {
        MetadataValue::String(s) => QdrantValue::from(s.clone()),
        MetadataValue::Number(n) => QdrantValue::from(*n),
        MetadataValue::Bool(b) => QdrantValue::from(*b),
    }
}

/// Qdrant returns cosine similarity; hits carry a distance
fn score_for(metric: Metric, score: f32) -> f32 {
    match metric {
        Metric::Cosine => 1.0 - score,
        Metric::InnerProduct => score,
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    async fn search(&self, query: &Embedding, limit: usize) -> Result<Vec<Hit>> {
        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| RagError::SearchError(format!("Vector search failed: {e}")))?;

        let hits = results
            .result
            .into_iter()
            .map(|point| {
                let payload: Payload = point
                    .payload
                    .iter()
                    .filter_map(|(k, v)| to_metadata(v).map(|v| (k.clone(), v)))
                    .collect();
                Hit::new(payload, score_for(self.metric, point.score))
            })
            .collect();

        Ok(hits)
    }

    async fn ensure_collection(&self) -> Result<SetupOutcome> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| {
                RagError::VectorStoreError(format!("Failed to check collection: {e}"))
            })?;

        if exists {
            tracing::info!(collection = %self.collection, "Reusing existing Qdrant collection");
            return Ok(SetupOutcome::Existing);
        }

        // Qdrant builds its HNSW index as part of the collection
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, self.distance()),
                ),
            )
            .await
            .map_err(|e| RagError::VectorStoreError(format!("Failed to create collection: {e}")))?;

        tracing::info!(collection = %self.collection, "Created Qdrant collection");
        Ok(SetupOutcome::Created)
    }

    async fn insert(&self, records: &[Record]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let points: Vec<PointStruct> = records
            .iter()
            .map(|record| {
                let payload: HashMap<String, QdrantValue> = record
                    .payload
                    .iter()
                    .map(|(k, v)| (k.clone(), to_qdrant(v)))
                    .collect();
                PointStruct::new(record.id, record.vector.to_vec(), payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| RagError::VectorStoreError(format!("Failed to upsert vectors: {e}")))?;

        Ok(records.len())
    }

    async fn describe(&self) -> Result<CollectionInfo> {
        let response = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| {
                RagError::VectorStoreError(format!("Failed to describe collection: {e}"))
            })?;

        let info = response.result.ok_or_else(|| {
            RagError::VectorStoreError(format!("Collection {} not found", self.collection))
        })?;

        let dimension = info
            .config
            .as_ref()
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|v| v.config.as_ref())
            .and_then(|c| match c {
                VectorsConfigKind::Params(params) => Some(params.size as usize),
                _ => None,
            });

        let payload_fields: Vec<&String> = info.payload_schema.keys().collect();
        let schema = serde_json::json!({
            "vectors": { "size": dimension, "distance": self.metric },
            "payload_schema": payload_fields,
        });

        Ok(CollectionInfo {
            name: self.collection.clone(),
            dimension,
            metric: self.metric,
            schema,
            entity_count: info.points_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_score_becomes_distance() {
        assert!((score_for(Metric::Cosine, 0.88) - 0.12).abs() < 1e-6);
        assert_eq!(score_for(Metric::InnerProduct, 0.88), 0.88);
    }

    #[test]
    fn test_payload_value_conversion() {
        let text = to_qdrant(&MetadataValue::from("hello"));
        assert_eq!(to_metadata(&text), Some(MetadataValue::from("hello")));

        let flag = to_qdrant(&MetadataValue::Bool(true));
        assert_eq!(to_metadata(&flag), Some(MetadataValue::Bool(true)));

        let int = QdrantValue::from(3_i64);
        assert_eq!(to_metadata(&int), Some(MetadataValue::Number(3.0)));
    }

    #[test]
    fn test_new_requires_endpoint() {
        let config = VectorConfig {
            backend: ragbot_core::VectorBackend::Qdrant,
            collection: "docs".to_string(),
            ..Default::default()
        };
        assert!(QdrantStore::new(&config, Duration::from_secs(5)).is_err());
    }
}
