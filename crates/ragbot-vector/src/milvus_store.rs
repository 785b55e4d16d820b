//! Milvus implementation for vector storage
//!
//! Talks to Milvus (or Zilliz Cloud) through the RESTful v2 API. Every
//! endpoint answers with a `{code, data, message}` envelope where
//! `code == 0` means success.

use crate::http_client;
use async_trait::async_trait;
use ragbot_core::{
    CollectionInfo, Embedding, Hit, Metric, Payload, RagError, Record, Result, SetupOutcome,
    VectorConfig, VectorStore,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

const PRIMARY_FIELD: &str = "id";
const VECTOR_FIELD: &str = "vector";
const INDEX_NAME: &str = "vector_index";
const DYNAMIC_FIELD: &str = "$meta";

/// Milvus REST response envelope
#[derive(Debug, Deserialize)]
struct MilvusResponse<T> {
    code: i32,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HasCollection {
    has: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionStats {
    row_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertResult {
    insert_count: usize,
}

/// Milvus vector store implementation
pub struct MilvusStore {
    client: Client,
    base_url: String,
    token: Option<String>,
    database: Option<String>,
    collection: String,
    dimension: usize,
    metric: Metric,
    index_type: String,
    content_field: String,
}

impl MilvusStore {
    /// Create a new Milvus connection
    pub fn new(config: &VectorConfig, timeout: Duration) -> Result<Self> {
        let base_url = config
            .endpoint()
            .ok_or_else(|| RagError::ConfigError("Milvus URL required".to_string()))?;

        Ok(Self {
            client: http_client(timeout)?,
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
            database: config.database.clone().filter(|d| !d.is_empty()),
            collection: config.collection.clone(),
            dimension: config.dimension,
            metric: config.metric,
            index_type: config.index_type.clone(),
            content_field: config.content_field.clone(),
        })
    }

    /// POST to a v2 endpoint and unwrap the response envelope
    async fn call<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<Option<T>> {
        let mut request = self
            .client
            .post(format!("{}/v2/vectordb/{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .json(&self.with_database(body));

        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RagError::VectorStoreError(format!("Milvus request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::VectorStoreError(format!(
                "Milvus {path} returned {status}: {error_text}"
            )));
        }

        let envelope: MilvusResponse<T> = response.json().await.map_err(|e| {
            RagError::VectorStoreError(format!("Failed to parse Milvus response: {e}"))
        })?;

        if envelope.code != 0 {
            return Err(RagError::VectorStoreError(format!(
                "Milvus {path} failed (code {}): {}",
                envelope.code,
                envelope
                    .message
                    .unwrap_or_else(|| "Unknown error".to_string())
            )));
        }

        Ok(envelope.data)
    }

    fn with_database(&self, mut body: Value) -> Value {
        if let (Some(db), Some(object)) = (&self.database, body.as_object_mut()) {
            object.insert("dbName".to_string(), Value::String(db.clone()));
        }
        body
    }

    fn collection_body(&self) -> Value {
        json!({ "collectionName": self.collection })
    }

    fn index_params(&self) -> Value {
        json!([{
            "fieldName": VECTOR_FIELD,
            "indexName": INDEX_NAME,
            "metricType": self.metric.milvus_name(),
            "indexType": self.index_type,
            "params": { "nlist": 128 }
        }])
    }

    /// Explicit int64 ids, a fixed-size float vector and dynamic fields
    fn create_collection_body(&self) -> Value {
        json!({
            "collectionName": self.collection,
            "schema": {
                "autoId": false,
                "enableDynamicField": true,
                "fields": [
                    {
                        "fieldName": PRIMARY_FIELD,
                        "dataType": "Int64",
                        "isPrimary": true
                    },
                    {
                        "fieldName": VECTOR_FIELD,
                        "dataType": "FloatVector",
                        "elementTypeParams": { "dim": self.dimension.to_string() }
                    }
                ]
            },
            "indexParams": self.index_params()
        })
    }

    fn search_body(&self, query: &Embedding, limit: usize) -> Value {
        json!({
            "collectionName": self.collection,
            "data": [query.as_slice()],
            "annsField": VECTOR_FIELD,
            "limit": limit,
            "outputFields": [self.content_field],
            "searchParams": {
                "metricType": self.metric.milvus_name(),
                "params": { "nprobe": 10 }
            }
        })
    }

    fn insert_body(&self, records: &[Record]) -> Value {
        let data: Vec<Value> = records
            .iter()
            .map(|record| {
                let mut row = record.payload.to_json_object();
                row.insert(PRIMARY_FIELD.to_string(), json!(record.id));
                row.insert(VECTOR_FIELD.to_string(), json!(record.vector.as_slice()));
                Value::Object(row)
            })
            .collect();

        json!({ "collectionName": self.collection, "data": data })
    }

    async fn has_collection(&self) -> Result<bool> {
        let result: Option<HasCollection> =
            self.call("collections/has", self.collection_body()).await?;
        result.map(|r| r.has).ok_or_else(|| {
            RagError::VectorStoreError("Milvus collections/has returned no data".to_string())
        })
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        let result: Option<Vec<String>> =
            self.call("indexes/list", self.collection_body()).await?;
        Ok(result.unwrap_or_default())
    }

    async fn load_collection(&self) -> Result<()> {
        let _: Option<Value> = self
            .call("collections/load", self.collection_body())
            .await?;
        Ok(())
    }

    async fn row_count(&self) -> Result<u64> {
        let stats: Option<CollectionStats> = self
            .call("collections/get_stats", self.collection_body())
            .await?;
        stats
            .map(|s| s.row_count)
            .ok_or_else(|| RagError::VectorStoreError("No collection stats returned".to_string()))
    }
}

/// Convert the `data` array of a search response into hits
fn parse_hits(data: Value, metric: Metric) -> Result<Vec<Hit>> {
    let rows = match data {
        Value::Array(rows) => rows,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(RagError::SearchError(format!(
                "Unexpected Milvus search payload: {other}"
            )))
        }
    };

    let hits = rows
        .into_iter()
        .filter_map(|row| match row {
            Value::Object(object) => parse_hit(object, metric),
            _ => None,
        })
        .collect();

    Ok(hits)
}

fn parse_hit(mut row: Map<String, Value>, metric: Metric) -> Option<Hit> {
    let distance = row.remove("distance");
    let score = row.remove("score");
    let Some(raw) = distance.or(score).as_ref().and_then(Value::as_f64) else {
        tracing::warn!(id = ?row.get(PRIMARY_FIELD), "Skipping Milvus hit without a score");
        return None;
    };
    let raw = raw as f32;
    row.remove(PRIMARY_FIELD);

    // Dynamic fields may come back flattened or nested under `$meta`;
    // top-level keys win when both are present.
    let meta = row.remove(DYNAMIC_FIELD);
    let mut payload = Payload::from_json_object(&row);
    if let Some(Value::Object(meta)) = meta {
        for (key, value) in Payload::from_json_object(&meta).iter() {
            if !payload.contains_key(key) {
                payload.insert(key.clone(), value.clone());
            }
        }
    }

    // Milvus reports COSINE as a similarity; hits carry a distance.
    let score = match metric {
        Metric::Cosine => 1.0 - raw,
        Metric::InnerProduct => raw,
    };

    Some(Hit::new(payload, score))
}

/// Read the vector dimension from a `collections/describe` response
fn parse_dimension(describe: &Value) -> Option<usize> {
    let fields = describe.get("fields")?.as_array()?;
    let vector_field = fields.iter().find(|f| {
        f.get("type").and_then(Value::as_str) == Some("FloatVector")
            || f.get("name").and_then(Value::as_str) == Some(VECTOR_FIELD)
    })?;

    vector_field
        .get("params")?
        .as_array()?
        .iter()
        .find(|p| p.get("key").and_then(Value::as_str) == Some("dim"))
        .and_then(|p| p.get("value"))
        .and_then(|v| match v {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            _ => None,
        })
}

#[async_trait]
impl VectorStore for MilvusStore {
    fn name(&self) -> &str {
        "milvus"
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    async fn search(&self, query: &Embedding, limit: usize) -> Result<Vec<Hit>> {
        let data: Option<Value> = self
            .call("entities/search", self.search_body(query, limit))
            .await
            .map_err(|e| RagError::SearchError(format!("Vector search failed: {e}")))?;

        let hits = parse_hits(data.unwrap_or(Value::Null), self.metric)?;
        Ok(hits.into_iter().take(limit).collect())
    }

    async fn ensure_collection(&self) -> Result<SetupOutcome> {
        if !self.has_collection().await? {
            let _: Option<Value> = self
                .call("collections/create", self.create_collection_body())
                .await?;
            tracing::info!(collection = %self.collection, "Created Milvus collection");
            return Ok(SetupOutcome::Created);
        }

        if self.list_indexes().await?.is_empty() {
            let body = json!({
                "collectionName": self.collection,
                "indexParams": self.index_params()
            });
            let _: Option<Value> = self.call("indexes/create", body).await?;
            tracing::info!(collection = %self.collection, "Created missing vector index");
        }

        self.load_collection().await?;
        tracing::info!(collection = %self.collection, "Reusing existing Milvus collection");
        Ok(SetupOutcome::Existing)
    }

    async fn insert(&self, records: &[Record]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = records.iter().find(|r| r.vector.dimension() != self.dimension) {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.dimension(),
            });
        }

        let result: Option<InsertResult> = self
            .call("entities/insert", self.insert_body(records))
            .await?;
        Ok(result.map(|r| r.insert_count).unwrap_or(records.len()))
    }

    async fn describe(&self) -> Result<CollectionInfo> {
        let schema: Value = self
            .call("collections/describe", self.collection_body())
            .await?
            .unwrap_or(Value::Null);

        let entity_count = match self.row_count().await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!("Could not fetch collection size: {e}");
                None
            }
        };

        Ok(CollectionInfo {
            name: self.collection.clone(),
            dimension: parse_dimension(&schema),
            metric: self.metric,
            schema,
            entity_count,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
