//! In-process vector store
//!
//! Exact brute-force search over records held in memory. Used for tests,
//! local demos and the `memory` backend; follows the same setup contract
//! as the remote stores.

use async_trait::async_trait;
use ragbot_core::{
    CollectionInfo, Embedding, Hit, Metric, RagError, Record, Result, SetupOutcome, VectorStore,
};
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryCollection {
    records: BTreeMap<u64, Record>,
}

/// In-memory vector store implementation
pub struct MemoryStore {
    collection_name: String,
    dimension: usize,
    metric: Metric,
    collection: RwLock<Option<MemoryCollection>>,
}

impl MemoryStore {
    /// Create a store with no collection yet; call `ensure_collection` first
    pub fn new(collection_name: impl Into<String>, dimension: usize, metric: Metric) -> Self {
        Self {
            collection_name: collection_name.into(),
            dimension,
            metric,
            collection: RwLock::new(None),
        }
    }

    fn not_found(&self) -> RagError {
        RagError::VectorStoreError(format!(
            "Collection {} not found",
            self.collection_name
        ))
    }

    fn poisoned() -> RagError {
        RagError::VectorStoreError("Memory store lock poisoned".to_string())
    }

    fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        match self.metric {
            Metric::Cosine => 1.0 - cosine_similarity(query, candidate),
            Metric::InnerProduct => dot(query, candidate),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    async fn search(&self, query: &Embedding, limit: usize) -> Result<Vec<Hit>> {
        if query.dimension() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.dimension(),
            });
        }

        let guard = self.collection.read().map_err(|_| Self::poisoned())?;
        let collection = guard.as_ref().ok_or_else(|| self.not_found())?;

        let mut scored: Vec<Hit> = collection
            .records
            .values()
            .map(|r| {
                Hit::new(
                    r.payload.clone(),
                    self.score(query.as_slice(), r.vector.as_slice()),
                )
            })
            .collect();

        // Distances ascend, inner products descend
        scored.sort_by(|a, b| {
            let ordering = a
                .score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal);
            match self.metric {
                Metric::Cosine => ordering,
                Metric::InnerProduct => ordering.reverse(),
            }
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn ensure_collection(&self) -> Result<SetupOutcome> {
        let mut guard = self.collection.write().map_err(|_| Self::poisoned())?;
        if guard.is_some() {
            return Ok(SetupOutcome::Existing);
        }
        *guard = Some(MemoryCollection::default());
        tracing::debug!(collection = %self.collection_name, "Created in-memory collection");
        Ok(SetupOutcome::Created)
    }

    async fn insert(&self, records: &[Record]) -> Result<usize> {
        if let Some(bad) = records.iter().find(|r| r.vector.dimension() != self.dimension) {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.dimension(),
            });
        }

        let mut guard = self.collection.write().map_err(|_| Self::poisoned())?;
        let collection = guard.as_mut().ok_or_else(|| self.not_found())?;
        for record in records {
            collection.records.insert(record.id, record.clone());
        }
        Ok(records.len())
    }

    async fn describe(&self) -> Result<CollectionInfo> {
        let guard = self.collection.read().map_err(|_| Self::poisoned())?;
        let collection = guard.as_ref().ok_or_else(|| self.not_found())?;

        Ok(CollectionInfo {
            name: self.collection_name.clone(),
            dimension: Some(self.dimension),
            metric: self.metric,
            schema: serde_json::json!({
                "fields": [
                    {"name": "id", "type": "Int64", "primaryKey": true},
                    {"name": "vector", "type": "FloatVector", "dim": self.dimension}
                ],
                "enableDynamicField": true
            }),
            entity_count: Some(collection.records.len() as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragbot_core::Payload;

    fn record(id: u64, vector: Vec<f32>, text: &str) -> Record {
        Record {
            id,
            vector: Embedding::new(vector),
            payload: Payload::new().with("text", text),
        }
    }

    async fn seeded(metric: Metric) -> MemoryStore {
        let store = MemoryStore::new("docs", 2, metric);
        store.ensure_collection().await.unwrap();
        store
            .insert(&[
                record(1, vec![1.0, 0.0], "east"),
                record(2, vec![0.0, 1.0], "north"),
                record(3, vec![0.7, 0.7], "north-east"),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_setup_is_idempotent() {
        let store = MemoryStore::new("docs", 2, Metric::Cosine);
        assert_eq!(store.ensure_collection().await.unwrap(), SetupOutcome::Created);
        store
            .insert(&[record(1, vec![1.0, 0.0], "kept")])
            .await
            .unwrap();

        assert_eq!(store.ensure_collection().await.unwrap(), SetupOutcome::Existing);
        let info = store.describe().await.unwrap();
        assert_eq!(info.entity_count, Some(1));
    }

    #[tokio::test]
    async fn test_search_orders_by_cosine_distance() {
        let store = seeded(Metric::Cosine).await;
        let hits = store
            .search(&Embedding::new(vec![1.0, 0.1]), 2)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].payload.get_str("text"), Some("east"));
        assert_eq!(hits[1].payload.get_str("text"), Some("north-east"));
        assert!(hits[0].score <= hits[1].score);
    }

    #[tokio::test]
    async fn test_search_orders_by_inner_product() {
        let store = seeded(Metric::InnerProduct).await;
        let hits = store
            .search(&Embedding::new(vec![0.0, 2.0]), 3)
            .await
            .unwrap();

        assert_eq!(hits[0].payload.get_str("text"), Some("north"));
        assert!(hits[0].score >= hits[1].score);
        assert!(hits[1].score >= hits[2].score);
    }

    #[tokio::test]
    async fn test_search_without_collection_fails() {
        let store = MemoryStore::new("missing", 2, Metric::Cosine);
        let result = store.search(&Embedding::new(vec![1.0, 0.0]), 3).await;
        assert!(matches!(result, Err(RagError::VectorStoreError(_))));
    }

    #[tokio::test]
    async fn test_insert_rejects_wrong_dimension() {
        let store = MemoryStore::new("docs", 2, Metric::Cosine);
        store.ensure_collection().await.unwrap();
        let result = store.insert(&[record(1, vec![1.0, 0.0, 0.0], "bad")]).await;
        assert!(matches!(result, Err(RagError::DimensionMismatch { .. })));
    }
}
