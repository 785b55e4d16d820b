//! ragbot Vector - Vector database and embedding access
//!
//! Provides connectors for vector databases (Milvus REST, Qdrant and an
//! in-process store) plus the embedding clients that produce query vectors.

use ragbot_core::{RagError, Result, VectorBackend, VectorConfig, VectorStore};
use std::sync::Arc;
use std::time::Duration;

pub mod embedding;
pub mod memory_store;
pub mod milvus_store;
pub mod qdrant_store;

pub use embedding::{create_embedding_client, OllamaEmbedding, OpenAiEmbedding};
pub use memory_store::MemoryStore;
pub use milvus_store::MilvusStore;
pub use qdrant_store::QdrantStore;

/// Connect to the configured vector backend
pub async fn create_vector_store(
    config: &VectorConfig,
    timeout: Duration,
) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.backend {
        VectorBackend::Milvus => Arc::new(MilvusStore::new(config, timeout)?),
        VectorBackend::Qdrant => Arc::new(QdrantStore::new(config, timeout)?),
        VectorBackend::Memory => Arc::new(MemoryStore::new(
            config.collection.clone(),
            config.dimension,
            config.metric,
        )),
    };

    tracing::info!(
        backend = store.name(),
        collection = %config.collection,
        "Vector store connected"
    );
    Ok(store)
}

/// Check that the collection's vector field matches the embedding dimension.
///
/// Run at startup: a mismatch is a configuration failure, not a per-request one.
pub async fn verify_dimension(store: &dyn VectorStore, expected: usize) -> Result<()> {
    let info = store.describe().await?;
    match info.dimension {
        Some(actual) if actual != expected => {
            Err(RagError::DimensionMismatch { expected, actual })
        }
        Some(_) => Ok(()),
        None => {
            tracing::warn!(
                collection = %info.name,
                "Collection did not report a vector dimension; skipping check"
            );
            Ok(())
        }
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RagError::ConfigError(format!("Failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragbot_core::Metric;

    #[tokio::test]
    async fn test_verify_dimension_accepts_match() {
        let store = MemoryStore::new("docs", 4, Metric::Cosine);
        store.ensure_collection().await.unwrap();
        assert!(verify_dimension(&store, 4).await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_dimension_rejects_mismatch() {
        let store = MemoryStore::new("docs", 4, Metric::Cosine);
        store.ensure_collection().await.unwrap();

        let err = verify_dimension(&store, 1024).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 1024,
                actual: 4
            }
        ));
    }

    #[tokio::test]
    async fn test_create_memory_store_from_config() {
        let config = VectorConfig {
            backend: VectorBackend::Memory,
            collection: "docs".to_string(),
            dimension: 8,
            ..Default::default()
        };
        let store = create_vector_store(&config, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(store.name(), "memory");
    }
}
