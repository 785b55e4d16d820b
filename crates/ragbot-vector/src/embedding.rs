//! Embedding client for generating vector representations
//!
//! Supports OpenAI and Ollama embedding APIs.

use crate::http_client;
use async_trait::async_trait;
use ragbot_core::{Embedding, EmbeddingClient, LlmConfig, LlmProvider, RagError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// ============================================================================
// OpenAI Embedding Client
// ============================================================================

/// OpenAI embedding API client
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest {
    input: Vec<String>,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedding {
    /// Create a new OpenAI embedding client producing `dimension`-length vectors
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.into(),
            dimension,
        })
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig, dimension: usize) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| RagError::ConfigError("OpenAI API key required".to_string()))?;

        let client = Self::new(
            api_key.clone(),
            config.embedding_model.clone(),
            dimension,
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(match &config.openai_base_url {
            Some(url) => client.with_base_url(url.clone()),
            None => client,
        })
    }

    /// Set custom base URL (for Azure or compatible APIs)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request(&self, texts: &[String]) -> OpenAiEmbeddingRequest {
        // Only the text-embedding-3 family accepts a shortened output size
        let dimensions = self
            .model
            .starts_with("text-embedding-3")
            .then_some(self.dimension);

        OpenAiEmbeddingRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
            dimensions,
        }
    }
}

/// Restore input order and check every vector's length
fn parse_embeddings(
    response: OpenAiEmbeddingResponse,
    expected_count: usize,
    dimension: usize,
) -> Result<Vec<Embedding>> {
    let mut data = response.data;
    if data.len() != expected_count {
        return Err(RagError::EmbeddingError(format!(
            "Expected {expected_count} embeddings, got {}",
            data.len()
        )));
    }
    data.sort_by_key(|e| e.index);

    data.into_iter()
        .map(|e| checked_embedding(e.embedding, dimension))
        .collect()
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::EmbeddingError("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        texts.iter().try_for_each(|t| ensure_text(t))?;

        let request = self.build_request(texts);

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::EmbeddingError(format!("Embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingError(format!(
                "OpenAI embedding error: {error_text}"
            )));
        }

        let result: OpenAiEmbeddingResponse = response.json().await.map_err(|e| {
            RagError::EmbeddingError(format!("Failed to parse embedding response: {e}"))
        })?;

        parse_embeddings(result, texts.len(), self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding client
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimension,
        })
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig, dimension: usize) -> Result<Self> {
        Self::new(
            config.ollama_url.clone(),
            config.embedding_model.clone(),
            dimension,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        ensure_text(text)?;

        let request = OllamaEmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                RagError::EmbeddingError(format!("Ollama embedding request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingError(format!(
                "Ollama embedding error: {error_text}"
            )));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            RagError::EmbeddingError(format!("Failed to parse embedding response: {e}"))
        })?;

        checked_embedding(result.embedding, self.dimension)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        // Ollama doesn't have native batch embedding, so we process sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn ensure_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(RagError::ValidationError(
            "Cannot embed empty text".to_string(),
        ));
    }
    Ok(())
}

fn checked_embedding(values: Vec<f32>, expected: usize) -> Result<Embedding> {
    if values.len() != expected {
        return Err(RagError::DimensionMismatch {
            expected,
            actual: values.len(),
        });
    }
    Ok(Embedding::new(values))
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
pub fn create_embedding_client(
    config: &LlmConfig,
    dimension: usize,
) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider {
        LlmProvider::OpenAI | LlmProvider::Azure => {
            Ok(Box::new(OpenAiEmbedding::from_config(config, dimension)?))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaEmbedding::from_config(config, dimension)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================
