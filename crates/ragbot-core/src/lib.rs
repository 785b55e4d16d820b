//! ragbot Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout ragbot:
//! - Embeddings, hits and retrieved passages
//! - Answers and conversation turns
//! - Common error types
//! - Client traits for embedding, vector search and chat completion
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, LlmConfig, LlmProvider, LoggingConfig, RagConfig, ServerConfig,
    VectorBackend, VectorConfig,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for ragbot operations
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Vector store error: {0}")]
    VectorStoreError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;

// ============================================================================
// Vectors and Payloads
// ============================================================================

/// A fixed-length embedding produced by an [`EmbeddingClient`].
///
/// The inner vector is private so an embedding is never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.0.clone()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// A single value stored in a record's open-ended metadata bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert a JSON value, dropping kinds outside the closed set
    /// (null, arrays, objects).
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Keyed metadata attached to a stored vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, MetadataValue>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    /// Look up a string field; `None` when the key is absent or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(MetadataValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }

    /// Flatten a JSON object into a payload, keeping only supported value kinds
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        Self(
            object
                .iter()
                .filter_map(|(k, v)| MetadataValue::from_json(v).map(|v| (k.clone(), v)))
                .collect(),
        )
    }

    pub fn to_json_object(&self) -> serde_json::Map<String, serde_json::Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

impl FromIterator<(String, MetadataValue)> for Payload {
    fn from_iter<T: IntoIterator<Item = (String, MetadataValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Search Types
// ============================================================================

/// Similarity metric configured on the collection's vector index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Hits carry a cosine distance; lower is better
    #[default]
    Cosine,
    /// Hits carry the raw inner product; higher is better
    #[serde(rename = "ip")]
    InnerProduct,
}

impl Metric {
    /// Turn a hit score into the similarity shown to users.
    ///
    /// Cosine distances become a percentage rounded to two decimals,
    /// inner-product scores are passed through.
    pub fn similarity(&self, score: f32) -> f64 {
        match self {
            Self::Cosine => round2((1.0 - f64::from(score)) * 100.0),
            Self::InnerProduct => f64::from(score),
        }
    }

    /// Name used by Milvus index and search parameters
    pub fn milvus_name(&self) -> &'static str {
        match self {
            Self::Cosine => "COSINE",
            Self::InnerProduct => "IP",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.milvus_name())
    }
}

impl std::str::FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "ip" | "inner_product" => Ok(Self::InnerProduct),
            _ => Err(ConfigError::InvalidValue {
                key: "VECTOR_METRIC".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One result record from a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Matched record's metadata
    pub payload: Payload,
    /// Distance or score in the store's [`Metric`]
    pub score: f32,
}

impl Hit {
    pub fn new(payload: Payload, score: f32) -> Self {
        Self { payload, score }
    }
}

/// A record written by the ingestion path
#[derive(Debug, Clone)]
pub struct Record {
    /// Explicitly assigned primary key
    pub id: u64,
    pub vector: Embedding,
    pub payload: Payload,
}

/// Result of an idempotent collection setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupOutcome {
    /// Collection and index were created
    Created,
    /// Collection already existed and was reused
    Existing,
}

/// Description of a vector collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: Option<usize>,
    pub metric: Metric,
    /// Backend-specific schema description
    pub schema: serde_json::Value,
    /// Approximate number of stored entities, when the backend reports it
    pub entity_count: Option<u64>,
}

impl CollectionInfo {
    /// Size for display; "Unknown" when the count could not be fetched
    pub fn size_label(&self) -> String {
        self.entity_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

// ============================================================================
// Answer and Conversation Types
// ============================================================================

/// A passage retrieved for a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub similarity: f64,
}

/// Sources backing an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerMetadata {
    pub sources: Vec<Passage>,
    pub total_sources: usize,
}

impl AnswerMetadata {
    pub fn new(sources: Vec<Passage>) -> Self {
        let total_sources = sources.len();
        Self {
            sources,
            total_sources,
        }
    }
}

/// Assistant answer for one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub response: String,
    pub metadata: Option<AnswerMetadata>,
}

impl Answer {
    /// Answer grounded in retrieved passages
    pub fn with_sources(response: impl Into<String>, sources: Vec<Passage>) -> Self {
        Self {
            response: response.into(),
            metadata: Some(AnswerMetadata::new(sources)),
        }
    }

    /// Answer with no sources attached
    pub fn plain(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            metadata: None,
        }
    }

    pub fn sources(&self) -> &[Passage] {
        self.metadata
            .as_ref()
            .map(|m| m.sources.as_slice())
            .unwrap_or_default()
    }
}

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Content of a turn: plain text for users, a full answer for the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Answer(Answer),
}

/// One entry in a conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(answer: Answer) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Answer(answer),
            created_at: Utc::now(),
        }
    }

    /// Text shown for this turn
    pub fn text(&self) -> &str {
        match &self.content {
            TurnContent::Text(text) => text,
            TurnContent::Answer(answer) => &answer.response,
        }
    }
}

/// Role of a chat-completion message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message sent to a chat model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for embedding generation
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;
}

/// Trait for vector collection access
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Metric the collection index was built with
    fn metric(&self) -> Metric;

    /// Return at most `limit` hits, best first
    async fn search(&self, query: &Embedding, limit: usize) -> Result<Vec<Hit>>;

    /// Create the collection and its index if absent; reuse them otherwise
    async fn ensure_collection(&self) -> Result<SetupOutcome>;

    /// Insert records, returning how many were written
    async fn insert(&self, records: &[Record]) -> Result<usize>;

    /// Describe the collection's schema and size
    async fn describe(&self) -> Result<CollectionInfo>;
}

/// Trait for chat-completion clients
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    /// Generate a reply to the given messages
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cosine_similarity_transform() {
        assert_eq!(Metric::Cosine.similarity(0.12), 88.0);
        assert_eq!(Metric::Cosine.similarity(0.0), 100.0);
        assert_eq!(Metric::Cosine.similarity(1.0), 0.0);
    }

    #[test]
    fn test_inner_product_passes_raw_score() {
        assert_eq!(Metric::InnerProduct.similarity(0.75), 0.75);
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!("COSINE".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("ip".parse::<Metric>().unwrap(), Metric::InnerProduct);
        assert!("l2".parse::<Metric>().is_err());
    }

    #[test]
    fn test_payload_lookup() {
        let payload = Payload::new()
            .with("text", "Milvus is a vector database")
            .with("page", 3.0)
            .with("draft", false);

        assert_eq!(payload.get_str("text"), Some("Milvus is a vector database"));
        assert_eq!(payload.get_str("page"), None);
        assert_eq!(payload.get("page").and_then(MetadataValue::as_f64), Some(3.0));
        assert_eq!(payload.get("draft").and_then(MetadataValue::as_bool), Some(false));
        assert!(payload.get("missing").is_none());
    }

    #[test]
    fn test_payload_from_json_drops_unsupported_kinds() {
        let value = serde_json::json!({
            "text": "hello",
            "score": 1.5,
            "tags": ["a", "b"],
            "nested": {"k": "v"},
            "none": null
        });
        let payload = Payload::from_json_object(value.as_object().unwrap());

        assert_eq!(payload.len(), 2);
        assert_eq!(payload.get_str("text"), Some("hello"));
    }

    #[test]
    fn test_answer_metadata_counts_sources() {
        let answer = Answer::with_sources(
            "ok",
            vec![
                Passage {
                    content: "a".to_string(),
                    similarity: 90.0,
                },
                Passage {
                    content: "b".to_string(),
                    similarity: 80.0,
                },
            ],
        );
        let metadata = answer.metadata.as_ref().unwrap();
        assert_eq!(metadata.total_sources, 2);
        assert_eq!(answer.sources().len(), 2);
        assert!(Answer::plain("none").sources().is_empty());
    }

    #[test]
    fn test_collection_size_label() {
        let mut info = CollectionInfo {
            name: "docs".to_string(),
            dimension: Some(1024),
            metric: Metric::Cosine,
            schema: serde_json::Value::Null,
            entity_count: None,
        };
        assert_eq!(info.size_label(), "Unknown");

        info.entity_count = Some(42);
        assert_eq!(info.size_label(), "42");
    }

    #[test]
    fn test_turn_serialization_shape() {
        let turn = Turn::user("hi");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");

        let turn = Turn::assistant(Answer::plain("hello"));
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["content"]["response"], "hello");
        assert!(json["content"]["metadata"].is_null());
    }

    proptest! {
        #[test]
        fn prop_cosine_similarity_has_two_decimals(d in 0.0f32..=2.0f32) {
            let s = Metric::Cosine.similarity(d);
            let expected = ((1.0 - f64::from(d)) * 100.0 * 100.0).round() / 100.0;
            prop_assert_eq!(s, expected);
            prop_assert!((s * 100.0 - (s * 100.0).round()).abs() < 1e-6);
        }

        #[test]
        fn prop_smaller_distance_is_more_similar(a in 0.0f32..=1.0f32, b in 0.0f32..=1.0f32) {
            prop_assume!(a < b);
            prop_assert!(Metric::Cosine.similarity(a) >= Metric::Cosine.similarity(b));
        }
    }
}
