//! ragbot Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development. Required connection values are
//! checked by [`AppConfig::validate`] before anything is served.

use crate::Metric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Vector store connection
    pub vector: VectorConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// RAG pipeline configuration
    pub rag: RagConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Apply environment variables on top of this configuration (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Vector store
        if let Some(backend) = lookup("VECTOR_BACKEND") {
            self.vector.backend = backend.parse()?;
        }
        if let Some(url) = lookup("URL") {
            self.vector.url = Some(url);
        }
        if let Some(token) = lookup("TOKEN") {
            self.vector.token = Some(token);
        }
        if let Some(host) = lookup("MILVUS_HOST") {
            self.vector.host = Some(host);
        }
        if let Some(port) = lookup("MILVUS_PORT") {
            self.vector.port = Some(parse_value("MILVUS_PORT", port)?);
        }
        if let Some(database) = lookup("MILVUS_DB_NAME") {
            self.vector.database = Some(database);
        }
        if let Some(collection) = lookup("COLLECTION_NAME") {
            self.vector.collection = collection;
        }
        if let Some(dimension) = lookup("EMBEDDING_DIMENSION") {
            self.vector.dimension = parse_value("EMBEDDING_DIMENSION", dimension)?;
        }
        if let Some(metric) = lookup("VECTOR_METRIC") {
            self.vector.metric = metric.parse()?;
        }
        if let Some(index_type) = lookup("INDEX_TYPE") {
            self.vector.index_type = index_type;
        }
        if let Some(field) = lookup("CONTENT_FIELD") {
            self.vector.content_field = field;
        }

        // LLM
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.openai_base_url = Some(url);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.llm.ollama_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.llm.embedding_model = model;
        }
        if let Some(timeout) = lookup("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_value("LLM_TIMEOUT_SECS", timeout)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format = parse_value("LOG_JSON", json)?;
        }

        Ok(self)
    }

    /// Fail fast when a required connection value is missing
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vector.collection.trim().is_empty() {
            return Err(ConfigError::MissingRequired("COLLECTION_NAME".to_string()));
        }
        if self.vector.backend != VectorBackend::Memory && self.vector.endpoint().is_none() {
            return Err(ConfigError::MissingRequired(
                "URL (or MILVUS_HOST)".to_string(),
            ));
        }
        if self.vector.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EMBEDDING_DIMENSION".to_string(),
                value: "0".to_string(),
            });
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "rag.top_k".to_string(),
                value: "0".to_string(),
            });
        }
        if matches!(self.llm.provider, LlmProvider::OpenAI | LlmProvider::Azure)
            && self.llm.openai_api_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::MissingRequired("OPENAI_API_KEY".to_string()));
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            // Empty by default - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// Supported vector store backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Milvus,
    Qdrant,
    Memory,
}

impl std::str::FromStr for VectorBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "milvus" | "zilliz" => Ok(Self::Milvus),
            "qdrant" => Ok(Self::Qdrant),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: "VECTOR_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Vector store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Backend to connect to
    pub backend: VectorBackend,

    /// Endpoint URL
    pub url: Option<String>,

    /// Auth token (Zilliz API key or `user:password`)
    pub token: Option<String>,

    /// Host override, used when no URL is set
    pub host: Option<String>,

    /// Port override, used together with `host`
    pub port: Option<u16>,

    /// Database name (Milvus only)
    pub database: Option<String>,

    /// Collection name
    pub collection: String,

    /// Vector dimension (must match embedding model)
    pub dimension: usize,

    /// Similarity metric of the vector index
    pub metric: Metric,

    /// ANN index type created by setup
    pub index_type: String,

    /// Payload field holding passage text
    pub content_field: String,
}

impl VectorConfig {
    /// Resolve the endpoint from `url`, falling back to `host`/`port`
    pub fn endpoint(&self) -> Option<String> {
        if let Some(url) = self.url.as_ref().filter(|u| !u.trim().is_empty()) {
            return Some(url.trim_end_matches('/').to_string());
        }
        let default_port = match self.backend {
            VectorBackend::Qdrant => 6334,
            _ => 19530,
        };
        self.host
            .as_ref()
            .filter(|h| !h.trim().is_empty())
            .map(|host| format!("http://{}:{}", host, self.port.unwrap_or(default_port)))
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Milvus,
            url: None,
            token: None,
            host: None,
            port: None,
            database: None,
            collection: String::new(),
            dimension: 1024,
            metric: Metric::Cosine,
            index_type: "IVF_FLAT".to_string(),
            content_field: "text".to_string(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for Azure or compatible APIs)
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Chat model name
    pub model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
    Azure,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "azure" => Ok(Self::Azure),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// RAG pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Number of passages retrieved per question
    pub top_k: usize,

    /// Subject named in the system prompt
    pub topic: String,

    /// Chunk size for document ingestion (characters)
    pub chunk_size: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            topic: "Milvus".to_string(),
            chunk_size: 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn valid_config() -> AppConfig {
        AppConfig::default()
            .with_overrides(lookup(&[
                ("COLLECTION_NAME", "milvus_docs"),
                ("URL", "https://example.zillizcloud.com"),
                ("TOKEN", "secret"),
                ("OPENAI_API_KEY", "sk-test"),
            ]))
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.vector.dimension, 1024);
        assert_eq!(config.vector.metric, Metric::Cosine);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!(
            "openai".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAI
        );
        assert_eq!(
            "ollama".parse::<LlmProvider>().unwrap(),
            LlmProvider::Ollama
        );
        assert!("invalid".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = valid_config();
        assert_eq!(config.vector.collection, "milvus_docs");
        assert_eq!(
            config.vector.endpoint().as_deref(),
            Some("https://example.zillizcloud.com")
        );
        assert_eq!(config.vector.token.as_deref(), Some("secret"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_host_port_override_builds_endpoint() {
        let config = AppConfig::default()
            .with_overrides(lookup(&[("MILVUS_HOST", "milvus"), ("MILVUS_PORT", "19531")]))
            .unwrap();
        assert_eq!(
            config.vector.endpoint().as_deref(),
            Some("http://milvus:19531")
        );
    }

    #[test]
    fn test_invalid_port_rejected() {
        let result = AppConfig::default().with_overrides(lookup(&[("API_PORT", "eighty")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_missing_collection_fails_validation() {
        let mut config = valid_config();
        config.vector.collection.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(key)) if key == "COLLECTION_NAME"
        ));
    }

    #[test]
    fn test_missing_endpoint_fails_validation() {
        let mut config = valid_config();
        config.vector.url = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));

        config.vector.backend = VectorBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_api_key_fails_validation() {
        let mut config = valid_config();
        config.llm.openai_api_key = None;
        assert!(config.validate().is_err());

        config.llm.provider = LlmProvider::Ollama;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_with_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[vector]\ncollection = \"from_file\"\nmetric = \"ip\"\n\n[rag]\ntop_k = 5\n"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.vector.collection, "from_file");
        assert_eq!(config.vector.metric, Metric::InnerProduct);
        assert_eq!(config.vector.dimension, 1024);
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.rag.topic, "Milvus");
    }
}
