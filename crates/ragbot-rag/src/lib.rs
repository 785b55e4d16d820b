//! ragbot RAG - Retrieval-Augmented Generation Orchestrator
//!
//! This crate implements the answer pipeline for one question:
//! - Embed the question
//! - Search the vector collection for the closest passages
//! - Assemble a system/user prompt from those passages
//! - Ask the chat model and attach the passages as sources
//!
//! Remote failures never escape [`RagOrchestrator::answer`]; they become a
//! fixed apology, kept distinct from the "nothing relevant found" reply.

use ragbot_core::{
    Answer, ChatClient, EmbeddingClient, Passage, RagConfig, RagError, Result, VectorStore,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub mod ingest;
pub mod llm;
pub mod prompt;
pub mod session;

pub use ingest::{chunk_text, IngestReport, Ingestor};
pub use llm::{create_chat_client, OllamaClient, OpenAiClient};
pub use prompt::PromptAssembler;
pub use session::ConversationSession;

/// Reply when the search produced no usable passages
pub const NO_KNOWLEDGE_RESPONSE: &str = "I couldn't find any relevant information in my knowledge base. Could you please rephrase your question?";

/// Reply when embedding, search or completion failed
pub const UPSTREAM_FAILURE_RESPONSE: &str =
    "I'm having trouble accessing the knowledge base. Please try again in a moment.";

/// Why a question did not get a grounded answer
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Search succeeded but nothing usable came back; not a failure
    #[error("no relevant passages found")]
    NoKnowledge,

    /// A remote call failed
    #[error("upstream failure: {0}")]
    Upstream(#[from] RagError),
}

impl AnswerError {
    /// The fixed reply shown in the conversation
    pub fn fallback_answer(&self) -> Answer {
        match self {
            Self::NoKnowledge => Answer::plain(NO_KNOWLEDGE_RESPONSE),
            Self::Upstream(_) => Answer::plain(UPSTREAM_FAILURE_RESPONSE),
        }
    }

    /// Error text for diagnostics, never for the conversation itself
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Self::NoKnowledge => None,
            Self::Upstream(err) => Some(err.to_string()),
        }
    }
}

/// Answer for one turn plus any diagnostic produced along the way
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub answer: Answer,
    pub diagnostic: Option<String>,
    pub processing_time_ms: u64,
}

// ============================================================================
// RAG Orchestrator
// ============================================================================

/// Sequential embed -> search -> prompt -> complete pipeline
pub struct RagOrchestrator {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    chat: Arc<dyn ChatClient>,
    prompt: PromptAssembler,
    top_k: usize,
    content_field: String,
}

impl RagOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        chat: Arc<dyn ChatClient>,
        config: &RagConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            chat,
            prompt: PromptAssembler::new(config.topic.clone()),
            top_k: config.top_k,
            content_field: "text".to_string(),
        }
    }

    /// Read passage text from a different payload field
    pub fn with_content_field(mut self, field: impl Into<String>) -> Self {
        self.content_field = field.into();
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Embed the question and turn search hits into passages.
    ///
    /// Hits without a text content field are skipped; order is kept.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<Passage>> {
        let query = self.embedder.embed(question).await?;
        let hits = self.store.search(&query, self.top_k).await?;
        tracing::debug!("Vector search returned {} hits", hits.len());

        let metric = self.store.metric();
        let passages = hits
            .into_iter()
            .enumerate()
            .filter_map(|(rank, hit)| match hit.payload.get_str(&self.content_field) {
                Some(content) => Some(Passage {
                    content: content.to_string(),
                    similarity: metric.similarity(hit.score),
                }),
                None => {
                    tracing::warn!(
                        rank,
                        field = %self.content_field,
                        "Skipping hit without content field"
                    );
                    None
                }
            })
            .collect();

        Ok(passages)
    }

    /// Answer a question, reporting why when no grounded answer was produced
    pub async fn try_answer(&self, question: &str) -> std::result::Result<Answer, AnswerError> {
        let question = question.trim();

        let passages = self.retrieve(question).await?;
        if passages.is_empty() {
            return Err(AnswerError::NoKnowledge);
        }

        let messages = self.prompt.build_messages(question, &passages);
        tracing::info!("Calling LLM with {} passages", passages.len());
        let response = self.chat.complete(&messages).await?;
        tracing::info!("LLM response received: {} chars", response.len());

        Ok(Answer::with_sources(response, passages))
    }

    /// Answer a question; never fails
    pub async fn answer(&self, question: &str) -> Answer {
        self.respond(question).await.answer
    }

    /// Answer a question and keep the failure diagnostic, if any
    pub async fn respond(&self, question: &str) -> TurnResult {
        let start_time = Instant::now();
        tracing::info!("RAG query started");

        let (answer, diagnostic) = match self.try_answer(question).await {
            Ok(answer) => (answer, None),
            Err(err) => {
                match &err {
                    AnswerError::NoKnowledge => tracing::info!("No relevant passages found"),
                    AnswerError::Upstream(e) => tracing::error!("RAG query failed: {e}"),
                }
                (err.fallback_answer(), err.diagnostic())
            }
        };

        TurnResult {
            answer,
            diagnostic,
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
