//! Knowledge-base ingestion
//!
//! Splits a text document into paragraph-aligned chunks, embeds them in
//! batches and inserts them with explicit ids and a `{text, source}` payload.

use ragbot_core::{
    EmbeddingClient, Payload, RagError, Record, Result, SetupOutcome, VectorStore,
};
use std::sync::Arc;

const EMBED_BATCH_SIZE: usize = 16;

/// Pack blank-line separated paragraphs into chunks of at most `chunk_size`
/// characters. A paragraph longer than `chunk_size` becomes its own chunk.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    let paragraphs = normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for paragraph in paragraphs {
        let len = paragraph.chars().count();
        if current.is_empty() {
            current.push_str(paragraph);
            current_len = len;
        } else if current_len + 2 + len <= chunk_size {
            current.push_str("\n\n");
            current.push_str(paragraph);
            current_len += 2 + len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(paragraph);
            current_len = len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Largest id a Milvus `Int64` primary key can hold
const MAX_RECORD_ID: u64 = i64::MAX as u64;

/// First id after `count` records starting at `start_id`
fn id_range_end(start_id: u64, count: usize) -> Result<u64> {
    let end = start_id.checked_add(count as u64);
    match end {
        Some(end) if count == 0 || end - 1 <= MAX_RECORD_ID => Ok(end),
        _ => Err(RagError::ValidationError(format!(
            "Ids {start_id}.. for {count} chunks exceed the maximum record id {MAX_RECORD_ID}"
        ))),
    }
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub setup: SetupOutcome,
    pub chunks: usize,
    pub inserted: usize,
    /// First id not used by this run
    pub next_id: u64,
}

/// Loads documents into the vector collection
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    chunk_size: usize,
    content_field: String,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        chunk_size: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            chunk_size,
            content_field: "text".to_string(),
        }
    }

    pub fn with_content_field(mut self, field: impl Into<String>) -> Self {
        self.content_field = field.into();
        self
    }

    /// Ensure the collection exists, then insert `text` as records `start_id..`
    pub async fn ingest(&self, source: &str, text: &str, start_id: u64) -> Result<IngestReport> {
        let chunks = chunk_text(text, self.chunk_size);
        let end_id = id_range_end(start_id, chunks.len())?;
        let setup = self.store.ensure_collection().await?;
        tracing::info!(source, chunks = chunks.len(), "Ingesting document");

        let mut next_id = start_id;
        let mut inserted = 0;

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let embeddings = self.embedder.embed_batch(batch).await?;

            let records: Vec<Record> = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, vector)| {
                    let record = Record {
                        id: next_id,
                        vector,
                        payload: Payload::new()
                            .with(self.content_field.as_str(), chunk.as_str())
                            .with("source", source),
                    };
                    next_id += 1;
                    record
                })
                .collect();

            inserted += self.store.insert(&records).await?;
            tracing::debug!(inserted, "Inserted batch");
        }

        debug_assert_eq!(next_id, end_id);
        Ok(IngestReport {
            setup,
            chunks: chunks.len(),
            inserted,
            next_id: end_id,
        })
    }
}
