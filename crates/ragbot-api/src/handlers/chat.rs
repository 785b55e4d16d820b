//! Chat and session handlers

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use ragbot_core::{Answer, Passage, Role, Turn, TurnContent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Chat request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// User's question
    #[schema(example = "What is Milvus?")]
    pub question: String,

    /// Continue an existing session; a new one is opened when absent
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// A retrieved passage shown as a source
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SourceResponse {
    pub content: String,
    /// Percentage for cosine collections, raw score for inner product
    #[schema(example = 88.0)]
    pub similarity: f64,
}

impl From<&Passage> for SourceResponse {
    fn from(passage: &Passage) -> Self {
        Self {
            content: passage.content.clone(),
            similarity: passage.similarity,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatMetadata {
    pub sources: Vec<SourceResponse>,
    pub total_sources: usize,
}

fn metadata_for(answer: &Answer) -> Option<ChatMetadata> {
    answer.metadata.as_ref().map(|m| ChatMetadata {
        sources: m.sources.iter().map(SourceResponse::from).collect(),
        total_sources: m.total_sources,
    })
}

/// Chat response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub session_id: Uuid,
    /// Generated answer or a fixed fallback message
    pub response: String,
    /// Present only for grounded answers
    pub metadata: Option<ChatMetadata>,
    /// Upstream error text when a fallback message was returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[schema(example = 1250)]
    pub processing_time_ms: u64,
}

/// Handle one conversational turn
#[utoipa::path(
    post,
    path = "/api/v1/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Turn answered", body = ChatResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 404, description = "Session not found", body = crate::error::ApiError)
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.increment_requests();

    let question = req.question.trim();
    if question.is_empty() {
        return Err(AppError::BadRequest("Question cannot be empty".to_string()));
    }

    let session_id = match req.session_id {
        Some(id) if state.sessions.contains(&id).await => id,
        Some(id) => return Err(AppError::NotFound(format!("Session {id}"))),
        None => state.sessions.open().await,
    };

    tracing::info!(%session_id, "Processing chat turn");
    let turn = state.rag.respond(question).await;

    let response = ChatResponse {
        session_id,
        response: turn.answer.response.clone(),
        metadata: metadata_for(&turn.answer),
        diagnostic: turn.diagnostic,
        processing_time_ms: turn.processing_time_ms,
    };

    if !state.sessions.record(&session_id, question, turn.answer).await {
        tracing::warn!(%session_id, "Session ended before the turn was recorded");
    }

    Ok(Json(response))
}

/// One turn of a session
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TurnResponse {
    #[schema(example = "user")]
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ChatMetadata>,
    pub created_at: DateTime<Utc>,
}

impl From<&Turn> for TurnResponse {
    fn from(turn: &Turn) -> Self {
        let metadata = match &turn.content {
            TurnContent::Answer(answer) if turn.role == Role::Assistant => metadata_for(answer),
            _ => None,
        };
        Self {
            role: turn.role.to_string(),
            content: turn.text().to_string(),
            metadata,
            created_at: turn.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub turns: Vec<TurnResponse>,
}

/// Get the ordered turns of a session
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "chat",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session history", body = SessionResponse),
        (status = 404, description = "Session not found", body = crate::error::ApiError)
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id}")))?;

    Ok(Json(SessionResponse {
        session_id: id,
        turns: session.all().iter().map(TurnResponse::from).collect(),
    }))
}

/// End a session and discard its history
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}",
    tag = "chat",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session ended"),
        (status = 404, description = "Session not found", body = crate::error::ApiError)
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !state.sessions.remove(&id).await {
        return Err(AppError::NotFound(format!("Session {id}")));
    }
    tracing::info!(session_id = %id, "Session ended");
    Ok(StatusCode::NO_CONTENT)
}
