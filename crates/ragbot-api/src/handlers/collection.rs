//! Collection information handler

use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Collection description; fields fall back when the backend cannot be reached
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CollectionResponse {
    #[schema(example = "milvus_docs")]
    pub name: String,
    pub dimension: Option<usize>,
    #[schema(example = "COSINE")]
    pub metric: String,
    #[schema(value_type = Object)]
    pub schema: serde_json::Value,
    /// Entity count, or "Unknown"
    #[schema(example = "1532")]
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// Describe the configured vector collection
#[utoipa::path(
    get,
    path = "/api/v1/collection",
    tag = "collection",
    responses(
        (status = 200, description = "Collection description", body = CollectionResponse)
    )
)]
pub async fn collection_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = match state.rag.store().describe().await {
        Ok(info) => CollectionResponse {
            size: info.size_label(),
            name: info.name,
            dimension: info.dimension,
            metric: info.metric.to_string(),
            schema: info.schema,
            diagnostic: None,
        },
        Err(e) => {
            tracing::warn!("Failed to describe collection: {e}");
            CollectionResponse {
                name: state.config.vector.collection.clone(),
                dimension: None,
                metric: state.config.vector.metric.to_string(),
                schema: serde_json::Value::Null,
                size: "Unknown".to_string(),
                diagnostic: Some(e.to_string()),
            }
        }
    };

    Json(response)
}
