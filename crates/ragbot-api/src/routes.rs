//! API route definitions

use crate::handlers::{chat, collection};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Conversation endpoints
        .route("/chat", post(chat::chat_handler))
        .route(
            "/sessions/:id",
            get(chat::get_session).delete(chat::delete_session),
        )
        // Collection endpoints
        .route("/collection", get(collection::collection_info))
}
