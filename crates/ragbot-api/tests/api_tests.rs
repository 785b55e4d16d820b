//! API Integration Tests
//!
//! The router runs against an in-process vector store and fake model clients.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use ragbot_api::{create_router, state::AppState};
use ragbot_core::config::AppConfig;
use ragbot_core::{
    ChatClient, ChatMessage, Embedding, EmbeddingClient, Metric, Payload, RagConfig, RagError,
    Record, Result, VectorStore,
};
use ragbot_rag::{RagOrchestrator, NO_KNOWLEDGE_RESPONSE, UPSTREAM_FAILURE_RESPONSE};
use ragbot_vector::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct AxisEmbedder {
    fail: bool,
}

#[async_trait]
impl EmbeddingClient for AxisEmbedder {
    async fn embed(&self, _text: &str) -> Result<Embedding> {
        if self.fail {
            return Err(RagError::EmbeddingError("quota exceeded".to_string()));
        }
        Ok(Embedding::new(vec![1.0, 0.0]))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut out = Vec::new();
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        2
    }
}

struct EchoChat;

#[async_trait]
impl ChatClient for EchoChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        Ok(format!("answered from {} messages", messages.len()))
    }
}

async fn seeded_store(records: usize) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new("milvus_docs", 2, Metric::Cosine));
    store.ensure_collection().await.unwrap();
    let records: Vec<Record> = (0..records as u64)
        .map(|i| Record {
            id: i,
            vector: Embedding::new(vec![1.0, i as f32 * 0.1]),
            payload: Payload::new().with("text", format!("passage {i}")),
        })
        .collect();
    store.insert(&records).await.unwrap();
    store
}

fn test_app(store: Arc<MemoryStore>, fail_embedding: bool) -> Router {
    let rag = RagOrchestrator::new(
        Arc::new(AxisEmbedder {
            fail: fail_embedding,
        }),
        store,
        Arc::new(EchoChat),
        &RagConfig::default(),
    );
    let mut config = AppConfig::default();
    config.vector.collection = "milvus_docs".to_string();
    create_router(Arc::new(AppState::new(config, Arc::new(rag))))
}

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = test_app(seeded_store(0).await, false);

    let response = app
        .oneshot(create_json_request("GET", "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = test_app(seeded_store(0).await, false);

    let response = app
        .oneshot(create_json_request("GET", "/ready", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["backend"], "memory");
}

#[tokio::test]
async fn test_not_ready_without_collection() {
    let store = Arc::new(MemoryStore::new("missing", 2, Metric::Cosine));
    let app = test_app(store, false);

    let response = app
        .oneshot(create_json_request("GET", "/ready", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Chat API Tests
// =============================================================================

#[tokio::test]
async fn test_chat_returns_sources() {
    let app = test_app(seeded_store(5).await, false);

    let request = create_json_request(
        "POST",
        "/api/v1/chat",
        Some(json!({ "question": "What is Milvus?" })),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["session_id"].is_string());
    assert_eq!(json["response"], "answered from 2 messages");
    assert_eq!(json["metadata"]["total_sources"], 3);
    assert_eq!(json["metadata"]["sources"].as_array().unwrap().len(), 3);
    assert_eq!(json["metadata"]["sources"][0]["content"], "passage 0");
    assert_eq!(json["metadata"]["sources"][0]["similarity"], 100.0);
    assert!(json.get("diagnostic").is_none());
}

#[tokio::test]
async fn test_chat_empty_collection_is_no_knowledge() {
    let app = test_app(seeded_store(0).await, false);

    let request = create_json_request("POST", "/api/v1/chat", Some(json!({ "question": "q" })));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["response"], NO_KNOWLEDGE_RESPONSE);
    assert!(json["metadata"].is_null());
}

#[tokio::test]
async fn test_chat_upstream_failure_has_diagnostic() {
    let app = test_app(seeded_store(3).await, true);

    let request = create_json_request("POST", "/api/v1/chat", Some(json!({ "question": "q" })));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["response"], UPSTREAM_FAILURE_RESPONSE);
    assert!(json["metadata"].is_null());
    assert!(json["diagnostic"]
        .as_str()
        .unwrap()
        .contains("quota exceeded"));
}

#[tokio::test]
async fn test_chat_empty_question() {
    let app = test_app(seeded_store(1).await, false);

    for question in ["", "   "] {
        let request = create_json_request(
            "POST",
            "/api/v1/chat",
            Some(json!({ "question": question })),
        );
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["code"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn test_chat_unknown_session() {
    let app = test_app(seeded_store(1).await, false);

    let request = create_json_request(
        "POST",
        "/api/v1/chat",
        Some(json!({
            "question": "q",
            "session_id": "00000000-0000-4000-8000-000000000000"
        })),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Session API Tests
// =============================================================================

#[tokio::test]
async fn test_session_keeps_turn_order() {
    let app = test_app(seeded_store(2).await, false);

    let first = app
        .clone()
        .oneshot(create_json_request(
            "POST",
            "/api/v1/chat",
            Some(json!({ "question": "first" })),
        ))
        .await
        .unwrap();
    let session_id = body_json(first).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let second = app
        .clone()
        .oneshot(create_json_request(
            "POST",
            "/api/v1/chat",
            Some(json!({ "question": "second", "session_id": session_id })),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(create_json_request(
            "GET",
            &format!("/api/v1/sessions/{session_id}"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let turns = json["turns"].as_array().unwrap();
    let roles: Vec<_> = turns.iter().map(|t| t["role"].as_str().unwrap()).collect();
    assert_eq!(roles, ["user", "assistant", "user", "assistant"]);
    assert_eq!(turns[0]["content"], "first");
    assert_eq!(turns[2]["content"], "second");
    assert_eq!(turns[1]["metadata"]["total_sources"], 2);

    let deleted = app
        .clone()
        .oneshot(create_json_request(
            "DELETE",
            &format!("/api/v1/sessions/{session_id}"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = app
        .oneshot(create_json_request(
            "GET",
            &format!("/api/v1/sessions/{session_id}"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = test_app(seeded_store(0).await, false);

    let response = app
        .oneshot(create_json_request(
            "GET",
            "/api/v1/sessions/00000000-0000-4000-8000-000000000000",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

// =============================================================================
// Collection API Tests
// =============================================================================

#[tokio::test]
async fn test_collection_info() {
    let app = test_app(seeded_store(4).await, false);

    let response = app
        .oneshot(create_json_request("GET", "/api/v1/collection", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "milvus_docs");
    assert_eq!(json["size"], "4");
    assert_eq!(json["dimension"], 2);
    assert_eq!(json["metric"], "COSINE");
    assert!(json["schema"]["fields"].is_array());
}

#[tokio::test]
async fn test_collection_info_unknown_size_on_failure() {
    let store = Arc::new(MemoryStore::new("missing", 2, Metric::Cosine));
    let app = test_app(store, false);

    let response = app
        .oneshot(create_json_request("GET", "/api/v1/collection", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["size"], "Unknown");
    assert_eq!(json["name"], "milvus_docs");
    assert!(json["diagnostic"].is_string());
}

#[tokio::test]
async fn test_openapi_document() {
    let app = test_app(seeded_store(0).await, false);

    let response = app
        .oneshot(create_json_request("GET", "/api-docs/openapi.json", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/api/v1/chat"].is_object());
}
