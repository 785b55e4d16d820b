//! Application state management

use ragbot_core::config::AppConfig;
use ragbot_core::Answer;
use ragbot_rag::{ConversationSession, RagOrchestrator};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Conversation sessions keyed by id; lost on restart.
///
/// There is no eviction: a session lives until `DELETE /api/v1/sessions/{id}`.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, ConversationSession>>,
}

impl SessionRegistry {
    /// Start an empty session and return its id
    pub async fn open(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions
            .write()
            .await
            .insert(id, ConversationSession::new());
        id
    }

    pub async fn contains(&self, id: &Uuid) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Append a question/answer pair. Returns false if the session has ended.
    pub async fn record(&self, id: &Uuid, question: &str, answer: Answer) -> bool {
        match self.sessions.write().await.get_mut(id) {
            Some(session) => {
                session.record_exchange(question, answer);
                true
            }
            None => false,
        }
    }

    /// Snapshot of a session
    pub async fn get(&self, id: &Uuid) -> Option<ConversationSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// End a session, discarding its history
    pub async fn remove(&self, id: &Uuid) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Answer pipeline, built once at startup
    pub rag: Arc<RagOrchestrator>,
    /// Live conversations
    pub sessions: SessionRegistry,
}

impl AppState {
    /// Create new application state with config and a connected orchestrator
    pub fn new(config: AppConfig, rag: Arc<RagOrchestrator>) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            rag,
            sessions: SessionRegistry::default(),
        }
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
