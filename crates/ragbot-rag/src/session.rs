//! Per-conversation turn history
//!
//! Turns are append-only and kept in insertion order. Nothing is persisted.

use ragbot_core::{Answer, Role, Turn};

/// Ordered history of one conversation
#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    turns: Vec<Turn>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.append(Turn::user(text));
    }

    pub fn push_assistant(&mut self, answer: Answer) {
        self.append(Turn::assistant(answer));
    }

    /// Record a question and its answer as two consecutive turns
    pub fn record_exchange(&mut self, question: impl Into<String>, answer: Answer) {
        self.push_user(question);
        self.push_assistant(answer);
    }

    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent assistant answer, if any
    pub fn last_answer(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == Role::Assistant)
    }
}
