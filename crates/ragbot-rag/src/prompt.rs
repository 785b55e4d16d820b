//! Prompt assembly for grounded answers

use ragbot_core::{ChatMessage, Passage};

/// Builds the system/user message pair sent to the chat model
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    topic: String,
}

impl PromptAssembler {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    pub fn system_instruction(&self) -> String {
        format!(
            "You are a helpful AI assistant that provides clear, accurate answers about {} \
             based on the given context. Use markdown formatting for better readability.",
            self.topic
        )
    }

    /// Number passages from 1 and separate them by a blank line
    pub fn format_context(passages: &[Passage]) -> String {
        passages
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}. {}", i + 1, p.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn build_messages(&self, question: &str, passages: &[Passage]) -> Vec<ChatMessage> {
        let user = format!(
            "Question: {question}\n\nContext: {}",
            Self::format_context(passages)
        );
        vec![
            ChatMessage::system(self.system_instruction()),
            ChatMessage::user(user),
        ]
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new("Milvus")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragbot_core::MessageRole;

    fn passage(content: &str) -> Passage {
        Passage {
            content: content.to_string(),
            similarity: 90.0,
        }
    }

    #[test]
    fn test_system_instruction_names_topic() {
        let prompt = PromptAssembler::new("Qdrant");
        assert_eq!(
            prompt.system_instruction(),
            "You are a helpful AI assistant that provides clear, accurate answers about Qdrant \
             based on the given context. Use markdown formatting for better readability."
        );
    }

    #[test]
    fn test_context_is_numbered() {
        let context = PromptAssembler::format_context(&[
            passage("Milvus is a vector database."),
            passage("It supports IVF_FLAT."),
            passage("And HNSW."),
        ]);
        assert_eq!(
            context,
            "1. Milvus is a vector database.\n\n2. It supports IVF_FLAT.\n\n3. And HNSW."
        );
    }

    #[test]
    fn test_build_messages() {
        let messages = PromptAssembler::default().build_messages("What is Milvus?", &[passage("A")]);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.contains("about Milvus"));
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[1].content, "Question: What is Milvus?\n\nContext: 1. A");
    }
}
