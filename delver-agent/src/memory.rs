//! Per-run conversational memory.
//!
//! A serializable message buffer. Agents append user, assistant, and
//! tool-exchange messages as the loop progresses; workflows persist the
//! buffer in the run's context store between turns.

use delver_llm::types::ChatMessage;
use serde::{Deserialize, Serialize};

/// Ordered conversation history for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMemory {
    messages: Vec<ChatMessage>,
}

impl ChatMemory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Append a user text message.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::user(text));
    }

    /// Append an assistant text message.
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::assistant(text));
    }

    /// The full history, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the memory is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delver_llm::types::Role;

    #[test]
    fn push_preserves_order() {
        let mut memory = ChatMemory::new();
        memory.push_user("question");
        memory.push_assistant("answer");

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.history()[0].role, Role::User);
        assert_eq!(memory.history()[1].role, Role::Assistant);
    }

    #[test]
    fn serde_roundtrip() {
        let mut memory = ChatMemory::new();
        memory.push_user("hi");
        let json = serde_json::to_value(&memory).unwrap();
        let back: ChatMemory = serde_json::from_value(json).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.history()[0].as_text().unwrap(), "hi");
    }
}
