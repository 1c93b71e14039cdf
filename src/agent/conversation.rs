//! Conversation history for a single agent run
//!
//! Append-only: the loop never drops or rewrites earlier messages, because
//! every tool result must stay paired with the assistant turn that asked for
//! it.

use crate::core::Message;

/// Ordered message history sent to the LLM each round
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create a conversation, optionally starting with a system prompt
    pub fn new(system_prompt: Option<&str>) -> Self {
        let mut messages = Vec::new();
        if let Some(prompt) = system_prompt {
            messages.push(Message::system(prompt));
        }
        Self { messages }
    }

    /// Add a user message
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in order, system prompt first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
