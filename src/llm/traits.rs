//! LLM Provider trait for abstracting different backends
//!
//! The agentic loop only needs one capability: given the history and the tool
//! catalog, return a response made of text and tool-call segments.

use async_trait::async_trait;

use crate::core::{has_tool_calls, Message, Result, Segment, ToolCall, ToolDefinition};

/// Response from an LLM provider
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// Text and tool-call segments in the order the model produced them
    pub segments: Vec<Segment>,
    /// Token usage information
    pub usage: Option<TokenUsage>,
    /// Model that generated the response
    pub model: String,
}

impl LlmResponse {
    /// Build a response from segments alone
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            ..Default::default()
        }
    }

    /// Whether the model asked for at least one tool
    pub fn has_tool_calls(&self) -> bool {
        has_tool_calls(&self.segments)
    }

    /// Tool calls in declaration order
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.segments.iter().filter_map(|s| match s {
            Segment::ToolCall(call) => Some(call),
            Segment::Text(_) => None,
        })
    }
}

/// Token usage information
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one inference over the history with the given tool catalog
    async fn complete(&self, messages: &[Message], tools: &[ToolDefinition])
        -> Result<LlmResponse>;

    /// Get the provider name
    fn name(&self) -> &str;
}
