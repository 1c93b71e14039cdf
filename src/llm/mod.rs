//! LLM module - Language Model integrations
//!
//! Provides the provider abstraction used by the agentic loop and an
//! OpenAI-compatible implementation.

pub mod openai;
pub mod traits;

pub use openai::OpenAiClient;
pub use traits::{LlmProvider, LlmResponse, TokenUsage};
