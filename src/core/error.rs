//! Custom error types for Toolchat
//!
//! Provides a unified error handling system across all modules.

use std::sync::Arc;

use thiserror::Error;

/// Main error type for Toolchat operations
#[derive(Error, Debug)]
pub enum ToolchatError {
    /// LLM connection or API errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Tool host connection or protocol errors
    #[error("Tool host error: {0}")]
    ToolHost(String),

    /// JSON-RPC error object returned by the tool host
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Session routing errors
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied bad input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An operation exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// One failure handed to every caller that waited on the same attempt
    #[error(transparent)]
    Shared(Arc<ToolchatError>),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// JSON-RPC code the tool host answers with for an unknown session id
const SESSION_REJECTED: i64 = -32000;

/// Convenience Result type for Toolchat operations
pub type Result<T> = std::result::Result<T, ToolchatError>;

impl ToolchatError {
    /// Create an LLM error
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Create a tool host error
    pub fn tool_host(msg: impl Into<String>) -> Self {
        Self::ToolHost(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a session error
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Whether the caller, not the system, is at fault
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidInput(_) => true,
            Self::Shared(inner) => inner.is_client_error(),
            _ => false,
        }
    }

    /// Whether the tool host no longer recognises the session a request named
    pub fn is_session_lost(&self) -> bool {
        match self {
            Self::Session(_) => true,
            Self::Rpc { code, .. } => *code == SESSION_REJECTED,
            Self::Shared(inner) => inner.is_session_lost(),
            _ => false,
        }
    }
}
