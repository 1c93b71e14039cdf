//! Toolchat - Agentic Tool-Calling Chat
//!
//! A chat service that answers queries by letting an LLM call tools served
//! by a separate, session-addressed MCP tool host.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: LLM provider abstraction with an OpenAI-compatible implementation
//! - **MCP**: JSON-RPC wire types and the Streamable HTTP client
//! - **Tools**: Tool catalog bridge, tool invoker and hosted tools
//! - **Agent**: The tool-calling loop
//! - **Server**: Tool host session router and chat endpoint
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use toolchat::agent::Agent;
//! use toolchat::llm::OpenAiClient;
//! use toolchat::mcp::McpConnector;
//! use toolchat::tools::ToolCatalog;
//! use toolchat::Config;
//!
//! #[tokio::main]
//! async fn main() -> toolchat::Result<()> {
//!     let config = Config::load();
//!     let catalog = ToolCatalog::new(Arc::new(McpConnector::new(config.tool_host.clone())));
//!     let agent = Agent::from_config(Arc::new(OpenAiClient::from_config(&config)?), &config);
//!
//!     let tools = catalog.ensure_connected().await?;
//!     for step in agent.run("What's the weather in Paris?", &tools).await? {
//!         println!("{}", step.value());
//!     }
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod core;
pub mod llm;
pub mod mcp;
pub mod server;
pub mod tools;

// Re-export commonly used items
pub use agent::Agent;
pub use core::{Config, Result, Step, ToolchatError};
