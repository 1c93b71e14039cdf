//! MCP module - tool-host RPC protocol
//!
//! JSON-RPC wire types, SSE framing and the Streamable HTTP client used to
//! reach the tool host. The server side lives in [`crate::server`].

pub mod client;
pub mod protocol;
pub mod sse;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::config::ToolHostConfig;
use crate::core::Result;

pub use client::McpHttpClient;
pub use protocol::{CallToolResult, ToolDescriptor};

/// Session with a remote tool host.
#[async_trait]
pub trait ToolHost: Send + Sync {
    /// List the tools the host exposes.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool by name.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult>;

    /// End the session.
    async fn close(&self) -> Result<()>;
}

/// Opens sessions with a tool host.
#[async_trait]
pub trait ToolHostConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ToolHost>>;
}

/// Connects to a Streamable HTTP tool host described by configuration.
pub struct McpConnector {
    config: ToolHostConfig,
}

impl McpConnector {
    pub fn new(config: ToolHostConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ToolHostConnector for McpConnector {
    async fn connect(&self) -> Result<Arc<dyn ToolHost>> {
        let client = Arc::new(
            McpHttpClient::connect(
                self.config.url.clone(),
                self.config.protocol_version.clone(),
                Duration::from_secs(self.config.timeout_secs),
            )
            .await?,
        );
        info!(
            url = %self.config.url,
            session = client.session_id().unwrap_or("-"),
            "Connected to tool host"
        );

        // Server notifications are informational only.
        match client.subscribe().await {
            Ok(mut notifications) => {
                tokio::spawn(async move {
                    while let Some(Ok(note)) = notifications.next().await {
                        debug!(method = %note.method, params = ?note.params, "Tool host notification");
                    }
                });
            }
            Err(e) => debug!(error = %e, "Tool host offers no notification stream"),
        }

        Ok(client)
    }
}
