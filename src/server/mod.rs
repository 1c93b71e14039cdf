//! Server module - the two HTTP services
//!
//! - **Tool host**: session-addressed MCP endpoint serving hosted tools
//! - **Chat**: runs queries through the agent loop against the tool host

pub mod chat;
pub mod registry;
pub mod session;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::core::{Config, Result};
use crate::llm::OpenAiClient;
use crate::mcp::McpConnector;
use crate::tools::{ToolCatalog, ToolServer};

pub use chat::{ChatState, CHAT_PATH};
pub use registry::SessionRegistry;
pub use session::SessionContext;
pub use transport::{ToolHostState, MCP_PATH};

/// Run the tool host until Ctrl-C
pub async fn serve_tool_host(config: &Config) -> Result<()> {
    let server = Arc::new(ToolServer::from_config(config)?);
    let registry = SessionRegistry::new();

    let reaper = config.sessions.idle_ttl().map(|ttl| {
        info!(ttl_secs = ttl.as_secs(), "Idle session eviction enabled");
        registry.spawn_reaper(ttl, Duration::from_secs(config.sessions.reap_interval_secs.max(1)))
    });

    let app = transport::routes(ToolHostState::new(registry.clone(), server.clone()));
    let listener = TcpListener::bind(config.tool_host_addr()).await?;
    info!(
        addr = %listener.local_addr()?,
        tools = server.len(),
        "Tool host listening on {}",
        MCP_PATH
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(reaper) = reaper {
        reaper.abort();
    }
    registry.close_all();
    Ok(())
}

/// Run the chat endpoint until Ctrl-C
pub async fn serve_chat(config: &Config) -> Result<()> {
    let llm = Arc::new(OpenAiClient::from_config(config)?);
    let catalog = Arc::new(ToolCatalog::new(Arc::new(McpConnector::new(
        config.tool_host.clone(),
    ))));
    let agent = Arc::new(Agent::from_config(llm, config));

    let app = chat::routes(ChatState {
        agent,
        catalog: catalog.clone(),
    });
    let listener = TcpListener::bind(config.chat_addr()).await?;
    info!(
        addr = %listener.local_addr()?,
        tool_host = %config.tool_host.url,
        "Chat endpoint listening on {}",
        CHAT_PATH
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = catalog.disconnect().await {
        warn!(error = %e, "Failed to close tool host session");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
