//! Hosted tools - tools the tool host serves to its sessions
//!
//! A [`ToolServer`] is the registry every session on the host dispatches
//! `tools/list` and `tools/call` against.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{Config, Result};
use crate::mcp::protocol::Implementation;
use crate::mcp::{CallToolResult, ToolDescriptor};
use crate::tools::weather::WeatherTool;

/// A tool the host can run on behalf of a session
#[async_trait]
pub trait HostedTool: Send + Sync {
    /// Name, description and input schema advertised in `tools/list`
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool.
    ///
    /// `InvalidInput` errors are reported to the caller as invalid params;
    /// any other error is turned into an `isError` result.
    async fn call(&self, arguments: Value) -> Result<CallToolResult>;
}

/// Registry of hosted tools
pub struct ToolServer {
    info: Implementation,
    tools: HashMap<String, Arc<dyn HostedTool>>,
    /// Registration order, used for listing
    order: Vec<String>,
}

impl ToolServer {
    /// Create an empty server advertising `name`/`version`
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation {
                name: name.into(),
                version: version.into(),
            },
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// The weather server with its single `fetch-weather` tool
    pub fn from_config(config: &Config) -> Result<Self> {
        let weather = WeatherTool::new(&config.weather.api_url, config.tool_host.tool_timeout())?;
        Ok(Self::new("weather-server", env!("CARGO_PKG_VERSION")).with_tool(Arc::new(weather)))
    }

    /// Register a tool; a later registration under the same name replaces it
    pub fn register(&mut self, tool: Arc<dyn HostedTool>) {
        let name = tool.descriptor().name;
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn HostedTool>) -> Self {
        self.register(tool);
        self
    }

    pub fn info(&self) -> &Implementation {
        &self.info
    }

    /// Descriptors of all tools in registration order
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.descriptor())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn HostedTool>> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
