//! Per-session protocol context
//!
//! A [`SessionContext`] owns the protocol state of one client session:
//! whether it has been initialized, the channel for server-initiated
//! notifications and the close signal its registry entry waits on. Requests
//! on one session are handled one at a time.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::core::ToolchatError;
use crate::mcp::protocol::{
    error_codes, CallToolParams, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    LATEST_PROTOCOL_VERSION,
};
use crate::mcp::CallToolResult;
use crate::tools::ToolServer;

/// Protocol versions this host can speak, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

/// Buffered notifications per session before slow subscribers lag
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Default)]
struct ProtocolState {
    protocol_version: Option<String>,
}

pub struct SessionContext {
    id: String,
    server: Arc<ToolServer>,
    protocol: tokio::sync::Mutex<ProtocolState>,
    last_seen: Mutex<Instant>,
    closed: watch::Sender<bool>,
    events: broadcast::Sender<JsonRpcNotification>,
}

impl SessionContext {
    pub(crate) fn new(id: String, server: Arc<ToolServer>) -> Self {
        let (closed, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            id,
            server,
            protocol: tokio::sync::Mutex::new(ProtocolState::default()),
            last_seen: Mutex::new(Instant::now()),
            closed,
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Signal close; returns `true` only for the call that closed it
    pub fn close(&self) -> bool {
        self.closed.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    /// Receiver that flips to `true` once the session is closed
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    pub fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Subscribe to server-initiated notifications
    pub fn subscribe(&self) -> broadcast::Receiver<JsonRpcNotification> {
        self.events.subscribe()
    }

    /// Push a notification to every open GET stream of this session
    pub fn publish(&self, notification: JsonRpcNotification) {
        // No receivers just means no stream is open.
        let _ = self.events.send(notification);
    }

    /// Handle one inbound message; `None` when no response body is due
    pub async fn handle(&self, message: JsonRpcMessage) -> Option<JsonRpcResponse> {
        let mut protocol = self.protocol.lock().await;
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(&mut protocol, request).await),
            JsonRpcMessage::Notification(notification) => {
                match notification.method.as_str() {
                    "notifications/initialized" => debug!(session = %self.id, "Client ready"),
                    other => debug!(session = %self.id, method = other, "Ignoring notification"),
                }
                None
            }
            JsonRpcMessage::Response(_) => {
                debug!(session = %self.id, "Ignoring client response");
                None
            }
        }
    }

    async fn handle_request(
        &self,
        protocol: &mut ProtocolState,
        request: JsonRpcRequest,
    ) -> JsonRpcResponse {
        let id = request.id.clone();
        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(protocol, request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(request.params).await,
            method => Err(JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(Some(id), error),
        }
    }

    fn initialize(
        &self,
        protocol: &mut ProtocolState,
        params: Option<Value>,
    ) -> Result<Value, JsonRpcError> {
        if protocol.protocol_version.is_some() {
            return Err(JsonRpcError::new(
                error_codes::INVALID_REQUEST,
                "Invalid Request: Server already initialized",
            ));
        }

        let params: InitializeParams = parse_params(params)?;
        let version = if SUPPORTED_PROTOCOL_VERSIONS.contains(&params.protocol_version.as_str()) {
            params.protocol_version
        } else {
            LATEST_PROTOCOL_VERSION.to_string()
        };

        info!(
            session = %self.id,
            client = %params.client_info.name,
            protocol = %version,
            "Session initialized"
        );
        protocol.protocol_version = Some(version.clone());

        let result = InitializeResult {
            protocol_version: version,
            capabilities: json!({
                "tools": { "listChanged": false },
                "logging": {}
            }),
            server_info: self.server.info().clone(),
        };
        to_value(result)
    }

    fn list_tools(&self) -> Result<Value, JsonRpcError> {
        to_value(ListToolsResult {
            tools: self.server.descriptors(),
            next_cursor: None,
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = parse_params(params)?;
        let tool = self.server.get(&params.name).ok_or_else(|| {
            JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!("Unknown tool: {}", params.name),
            )
        })?;

        self.publish(JsonRpcNotification::new(
            "notifications/message",
            Some(json!({
                "level": "info",
                "logger": "tools",
                "data": format!("Calling {}", params.name)
            })),
        ));

        let result = match tool.call(params.arguments).await {
            Ok(result) => result,
            Err(ToolchatError::InvalidInput(message)) => {
                return Err(JsonRpcError::new(error_codes::INVALID_PARAMS, message));
            }
            Err(e) => {
                warn!(session = %self.id, tool = %params.name, error = %e, "Hosted tool failed");
                CallToolResult::error(e.to_string())
            }
        };
        to_value(result)
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(|e| {
        JsonRpcError::new(error_codes::INVALID_PARAMS, format!("Invalid params: {}", e))
    })
}

fn to_value(result: impl serde::Serialize) -> Result<Value, JsonRpcError> {
    serde_json::to_value(result)
        .map_err(|e| JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string()))
}
