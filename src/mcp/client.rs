//! Streamable HTTP client for the tool host.
//!
//! One client owns one session: `connect` performs the `initialize`
//! handshake, remembers the `Mcp-Session-Id` the server assigned, and every
//! later request carries it. Responses may come back as plain JSON or as an
//! SSE stream that eventually carries the matching JSON-RPC response.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::core::{Result, ToolchatError};
use crate::mcp::protocol::*;
use crate::mcp::sse::SseDecoder;
use crate::mcp::ToolHost;

const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";
const POST_ACCEPT: &str = "application/json, text/event-stream";

/// Stream of server-initiated notifications from the GET channel.
pub type NotificationStream = BoxStream<'static, Result<JsonRpcNotification>>;

pub struct McpHttpClient {
    http: Client,
    endpoint: Url,
    protocol_version: String,
    session_id: Option<String>,
    server_info: Option<Implementation>,
    next_id: AtomicI64,
}

impl McpHttpClient {
    /// Open a session with the tool host at `endpoint`.
    pub async fn connect(
        endpoint: Url,
        protocol_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        let mut client = Self {
            http,
            endpoint,
            protocol_version: protocol_version.into(),
            session_id: None,
            server_info: None,
            next_id: AtomicI64::new(0),
        };

        let params = InitializeParams {
            protocol_version: client.protocol_version.clone(),
            capabilities: serde_json::json!({}),
            client_info: Implementation {
                name: "toolchat".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        };

        let id = client.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, "initialize", Some(serde_json::to_value(&params)?));
        let response = client.post(&request).await?;

        client.session_id = response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let result: InitializeResult =
            serde_json::from_value(Self::read_response(response, &request.id).await?.into_result()?)?;

        debug!(
            session = ?client.session_id,
            server = %result.server_info.name,
            protocol = %result.protocol_version,
            "Tool host session initialized"
        );
        client.protocol_version = result.protocol_version;
        client.server_info = Some(result.server_info);

        client.notify("notifications/initialized", None).await?;
        Ok(client)
    }

    /// Session identifier assigned by the server, if it issued one.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Name and version the server reported during `initialize`.
    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    /// Send a request and wait for its result.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        let response = self.post(&request).await?;
        Self::read_response(response, &request.id).await?.into_result()
    }

    /// Send a notification; the server answers 202 with no body.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.post(&JsonRpcNotification::new(method, params)).await?;
        Ok(())
    }

    /// Liveness check on the session.
    pub async fn ping(&self) -> Result<()> {
        self.request("ping", None).await.map(|_| ())
    }

    /// Open the GET channel and stream server notifications for this session.
    pub async fn subscribe(&self) -> Result<NotificationStream> {
        let response = self
            .with_session(self.http.get(self.endpoint.clone()))
            .header(ACCEPT, "text/event-stream")
            .timeout(Duration::from_secs(60 * 60 * 24))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = Self::check_status(response).await?;

        let events = response
            .bytes_stream()
            .scan(SseDecoder::new(), |decoder, chunk| {
                let events = match chunk {
                    Ok(bytes) => decoder
                        .feed(&bytes)
                        .into_iter()
                        .map(Ok)
                        .collect::<Vec<_>>(),
                    Err(e) => vec![Err(ToolchatError::from(e))],
                };
                futures::future::ready(Some(futures::stream::iter(events)))
            })
            .flatten()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => serde_json::from_str::<JsonRpcNotification>(&event.data)
                        .ok()
                        .map(Ok),
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(Box::pin(events))
    }

    /// Terminate the session on the server.
    pub async fn close(&self) -> Result<()> {
        if self.session_id.is_none() {
            return Ok(());
        }
        let response = self
            .with_session(self.http.delete(self.endpoint.clone()))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        // Servers that do not allow client-initiated termination answer 405.
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            return Ok(());
        }
        Self::check_status(response).await.map(|_| ())
    }

    fn with_session(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(PROTOCOL_VERSION_HEADER, &self.protocol_version);
        match &self.session_id {
            Some(id) => builder.header(MCP_SESSION_ID_HEADER, id),
            None => builder,
        }
    }

    async fn post(&self, body: &impl serde::Serialize) -> Result<reqwest::Response> {
        let response = self
            .with_session(self.http.post(self.endpoint.clone()))
            .header(ACCEPT, POST_ACCEPT)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Self::check_status(response).await
    }

    fn transport_error(&self, e: reqwest::Error) -> ToolchatError {
        if e.is_connect() {
            ToolchatError::tool_host(format!("Cannot connect to tool host at {}", self.endpoint))
        } else if e.is_timeout() {
            ToolchatError::timeout(format!("Tool host at {} did not respond", self.endpoint))
        } else {
            ToolchatError::from(e)
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ToolchatError::session("Tool host session expired or not found"));
        }

        // Session errors come back as a JSON-RPC error object.
        let text = response.text().await.unwrap_or_default();
        if let Ok(JsonRpcResponse { error: Some(err), .. }) = serde_json::from_str(&text) {
            return Err(ToolchatError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Err(ToolchatError::tool_host(format!("Tool host error ({}): {}", status, text)))
    }

    async fn read_response(response: reqwest::Response, id: &RequestId) -> Result<JsonRpcResponse> {
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        if !is_stream {
            let text = response.text().await?;
            return serde_json::from_str(&text).map_err(|e| {
                ToolchatError::tool_host(format!("Invalid JSON-RPC response: {}", e))
            });
        }

        let mut decoder = SseDecoder::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ToolchatError::tool_host(format!("Stream error: {}", e)))?;
            for event in decoder.feed(&chunk) {
                if let Some(found) = Self::match_event(&event.data, id) {
                    return Ok(found);
                }
            }
        }
        if let Some(event) = decoder.finish() {
            if let Some(found) = Self::match_event(&event.data, id) {
                return Ok(found);
            }
        }

        Err(ToolchatError::tool_host("Stream ended before a response arrived"))
    }

    fn match_event(data: &str, id: &RequestId) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Skipping malformed SSE payload");
                return None;
            }
        };
        match JsonRpcMessage::from_value(value)? {
            JsonRpcMessage::Response(resp) if resp.id.as_ref() == Some(id) => Some(resp),
            JsonRpcMessage::Notification(note) => {
                debug!(method = %note.method, "Tool host notification");
                None
            }
            _ => None,
        }
    }
}

#[async_trait]
impl ToolHost for McpHttpClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| serde_json::json!({ "cursor": c }));
            let page: ListToolsResult = serde_json::from_value(self.request("tools/list", params).await?)?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let result = self.request("tools/call", Some(serde_json::to_value(&params)?)).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn close(&self) -> Result<()> {
        McpHttpClient::close(self).await
    }
}
