//! Streamable HTTP transport for the tool host
//!
//! `POST /mcp` carries JSON-RPC messages, `GET /mcp` opens an SSE stream of
//! server notifications and `DELETE /mcp` ends the session. Every request
//! except the initialize that opens a session must name a live session in
//! the `mcp-session-id` header.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::watch;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::mcp::protocol::{
    error_codes, is_initialize_request, JsonRpcError, JsonRpcMessage, JsonRpcResponse,
    MCP_SESSION_ID_HEADER,
};
use crate::server::registry::SessionRegistry;
use crate::server::session::SessionContext;
use crate::tools::ToolServer;

pub const MCP_PATH: &str = "/mcp";

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Shared state of the tool-host endpoint
#[derive(Clone)]
pub struct ToolHostState {
    registry: SessionRegistry,
    server: Arc<ToolServer>,
}

impl ToolHostState {
    pub fn new(registry: SessionRegistry, server: Arc<ToolServer>) -> Self {
        Self { registry, server }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn session(&self, headers: &HeaderMap) -> Option<Arc<SessionContext>> {
        session_header(headers).and_then(|id| self.registry.get(id))
    }
}

/// Router serving the tool host at [`MCP_PATH`]
pub fn routes(state: ToolHostState) -> Router {
    Router::new()
        .route(
            MCP_PATH,
            post(handle_post).get(handle_get).delete(handle_delete),
        )
        .with_state(state)
}

fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
}

async fn handle_post(
    State(state): State<ToolHostState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Rejecting unparseable request body");
            return rpc_error(error_codes::PARSE_ERROR, "Parse error: Invalid JSON");
        }
    };

    let requested = session_header(&headers);
    let (context, created) = match requested.and_then(|id| state.registry.get(id)) {
        Some(context) => (context, false),
        None if requested.is_none() && is_initialize_request(&payload) => {
            (state.registry.open(state.server.clone()), true)
        }
        None => {
            debug!(session = ?requested, "No valid session for request");
            return rpc_error(
                error_codes::BAD_REQUEST,
                "Bad Request: No valid session ID provided",
            );
        }
    };
    context.touch();

    let Some(message) = JsonRpcMessage::from_value(payload) else {
        return rpc_error(error_codes::INVALID_REQUEST, "Invalid Request");
    };

    let response = context.handle(message).await;

    // A failed initialize leaves no half-open session behind.
    if created && response.as_ref().is_some_and(|r| r.error.is_some()) {
        context.close();
    }

    let mut reply = match response {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };
    if !context.is_closed() {
        if let Ok(value) = HeaderValue::from_str(context.id()) {
            reply.headers_mut().insert(MCP_SESSION_ID_HEADER, value);
        }
    }
    reply
}

async fn handle_get(State(state): State<ToolHostState>, headers: HeaderMap) -> Response {
    let Some(context) = state.session(&headers) else {
        return invalid_session();
    };
    context.touch();
    debug!(session = %context.id(), "Opening notification stream");

    let events = BroadcastStream::new(context.subscribe())
        .filter_map(|received| async move {
            match received {
                Ok(notification) => Event::default()
                    .event("message")
                    .json_data(notification)
                    .ok()
                    .map(Ok::<_, Infallible>),
                Err(e) => {
                    warn!(error = %e, "Notification stream lagged");
                    None
                }
            }
        })
        .take_until(wait_closed(context.closed()));

    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive"))
        .into_response()
}

async fn handle_delete(State(state): State<ToolHostState>, headers: HeaderMap) -> Response {
    let Some(context) = state.session(&headers) else {
        return invalid_session();
    };
    if context.close() {
        info!(session = %context.id(), "Session terminated by client");
    }
    StatusCode::OK.into_response()
}

async fn wait_closed(mut closed: watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

fn rpc_error(code: i64, message: &str) -> Response {
    let body = JsonRpcResponse::failure(None, JsonRpcError::new(code, message));
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn invalid_session() -> Response {
    (StatusCode::BAD_REQUEST, "Invalid or missing session ID").into_response()
}
