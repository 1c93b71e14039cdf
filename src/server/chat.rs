//! Chat endpoint
//!
//! `POST /api/chat` with `{"query": "..."}` runs the agent loop and answers
//! `{"steps": [...]}`. Failures answer `{"error": "..."}`: 400 when the
//! request itself is at fault, 500 otherwise.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::agent::Agent;
use crate::core::{Step, ToolchatError};
use crate::tools::ToolCatalog;

pub const CHAT_PATH: &str = "/api/chat";

/// Shared state of the chat endpoint
#[derive(Clone)]
pub struct ChatState {
    pub agent: Arc<Agent>,
    pub catalog: Arc<ToolCatalog>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub steps: Vec<Step>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error answered by the chat endpoint
#[derive(Debug)]
pub enum ChatError {
    BadRequest(String),
    Internal(String),
}

impl From<ToolchatError> for ChatError {
    fn from(err: ToolchatError) -> Self {
        match err {
            ToolchatError::InvalidInput(message) => Self::BadRequest(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ChatError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Router serving the chat endpoint at [`CHAT_PATH`]
pub fn routes(state: ChatState) -> Router {
    Router::new()
        .route(CHAT_PATH, post(chat))
        .with_state(state)
}

async fn chat(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let Json(request) = payload?;
    let query = request
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ChatError::BadRequest("Query is required".to_string()))?;

    info!(query = %query, "Chat request");

    let tools = state.catalog.ensure_connected().await.map_err(failed)?;
    let steps = state.agent.run(&query, &tools).await.map_err(failed)?;

    Ok(Json(ChatResponse { steps }))
}

fn failed(err: ToolchatError) -> ChatError {
    error!(error = %err, "Chat request failed");
    ChatError::from(err)
}
