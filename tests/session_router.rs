//! `/mcp` session routing through the axum router, driven with `oneshot`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use toolchat::mcp::protocol::MCP_SESSION_ID_HEADER;
use toolchat::mcp::{CallToolResult, ToolDescriptor};
use toolchat::server::transport::{routes, ToolHostState};
use toolchat::server::SessionRegistry;
use toolchat::tools::{HostedTool, ToolServer};

struct Echo;

#[async_trait]
impl HostedTool for Echo {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "echo".into(),
            title: None,
            description: "Echo the message".into(),
            input_schema: json!({"type": "object", "properties": {"message": {"type": "string"}}}),
        }
    }

    async fn call(&self, arguments: Value) -> toolchat::Result<CallToolResult> {
        Ok(CallToolResult::text(
            arguments["message"].as_str().unwrap_or_default(),
        ))
    }
}

fn app() -> (Router, SessionRegistry) {
    let registry = SessionRegistry::new();
    let server = Arc::new(ToolServer::new("test-host", "0.0.0").with_tool(Arc::new(Echo)));
    (routes(ToolHostState::new(registry.clone(), server)), registry)
}

fn initialize_body() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 0,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "router-test", "version": "1.0"}
        }
    })
}

fn post(session: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json, text/event-stream");
    if let Some(id) = session {
        builder = builder.header(MCP_SESSION_ID_HEADER, id);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare(method: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/mcp");
    if let Some(id) = session {
        builder = builder.header(MCP_SESSION_ID_HEADER, id);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn session_id(response: &Response) -> Option<String> {
    response
        .headers()
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn open_session(app: &Router) -> String {
    let response = app.clone().oneshot(post(None, &initialize_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    session_id(&response).expect("initialize response carries a session id")
}

async fn wait_for_len(registry: &SessionRegistry, expected: usize) {
    for _ in 0..100 {
        if registry.len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("registry has {} sessions, expected {}", registry.len(), expected);
}

fn bad_session_body() -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": {"code": -32000, "message": "Bad Request: No valid session ID provided"},
        "id": null
    })
}

#[tokio::test]
async fn test_initialize_creates_session() {
    let (app, registry) = app();

    let response = app.clone().oneshot(post(None, &initialize_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let id = session_id(&response).unwrap();
    assert!(!id.is_empty());
    assert_eq!(registry.len(), 1);
    assert!(registry.contains(&id));

    let body = body_json(response).await;
    assert_eq!(body["id"], 0);
    assert_eq!(body["result"]["serverInfo"]["name"], "test-host");
    assert_eq!(body["result"]["protocolVersion"], "2025-03-26");
}

#[tokio::test]
async fn test_sessions_get_distinct_ids() {
    let (app, registry) = app();
    let first = open_session(&app).await;
    let second = open_session(&app).await;
    assert_ne!(first, second);
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn test_known_session_is_reused() {
    let (app, registry) = app();
    let id = open_session(&app).await;

    let initialized = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let response = app.clone().oneshot(post(Some(&id), &initialized)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let list = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
    let response = app.clone().oneshot(post(Some(&id), &list)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session_id(&response).as_deref(), Some(id.as_str()));
    let body = body_json(response).await;
    assert_eq!(body["result"]["tools"][0]["name"], "echo");

    let call = json!({
        "jsonrpc": "2.0", "id": 2, "method": "tools/call",
        "params": {"name": "echo", "arguments": {"message": "hello"}}
    });
    let body = body_json(app.clone().oneshot(post(Some(&id), &call)).await.unwrap()).await;
    assert_eq!(body["result"]["content"][0]["text"], "hello");

    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_post_without_session_is_rejected() {
    let (app, registry) = app();

    let list = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
    let response = app.clone().oneshot(post(None, &list)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, bad_session_body());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_post_with_unknown_session_is_rejected() {
    let (app, registry) = app();
    open_session(&app).await;

    // Even an initialize body does not open a session under a made-up id.
    let response = app
        .clone()
        .oneshot(post(Some("not-a-session"), &initialize_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, bad_session_body());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_get_and_delete_need_known_session() {
    let (app, registry) = app();
    open_session(&app).await;

    for method in ["GET", "DELETE"] {
        for session in [None, Some("unknown")] {
            let response = app.clone().oneshot(bare(method, session)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{} {:?}", method, session);
            assert_eq!(body_text(response).await, "Invalid or missing session ID");
        }
    }
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_get_opens_event_stream() {
    let (app, _registry) = app();
    let id = open_session(&app).await;

    let response = app.clone().oneshot(bare("GET", Some(&id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));
}

#[tokio::test]
async fn test_delete_closes_session_once() {
    let (app, registry) = app();
    let id = open_session(&app).await;
    let other = open_session(&app).await;

    let response = app.clone().oneshot(bare("DELETE", Some(&id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The id is dead for every verb right away.
    let list = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
    let response = app.clone().oneshot(post(Some(&id), &list)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = app.clone().oneshot(bare("DELETE", Some(&id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    wait_for_len(&registry, 1).await;
    assert!(registry.contains(&other));
}

#[tokio::test]
async fn test_failed_initialize_leaves_no_session() {
    let (app, registry) = app();

    let bad = json!({"jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {}});
    let response = app.clone().oneshot(post(None, &bad)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_id(&response).is_none());
    assert_eq!(body_json(response).await["error"]["code"], -32602);

    wait_for_len(&registry, 0).await;
}

#[tokio::test]
async fn test_malformed_bodies() {
    let (app, _registry) = app();
    let id = open_session(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .header(MCP_SESSION_ID_HEADER, &id)
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], -32700);

    let response = app
        .clone()
        .oneshot(post(Some(&id), &json!({"hello": "world"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], -32600);

    let unknown = json!({"jsonrpc": "2.0", "id": 9, "method": "resources/list"});
    let body = body_json(app.clone().oneshot(post(Some(&id), &unknown)).await.unwrap()).await;
    assert_eq!(body["error"]["code"], -32601);
}
