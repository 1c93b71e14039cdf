#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use toolchat::core::config::AgentConfig;
use toolchat::core::{Message, Result, Segment, ToolCall, ToolDefinition, ToolchatError};
use toolchat::llm::{LlmProvider, LlmResponse};
use toolchat::mcp::{CallToolResult, ToolDescriptor, ToolHost, ToolHostConnector};
use toolchat::tools::{ToolCatalog, ToolInvoker};
use toolchat::Agent;

/// LLM that replays canned responses and records every history it saw
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<LlmResponse>>>,
    /// Replayed forever once the script runs out
    fallback: Option<Vec<Segment>>,
    pub histories: Mutex<Vec<Vec<Message>>>,
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(script: Vec<Vec<Segment>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|segments| Ok(LlmResponse::from_segments(segments)))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    /// Answer every round with the same segments
    pub fn repeating(segments: Vec<Segment>) -> Self {
        Self {
            fallback: Some(segments),
            ..Default::default()
        }
    }

    /// Fail the first call
    pub fn failing(message: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([Err(ToolchatError::llm(message))])),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn history(&self, round: usize) -> Vec<Message> {
        self.histories.lock().unwrap()[round].clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, messages: &[Message], _tools: &[ToolDefinition]) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.histories.lock().unwrap().push(messages.to_vec());

        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.fallback {
            Some(segments) => Ok(LlmResponse::from_segments(segments.clone())),
            None => Err(ToolchatError::llm("script exhausted")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn text(value: &str) -> Segment {
    Segment::Text(value.to_string())
}

pub fn call(id: &str, name: &str, args: Value) -> Segment {
    Segment::ToolCall(ToolCall::new(id, name, args))
}

/// Tool host with a weather tool that knows Paris and fails elsewhere
pub struct FakeToolHost {
    pub calls: Mutex<Vec<(String, Value)>>,
    pub delay: Duration,
}

impl FakeToolHost {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn call_log(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolHost for FakeToolHost {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(vec![ToolDescriptor {
            name: "fetch-weather".into(),
            title: Some("Weather Fetcher".into()),
            description: "Get weather data for a city".into(),
            input_schema: json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }),
        }])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        self.calls.lock().unwrap().push((name.to_string(), arguments.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match arguments.get("city").and_then(Value::as_str) {
            Some("Paris") => Ok(CallToolResult {
                content: json!("sunny 22C"),
                is_error: false,
            }),
            Some("London") => Ok(CallToolResult {
                content: json!("rain 14C"),
                is_error: false,
            }),
            Some(city) => Err(ToolchatError::tool(format!("no weather for {}", city))),
            None => Err(ToolchatError::tool("city is required")),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Connector handing out one shared host and counting connects
pub struct FakeConnector {
    pub host: Arc<FakeToolHost>,
    pub connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(host: Arc<FakeToolHost>) -> Self {
        Self {
            host,
            connects: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ToolHostConnector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn ToolHost>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.host.clone())
    }
}

pub fn agent_config(max_rounds: usize, parallel_tools: bool) -> AgentConfig {
    AgentConfig {
        max_rounds,
        parallel_tools,
        debug: false,
        system_prompt: None,
    }
}

pub fn agent(llm: Arc<ScriptedLlm>, config: AgentConfig) -> Agent {
    Agent::new(llm, ToolInvoker::new(Duration::from_secs(5)), config)
}

pub fn catalog(host: Arc<FakeToolHost>) -> ToolCatalog {
    ToolCatalog::new(Arc::new(FakeConnector::new(host)))
}
