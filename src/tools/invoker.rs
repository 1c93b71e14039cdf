//! Tool invoker
//!
//! Runs one tool call against the tool host and always produces a string.
//! Failures become `"Error: <message>"` so the model can see them and react.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::ToolCall;
use crate::mcp::{CallToolResult, ToolHost};

#[derive(Debug, Clone)]
pub struct ToolInvoker {
    timeout: Duration,
}

impl ToolInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Invoke `call` and render its outcome; never fails
    pub async fn invoke(&self, host: &dyn ToolHost, call: &ToolCall) -> String {
        debug!(tool = %call.name, args = %call.arguments, "Invoking tool");

        let outcome = tokio::time::timeout(
            self.timeout,
            host.call_tool(&call.name, call.arguments.clone()),
        )
        .await;

        match outcome {
            Ok(Ok(result)) => render_result(result),
            Ok(Err(e)) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                error_text(e)
            }
            Err(_) => {
                warn!(tool = %call.name, timeout = ?self.timeout, "Tool call timed out");
                error_text(format!("Tool {} timed out after {}s", call.name, self.timeout.as_secs()))
            }
        }
    }
}

/// Text handed back to the model for a completed call
///
/// String content passes through; anything else is serialized to JSON.
/// A result flagged `isError` becomes an error string with its text.
pub fn render_result(result: CallToolResult) -> String {
    if result.is_error {
        let text = result.joined_text();
        return if text.is_empty() {
            error_text(result.content)
        } else {
            error_text(text)
        };
    }

    match result.content {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn error_text(message: impl std::fmt::Display) -> String {
    format!("Error: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Result, ToolchatError};
    use crate::mcp::ToolDescriptor;
    use async_trait::async_trait;
    use serde_json::json;

    enum Behavior {
        Reply(CallToolResult),
        Fail(&'static str),
        Hang,
    }

    struct FakeHost(Behavior);

    #[async_trait]
    impl ToolHost for FakeHost {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            Ok(Vec::new())
        }

        async fn call_tool(&self, _name: &str, _arguments: Value) -> Result<CallToolResult> {
            match &self.0 {
                Behavior::Reply(result) => Ok(result.clone()),
                Behavior::Fail(msg) => Err(ToolchatError::tool(*msg)),
                Behavior::Hang => std::future::pending().await,
            }
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn weather_call() -> ToolCall {
        ToolCall::new("c1", "fetch-weather", json!({"city": "Paris"}))
    }

    #[tokio::test]
    async fn test_structured_content_is_serialized() {
        let host = FakeHost(Behavior::Reply(CallToolResult::text("sunny 22C")));
        let out = ToolInvoker::new(Duration::from_secs(1))
            .invoke(&host, &weather_call())
            .await;
        assert_eq!(out, r#"[{"text":"sunny 22C","type":"text"}]"#);
    }

    #[tokio::test]
    async fn test_string_content_passes_through() {
        let host = FakeHost(Behavior::Reply(CallToolResult {
            content: json!("sunny 22C"),
            is_error: false,
        }));
        let out = ToolInvoker::new(Duration::from_secs(1))
            .invoke(&host, &weather_call())
            .await;
        assert_eq!(out, "sunny 22C");
    }

    #[tokio::test]
    async fn test_failure_becomes_error_string() {
        let host = FakeHost(Behavior::Fail("city not found"));
        let out = ToolInvoker::new(Duration::from_secs(1))
            .invoke(&host, &weather_call())
            .await;
        assert!(out.starts_with("Error: "));
        assert!(out.contains("city not found"));
    }

    #[tokio::test]
    async fn test_tool_reported_error() {
        let host = FakeHost(Behavior::Reply(CallToolResult::error("upstream 503")));
        let out = ToolInvoker::new(Duration::from_secs(1))
            .invoke(&host, &weather_call())
            .await;
        assert_eq!(out, "Error: upstream 503");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_error_string() {
        let host = FakeHost(Behavior::Hang);
        let out = ToolInvoker::new(Duration::from_secs(5))
            .invoke(&host, &weather_call())
            .await;
        assert_eq!(out, "Error: Tool fetch-weather timed out after 5s");
    }
}
