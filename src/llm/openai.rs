//! OpenAI-compatible chat completions client
//!
//! Async HTTP client for `/chat/completions` with tool calling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::core::{Config, Message, Result, Role, Segment, ToolCall, ToolDefinition, ToolchatError};
use crate::llm::traits::{LlmProvider, LlmResponse, TokenUsage};

/// OpenAI API client
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

/// Message in the OpenAI wire format
#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: Role,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// Tool call in the OpenAI wire format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunction,
}

/// Function invocation; arguments travel as a JSON string
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAiClient {
    /// Create a client from configuration; fails without an API key
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.llm.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.llm.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
        })
    }

    /// Convert internal Message to the wire format
    fn to_wire_message(msg: &Message) -> Result<WireMessage> {
        let tool_calls = if msg.tool_calls.is_empty() {
            None
        } else {
            let calls = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    Ok(WireToolCall {
                        id: tc.id.clone(),
                        call_type: function_type(),
                        function: WireFunction {
                            name: tc.name.clone(),
                            arguments: serde_json::to_string(&tc.arguments)?,
                        },
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Some(calls)
        };

        Ok(WireMessage {
            role: msg.role,
            content: msg.content.clone(),
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        })
    }

    /// Convert the first choice into ordered segments: text, then tool calls
    fn to_llm_response(response: ChatResponse) -> Result<LlmResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ToolchatError::llm("Response contained no choices"))?;

        let mut segments = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            segments.push(Segment::Text(text));
        }

        for call in choice.message.tool_calls.unwrap_or_default() {
            let arguments: serde_json::Value = if call.function.arguments.trim().is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&call.function.arguments).map_err(|e| {
                    ToolchatError::llm(format!(
                        "Invalid arguments for tool {}: {}",
                        call.function.name, e
                    ))
                })?
            };
            segments.push(Segment::ToolCall(ToolCall::new(
                call.id,
                call.function.name,
                arguments,
            )));
        }

        Ok(LlmResponse {
            segments,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: response.model,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let wire_messages = messages
            .iter()
            .map(Self::to_wire_message)
            .collect::<Result<Vec<_>>>()?;

        let request = ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: wire_messages,
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice: (!tools.is_empty()).then_some("auto"),
        };

        debug!(model = %self.model, messages = messages.len(), tools = tools.len(), "LLM request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ToolchatError::llm(format!("Cannot connect to LLM API at {}", self.base_url))
                } else if e.is_timeout() {
                    ToolchatError::timeout(format!("LLM request to {} timed out", self.base_url))
                } else {
                    ToolchatError::from(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ToolchatError::llm(format!(
                "LLM API error ({}): {}",
                status, error_text
            )));
        }

        let response_text = response.text().await?;
        let chat_response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| ToolchatError::llm(format!("Failed to parse response: {}", e)))?;

        Self::to_llm_response(chat_response)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_segments_keep_text_first() {
        let response: ChatResponse = serde_json::from_value(json!({
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Let me look that up.",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "fetch-weather", "arguments": "{\"city\":\"Paris\"}"}
                    }]
                }
            }]
        }))
        .unwrap();

        let llm = OpenAiClient::to_llm_response(response).unwrap();
        assert_eq!(llm.segments.len(), 2);
        assert_eq!(llm.segments[0], Segment::Text("Let me look that up.".into()));
        assert_eq!(
            llm.segments[1],
            Segment::ToolCall(ToolCall::new("call_1", "fetch-weather", json!({"city": "Paris"})))
        );
        assert!(llm.has_tool_calls());
    }

    #[test]
    fn test_null_content_yields_no_text_segment() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }))
        .unwrap();

        let llm = OpenAiClient::to_llm_response(response).unwrap();
        assert!(llm.segments.is_empty());
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "tool_calls": [{
                "id": "c", "type": "function",
                "function": {"name": "fetch-weather", "arguments": "{not json"}
            }]}}]
        }))
        .unwrap();

        assert!(OpenAiClient::to_llm_response(response).is_err());
    }

    #[test]
    fn test_tool_message_conversion() {
        let wire = OpenAiClient::to_wire_message(&Message::tool_result("call_1", "sunny")).unwrap();
        assert_eq!(wire.role, Role::Tool);
        assert_eq!(wire.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(wire.content.as_deref(), Some("sunny"));
    }
}
