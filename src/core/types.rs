//! Shared types used across Toolchat modules
//!
//! Contains message structures, tool definitions, response segments and the
//! step trace returned to chat clients.

use serde::{Deserialize, Serialize};

/// Role of a message in the conversation history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Output of a tool invocation, keyed by correlation token
    Tool,
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Text content of the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls requested by the assistant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Correlation token of the call a tool message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, Some(content.into()))
    }

    /// Create an assistant message from the segments of one model response
    pub fn assistant(segments: &[Segment]) -> Self {
        let text: Vec<&str> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text(t) => Some(t.as_str()),
                Segment::ToolCall(_) => None,
            })
            .collect();

        let mut message =
            Self::with_role(Role::Assistant, (!text.is_empty()).then(|| text.concat()));
        message.tool_calls = segments
            .iter()
            .filter_map(|s| match s {
                Segment::ToolCall(call) => Some(call.clone()),
                Segment::Text(_) => None,
            })
            .collect();
        message
    }

    /// Create a tool-result message answering `tool_call_id`
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut message = Self::with_role(Role::Tool, Some(content.into()));
        message.tool_call_id = Some(tool_call_id.into());
        message
    }
}

/// A tool invocation request made by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation token matching the eventual result
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// JSON arguments for the tool
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Human-readable announcement carrying name and arguments
    pub fn announcement(&self) -> String {
        format!("[Calling tool {} with args {}]", self.name, self.arguments)
    }
}

/// One content segment of a model response
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Plain assistant text
    Text(String),
    /// A request to invoke a tool
    ToolCall(ToolCall),
}

/// Whether any segment asks for a tool; a round without one is terminal
pub fn has_tool_calls(segments: &[Segment]) -> bool {
    segments.iter().any(|s| matches!(s, Segment::ToolCall(_)))
}

/// Definition of a tool in the shape the LLM expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (always "function" for now)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Name of the described function
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// One observable unit of the trace returned by the agentic loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Step {
    /// Echo of the user query
    User(String),
    /// Assistant text
    Text(String),
    /// Announcement of a tool invocation
    ToolCall(String),
    /// Text returned by a tool, or an `Error: ` string
    ToolResult(String),
    /// Loop-level failure such as an exhausted round budget
    Error(String),
}

impl Step {
    /// Literal value carried by the step
    pub fn value(&self) -> &str {
        match self {
            Step::User(v)
            | Step::Text(v)
            | Step::ToolCall(v)
            | Step::ToolResult(v)
            | Step::Error(v) => v,
        }
    }
}
