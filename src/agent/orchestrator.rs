//! Agent orchestrator - the tool-calling loop
//!
//! Sends the query and the tool catalog to the LLM, runs every tool call the
//! model asks for, feeds the results back and repeats until a round comes
//! back without tool calls. Text that arrives alongside tool calls is
//! recorded but does not end the loop.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::agent::conversation::Conversation;
use crate::agent::loop_state::AgentLoopState;
use crate::core::config::AgentConfig;
use crate::core::{Config, Message, Result, Segment, Step, ToolchatError};
use crate::llm::LlmProvider;
use crate::tools::{ToolHostHandle, ToolInvoker};

/// Runs queries through the LLM with the tool host's tools
pub struct Agent {
    llm: Arc<dyn LlmProvider>,
    invoker: ToolInvoker,
    config: AgentConfig,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmProvider>, invoker: ToolInvoker, config: AgentConfig) -> Self {
        Self { llm, invoker, config }
    }

    pub fn from_config(llm: Arc<dyn LlmProvider>, config: &Config) -> Self {
        Self::new(
            llm,
            ToolInvoker::new(config.tool_host.tool_timeout()),
            config.agent.clone(),
        )
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Answer `query`, returning the ordered step trace
    ///
    /// Tool failures never end the run; they reach the model as `Error: `
    /// results. LLM failures do, and are returned as errors. Running out of
    /// rounds appends an error step instead of failing.
    pub async fn run(&self, query: &str, tools: &ToolHostHandle) -> Result<Vec<Step>> {
        if query.trim().is_empty() {
            return Err(ToolchatError::invalid_input("Query is required"));
        }

        let mut conversation = Conversation::new(self.config.system_prompt.as_deref());
        conversation.add_user(query);

        let mut state = AgentLoopState::new(self.config.max_rounds);
        state.record(Step::User(query.to_string()));

        info!(
            provider = self.llm.name(),
            tools = tools.tools().len(),
            max_rounds = state.max_rounds,
            "Starting agent loop"
        );

        while state.should_continue() {
            state.next_round();
            debug!(round = state.round, messages = conversation.messages().len(), "Calling LLM");

            let response = self.llm.complete(conversation.messages(), tools.tools()).await?;
            conversation.push(Message::assistant(&response.segments));

            if !response.has_tool_calls() {
                for segment in &response.segments {
                    if let Segment::Text(text) = segment {
                        state.record(Step::Text(text.clone()));
                    }
                }
                state.finish();
                break;
            }

            // Results are computed up front when dispatching concurrently;
            // either way they are recorded in declaration order.
            let mut prefetched: VecDeque<String> = if self.config.parallel_tools {
                join_all(
                    response
                        .tool_calls()
                        .map(|call| self.invoker.invoke(tools.host(), call)),
                )
                .await
                .into()
            } else {
                VecDeque::new()
            };

            for segment in &response.segments {
                match segment {
                    Segment::Text(text) => state.record(Step::Text(text.clone())),
                    Segment::ToolCall(call) => {
                        state.record(Step::ToolCall(call.announcement()));
                        let result = match prefetched.pop_front() {
                            Some(result) => result,
                            None => self.invoker.invoke(tools.host(), call).await,
                        };
                        conversation.push(Message::tool_result(&call.id, result.clone()));
                        state.record(Step::ToolResult(result));
                    }
                }
            }
        }

        if state.exhausted() {
            warn!(rounds = state.round, "Round budget exhausted");
            state.record(Step::Error(format!(
                "Stopped after {} rounds without a final answer",
                state.round
            )));
        }

        info!(rounds = state.round, steps = state.steps.len(), "Agent loop complete");
        Ok(state.into_steps())
    }
}
