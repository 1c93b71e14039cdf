//! Agent module - the tool-calling loop and its per-run state
//!
//! Contains the logic that alternates LLM calls with tool invocations and
//! records every step for the caller.

pub mod conversation;
pub mod loop_state;
pub mod orchestrator;

pub use conversation::Conversation;
pub use loop_state::AgentLoopState;
pub use orchestrator::Agent;
