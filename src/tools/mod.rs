//! Tools module - everything between the agent loop and the tools themselves
//!
//! The client side bridges the tool host's catalog into LLM function
//! declarations and invokes calls; the host side serves [`HostedTool`]s.

pub mod catalog;
pub mod hosted;
pub mod invoker;
pub mod weather;

pub use catalog::{ToolCatalog, ToolHostHandle};
pub use hosted::{HostedTool, ToolServer};
pub use invoker::ToolInvoker;
pub use weather::WeatherTool;
