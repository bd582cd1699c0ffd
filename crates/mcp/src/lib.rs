//! MCP (Model Context Protocol) integration: connects to downstream tool
//! servers over stdio, HTTP or SSE, keeps a registry of the tools they and
//! the host process expose, and runs the agent-mode tool-calling loop on
//! top of it.

pub mod access;
pub mod agent;
pub mod downstream;
pub mod executor;
pub mod manager;
pub mod registry;

pub use downstream::DownstreamClient;
pub use executor::{Plugin, ToolCall, ToolExecutor};
pub use manager::{Error, Manager, IN_PROCESS_CLIENT_ID};
