//! The tool runtime.
//!
//! Holds an in-memory registry of callable tools, executes every call of a
//! `tool-exec-request` in order, and hosts the `create_agent` tool — the
//! recursion primitive that lets an agent delegate a sub-task to a fresh
//! sub-agent and block (bounded) on its result.

mod builtin;
mod create_agent;
mod error;
mod http;
mod registry;
mod runtime;

pub use builtin::register_builtins;
pub use create_agent::{
    create_agent_tool, create_agent_tool_with_timeout, SubAgentWaiters, SUB_AGENT_TIMEOUT,
};
pub use error::ToolError;
pub use http::{router, SchemasRequest, SchemasResponse};
pub use registry::{Tool, ToolContext, ToolFn, ToolRegistry};
pub use runtime::ToolRuntime;
