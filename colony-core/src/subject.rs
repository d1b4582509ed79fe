//! Broker subject names, one per event kind.
//!
//! The bus treats each subject as an independent durable stream. The
//! `*-stream-*` subjects are informational: providers emit them while
//! producing a response, nothing in the core consumes them.

pub const TASK_CREATE: &str = "task-create";
pub const TASK_FINISH: &str = "task-finish";
pub const TASK_ERROR: &str = "task-error";

pub const AGENT_CREATE: &str = "agent-create";
pub const AGENT_START: &str = "agent-start";
pub const AGENT_FINISH: &str = "agent-finish";
pub const AGENT_ERROR: &str = "agent-error";
pub const AGENT_RUNTIME_ERROR: &str = "agent-runtime-error";
pub const AGENT_DELETED: &str = "agent-deleted";

pub const LLM_REQUEST: &str = "llm-request";
pub const LLM_RESPONSE: &str = "llm-response";
/// Legacy alias kept on the wire; the retry loop runs on
/// [`LLM_RUNTIME_ERROR`].
pub const LLM_ERROR: &str = "llm-error";
pub const LLM_RUNTIME_ERROR: &str = "llm-runtime-error";

pub const TOOL_EXEC_REQUEST: &str = "tool-exec-request";
pub const TOOL_EXEC_RESULTS: &str = "tool-exec-results";
pub const TOOL_EXEC_START: &str = "tool-exec-start";
pub const TOOL_EXEC_FINISH: &str = "tool-exec-finish";
pub const TOOL_EXEC_ERROR: &str = "tool-exec-error";
pub const TOOL_RUNTIME_ERROR: &str = "tool-runtime-error";

pub const MESSAGE_STREAM_START: &str = "message-stream-start";
pub const MESSAGE_STREAM_DELTA: &str = "message-stream-delta";
pub const MESSAGE_STREAM_DONE: &str = "message-stream-done";
pub const MESSAGE_STREAM_ERROR: &str = "message-stream-error";

pub const TOOLCALL_STREAM_NAME: &str = "toolcall-stream-name";
pub const TOOLCALL_STREAM_ARGS_START: &str = "toolcall-stream-args-start";
pub const TOOLCALL_STREAM_ARGS_DELTA: &str = "toolcall-stream-args-delta";
pub const TOOLCALL_STREAM_ARGS_DONE: &str = "toolcall-stream-args-done";

/// Queue group names, one per service.
pub mod queue {
    pub const LAUNCHER: &str = "agent-launcher";
    pub const AGENT_RUNTIME: &str = "agent-runtime";
    pub const LLM_RUNTIME: &str = "llm-runtime";
    pub const TOOL_RUNTIME: &str = "tool-runtime";
    pub const MESSAGE_RUNTIME: &str = "message-runtime";
}
