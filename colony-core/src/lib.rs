//! Core types for the colony orchestration engine.
//!
//! These types form the representation boundary shared by every service:
//! agent identifiers, the conversation message sum type, tool schemas, and
//! the wire events exchanged over the broker.

pub mod event;
pub mod ids;
pub mod message;
pub mod processor;
pub mod schema;
pub mod subject;

pub use event::{
    AgentCreateEvent, AgentDeletedEvent, AgentErrorEvent, AgentFinishEvent,
    AgentRuntimeErrorEvent, AgentStartEvent, Event, LlmRequestEvent, LlmResponseEvent,
    LlmRuntimeErrorEvent, MessageStreamDoneEvent, MessageStreamErrorEvent,
    MessageStreamStartEvent, TaskCreateEvent, TaskErrorEvent, TaskFinishEvent, ToolCallRequest,
    ToolCallResult, ToolExecErrorEvent, ToolExecFinishEvent, ToolExecRequestEvent,
    ToolExecResultsEvent, ToolExecStartEvent, ToolRuntimeErrorEvent,
};
pub use ids::{AgentId, AgentIdError};
pub use message::Message;
pub use processor::{conversation_is_well_formed, ConversationProcessor};
pub use schema::{ToolParam, ToolSchema};
