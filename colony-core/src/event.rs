//! Wire events.
//!
//! Every event is a self-describing JSON body published on the subject its
//! kind maps to, and every event carries the id of the agent it concerns.
//! Response and error events from the LLM runtime embed the originating
//! request so the retry count travels in-band (a redelivered retry does not
//! grow the count).

use crate::ids::AgentId;
use crate::message::Message;
use crate::schema::ToolSchema;
use crate::subject;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// A typed wire event: a subject plus the agent it concerns.
pub trait Event: Serialize + DeserializeOwned + Send + Sync + 'static {
    const SUBJECT: &'static str;

    fn agent_id(&self) -> &AgentId;
}

macro_rules! impl_event {
    ($ty:ty, $subject:expr) => {
        impl Event for $ty {
            const SUBJECT: &'static str = $subject;

            fn agent_id(&self) -> &AgentId {
                &self.agent_id
            }
        }
    };
}

/// Published by the launcher when a user task is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreateEvent {
    pub agent_id: AgentId,
    pub task: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub tool_schemas: Vec<ToolSchema>,
    #[serde(default)]
    pub conversation: Vec<Message>,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl TaskCreateEvent {
    pub fn new(
        agent_id: AgentId,
        task: impl Into<String>,
        system_prompt: impl Into<String>,
        tool_schemas: Vec<ToolSchema>,
        conversation: Vec<Message>,
    ) -> Self {
        Self {
            agent_id,
            task: task.into(),
            system_prompt: system_prompt.into(),
            tool_schemas,
            conversation,
            timestamp: now(),
        }
    }
}

/// Terminal success for a task; consumed by the launcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFinishEvent {
    pub agent_id: AgentId,
    pub result: String,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl TaskFinishEvent {
    pub fn new(agent_id: AgentId, result: impl Into<String>) -> Self {
        Self {
            agent_id,
            result: result.into(),
            timestamp: now(),
        }
    }
}

/// Terminal failure for a task; consumed by the launcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskErrorEvent {
    pub agent_id: AgentId,
    pub error: String,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl TaskErrorEvent {
    pub fn new(agent_id: AgentId, error: impl Into<String>) -> Self {
        Self {
            agent_id,
            error: error.into(),
            timestamp: now(),
        }
    }
}

/// Create an agent row. Both primaries (relayed from `task-create`) and
/// sub-agents (emitted by the `create_agent` tool) arrive here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCreateEvent {
    pub agent_id: AgentId,
    pub task: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub tool_schemas: Vec<ToolSchema>,
    #[serde(default)]
    pub conversation: Vec<Message>,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl AgentCreateEvent {
    pub fn new(
        agent_id: AgentId,
        task: impl Into<String>,
        system_prompt: impl Into<String>,
        tool_schemas: Vec<ToolSchema>,
        conversation: Vec<Message>,
    ) -> Self {
        Self {
            agent_id,
            task: task.into(),
            system_prompt: system_prompt.into(),
            tool_schemas,
            conversation,
            timestamp: now(),
        }
    }
}

impl From<TaskCreateEvent> for AgentCreateEvent {
    fn from(event: TaskCreateEvent) -> Self {
        Self {
            agent_id: event.agent_id,
            task: event.task,
            system_prompt: event.system_prompt,
            tool_schemas: event.tool_schemas,
            conversation: event.conversation,
            timestamp: now(),
        }
    }
}

/// Begin executing a created agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStartEvent {
    pub agent_id: AgentId,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl AgentStartEvent {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            timestamp: now(),
        }
    }
}

/// An agent produced its final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFinishEvent {
    pub agent_id: AgentId,
    pub result: String,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl AgentFinishEvent {
    pub fn new(agent_id: AgentId, result: impl Into<String>) -> Self {
        Self {
            agent_id,
            result: result.into(),
            timestamp: now(),
        }
    }
}

/// An agent hit a fatal error and is unwinding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentErrorEvent {
    pub agent_id: AgentId,
    pub error: String,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl AgentErrorEvent {
    pub fn new(agent_id: AgentId, error: impl Into<String>) -> Self {
        Self {
            agent_id,
            error: error.into(),
            timestamp: now(),
        }
    }
}

/// The agent runtime rejected an operation (e.g. duplicate create).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRuntimeErrorEvent {
    pub agent_id: AgentId,
    pub error: String,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl AgentRuntimeErrorEvent {
    pub fn new(agent_id: AgentId, error: impl Into<String>) -> Self {
        Self {
            agent_id,
            error: error.into(),
            timestamp: now(),
        }
    }
}

/// Cleanup: the agent row should be removed from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDeletedEvent {
    pub agent_id: AgentId,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl AgentDeletedEvent {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            timestamp: now(),
        }
    }
}

/// Ask the LLM runtime for the next model turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequestEvent {
    pub agent_id: AgentId,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tool_schemas: Vec<ToolSchema>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl LlmRequestEvent {
    pub fn new(agent_id: AgentId, messages: Vec<Message>, tool_schemas: Vec<ToolSchema>) -> Self {
        Self {
            agent_id,
            messages,
            tool_schemas,
            retry_count: 0,
            timestamp: now(),
        }
    }

    /// The same request with the retry budget consumed by one.
    pub fn retry(&self) -> Self {
        Self {
            agent_id: self.agent_id.clone(),
            messages: self.messages.clone(),
            tool_schemas: self.tool_schemas.clone(),
            retry_count: self.retry_count + 1,
            timestamp: now(),
        }
    }
}

/// New messages produced by the model for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponseEvent {
    pub agent_id: AgentId,
    pub response: Vec<Message>,
    /// The originating request, so downstream logic can see the retry count.
    pub request: LlmRequestEvent,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl LlmResponseEvent {
    pub fn new(request: LlmRequestEvent, response: Vec<Message>) -> Self {
        Self {
            agent_id: request.agent_id.clone(),
            response,
            request,
            timestamp: now(),
        }
    }
}

/// A provider call failed; the LLM runtime's retry loop consumes this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRuntimeErrorEvent {
    pub agent_id: AgentId,
    pub error: String,
    pub request: LlmRequestEvent,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl LlmRuntimeErrorEvent {
    pub fn new(request: LlmRequestEvent, error: impl Into<String>) -> Self {
        Self {
            agent_id: request.agent_id.clone(),
            error: error.into(),
            request,
            timestamp: now(),
        }
    }
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// The outcome of one tool invocation, aligned with its request by index
/// and by `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: String,
}

/// Execute every tool call of one assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecRequestEvent {
    pub agent_id: AgentId,
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl ToolExecRequestEvent {
    pub fn new(agent_id: AgentId, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            agent_id,
            tool_calls,
            timestamp: now(),
        }
    }
}

/// Ordered results for one `tool-exec-request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecResultsEvent {
    pub agent_id: AgentId,
    pub results: Vec<ToolCallResult>,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl ToolExecResultsEvent {
    pub fn new(agent_id: AgentId, results: Vec<ToolCallResult>) -> Self {
        Self {
            agent_id,
            results,
            timestamp: now(),
        }
    }
}

/// Informational: a single tool invocation is starting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecStartEvent {
    pub agent_id: AgentId,
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

/// Informational: a single tool invocation completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecFinishEvent {
    pub agent_id: AgentId,
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: String,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

/// Informational: a single tool invocation failed (lookup or execution).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecErrorEvent {
    pub agent_id: AgentId,
    pub tool_call_id: String,
    pub tool_name: String,
    pub error: String,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

/// The tool runtime itself failed to make progress on a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRuntimeErrorEvent {
    pub agent_id: AgentId,
    pub error: String,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl ToolRuntimeErrorEvent {
    pub fn new(agent_id: AgentId, error: impl Into<String>) -> Self {
        Self {
            agent_id,
            error: error.into(),
            timestamp: now(),
        }
    }
}

/// Informational: a provider started producing a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageStreamStartEvent {
    pub agent_id: AgentId,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl MessageStreamStartEvent {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            timestamp: now(),
        }
    }
}

/// Informational: a provider finished producing a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageStreamDoneEvent {
    pub agent_id: AgentId,
    #[serde(default)]
    pub content: String,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl MessageStreamDoneEvent {
    pub fn new(agent_id: AgentId, content: impl Into<String>) -> Self {
        Self {
            agent_id,
            content: content.into(),
            timestamp: now(),
        }
    }
}

/// Informational: a provider aborted mid-response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageStreamErrorEvent {
    pub agent_id: AgentId,
    pub error: String,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl MessageStreamErrorEvent {
    pub fn new(agent_id: AgentId, error: impl Into<String>) -> Self {
        Self {
            agent_id,
            error: error.into(),
            timestamp: now(),
        }
    }
}

impl_event!(TaskCreateEvent, subject::TASK_CREATE);
impl_event!(TaskFinishEvent, subject::TASK_FINISH);
impl_event!(TaskErrorEvent, subject::TASK_ERROR);
impl_event!(AgentCreateEvent, subject::AGENT_CREATE);
impl_event!(AgentStartEvent, subject::AGENT_START);
impl_event!(AgentFinishEvent, subject::AGENT_FINISH);
impl_event!(AgentErrorEvent, subject::AGENT_ERROR);
impl_event!(AgentRuntimeErrorEvent, subject::AGENT_RUNTIME_ERROR);
impl_event!(AgentDeletedEvent, subject::AGENT_DELETED);
impl_event!(LlmRequestEvent, subject::LLM_REQUEST);
impl_event!(LlmResponseEvent, subject::LLM_RESPONSE);
impl_event!(LlmRuntimeErrorEvent, subject::LLM_RUNTIME_ERROR);
impl_event!(ToolExecRequestEvent, subject::TOOL_EXEC_REQUEST);
impl_event!(ToolExecResultsEvent, subject::TOOL_EXEC_RESULTS);
impl_event!(ToolExecStartEvent, subject::TOOL_EXEC_START);
impl_event!(ToolExecFinishEvent, subject::TOOL_EXEC_FINISH);
impl_event!(ToolExecErrorEvent, subject::TOOL_EXEC_ERROR);
impl_event!(ToolRuntimeErrorEvent, subject::TOOL_RUNTIME_ERROR);
impl_event!(MessageStreamStartEvent, subject::MESSAGE_STREAM_START);
impl_event!(MessageStreamDoneEvent, subject::MESSAGE_STREAM_DONE);
impl_event!(MessageStreamErrorEvent, subject::MESSAGE_STREAM_ERROR);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_preserves_request_and_bumps_count() {
        let request = LlmRequestEvent::new(AgentId::primary(), vec![Message::user("hi")], vec![]);
        let retried = request.retry();
        assert_eq!(retried.retry_count, 1);
        assert_eq!(retried.messages, request.messages);
        assert_eq!(retried.agent_id, request.agent_id);
        assert_eq!(retried.retry().retry_count, 2);
    }

    #[test]
    fn task_create_relays_into_agent_create() {
        let event = TaskCreateEvent::new(
            AgentId::primary(),
            "say hi",
            "",
            vec![ToolSchema::new("calculator", "math")],
            vec![],
        );
        let relayed = AgentCreateEvent::from(event.clone());
        assert_eq!(relayed.agent_id, event.agent_id);
        assert_eq!(relayed.task, event.task);
        assert_eq!(relayed.tool_schemas, event.tool_schemas);
    }

    #[test]
    fn events_tolerate_missing_optional_fields() {
        let id = AgentId::primary();
        let raw = format!(r#"{{"agent_id":"{id}","task":"t"}}"#);
        let event: AgentCreateEvent = serde_json::from_str(&raw).unwrap();
        assert!(event.system_prompt.is_empty());
        assert!(event.tool_schemas.is_empty());
        assert!(event.conversation.is_empty());
    }

    #[test]
    fn response_embeds_originating_request() {
        let request = LlmRequestEvent::new(AgentId::primary(), vec![Message::user("2+2")], vec![]);
        let response = LlmResponseEvent::new(request.clone(), vec![Message::assistant("4")]);
        assert_eq!(response.agent_id, request.agent_id);
        assert_eq!(response.request.retry_count, 0);

        let json = serde_json::to_string(&response).unwrap();
        let back: LlmResponseEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response);
    }
}
