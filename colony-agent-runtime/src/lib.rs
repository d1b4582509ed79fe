//! The agent state machine.
//!
//! Eight stateless handlers, one per subject, each a pure function from
//! (event, store, bus) to side effects. Every handler reads the current
//! conversation from the store at entry — never from a copy in the event —
//! so cross-subject delivery order does not matter. KV or bus failures
//! inside a handler emit `agent-error`, which unwinds the agent; malformed
//! events never panic, they are logged and dropped by the subscription
//! layer.

use colony_bus::{emit, subscribe, BusError, EventBus};
use colony_core::subject::queue;
use colony_core::{
    AgentCreateEvent, AgentDeletedEvent, AgentErrorEvent, AgentFinishEvent,
    AgentRuntimeErrorEvent, AgentStartEvent, AgentId, ConversationProcessor, LlmRequestEvent,
    LlmResponseEvent, Message, TaskCreateEvent, TaskErrorEvent, TaskFinishEvent, ToolCallRequest,
    ToolExecRequestEvent, ToolExecResultsEvent,
};
use colony_store::{AgentRecord, AgentStore};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The agent runtime: subscribes under the `agent-runtime` queue group and
/// owns all transitions of agent rows.
pub struct AgentRuntime {
    bus: Arc<dyn EventBus>,
    agents: AgentStore,
    processor: Option<ConversationProcessor>,
}

impl AgentRuntime {
    pub fn new(bus: Arc<dyn EventBus>, agents: AgentStore) -> Self {
        Self {
            bus,
            agents,
            processor: None,
        }
    }

    /// Install a conversation processor, applied after every append. The
    /// processor must preserve tool-call/tool-result pairing.
    pub fn with_processor(mut self, processor: ConversationProcessor) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Install the eight durable subscriptions.
    pub async fn subscribe(self: &Arc<Self>) -> Result<(), BusError> {
        let bus = self.bus.clone();

        macro_rules! handle {
            ($event:ty, $method:ident) => {{
                let this = self.clone();
                subscribe::<$event, _, _>(bus.as_ref(), queue::AGENT_RUNTIME, move |event| {
                    let this = this.clone();
                    async move { this.$method(event).await }
                })
                .await?;
            }};
        }

        handle!(TaskCreateEvent, handle_task_create);
        handle!(AgentCreateEvent, handle_agent_create);
        handle!(AgentStartEvent, handle_agent_start);
        handle!(LlmResponseEvent, handle_llm_response);
        handle!(ToolExecResultsEvent, handle_tool_exec_results);
        handle!(AgentFinishEvent, handle_agent_finish);
        handle!(AgentErrorEvent, handle_agent_error);
        handle!(AgentDeletedEvent, handle_agent_deleted);
        Ok(())
    }

    /// `task-create`: re-emit as `agent-create`, so sub-agent creation can
    /// reuse the same path without going through the launcher.
    pub async fn handle_task_create(&self, event: TaskCreateEvent) {
        info!(agent_id = %event.agent_id, task = %event.task, "task accepted");
        let agent_id = event.agent_id.clone();
        if let Err(err) = emit(self.bus.as_ref(), &AgentCreateEvent::from(event)).await {
            self.fail(&agent_id, err).await;
        }
    }

    /// `agent-create`: write the agent row and start it. The existence check
    /// is the idempotence guard: a redelivered create becomes a no-op.
    pub async fn handle_agent_create(&self, event: AgentCreateEvent) {
        match self.agents.exists(&event.agent_id).await {
            Ok(true) => {
                warn!(agent_id = %event.agent_id, "agent already exists");
                let error = AgentRuntimeErrorEvent::new(
                    event.agent_id.clone(),
                    format!("agent {} already exists", event.agent_id),
                );
                if let Err(err) = emit(self.bus.as_ref(), &error).await {
                    error!(agent_id = %event.agent_id, %err, "failed to emit agent-runtime-error");
                }
                return;
            }
            Ok(false) => {}
            Err(err) => return self.fail(&event.agent_id, err).await,
        }

        let record = AgentRecord {
            agent_id: event.agent_id.clone(),
            task: event.task,
            system_prompt: event.system_prompt,
            tool_schemas: event.tool_schemas,
            messages: event.conversation,
        };
        if let Err(err) = self.agents.save(&record).await {
            return self.fail(&event.agent_id, err).await;
        }
        if let Err(err) = emit(
            self.bus.as_ref(),
            &AgentStartEvent::new(event.agent_id.clone()),
        )
        .await
        {
            self.fail(&event.agent_id, err).await;
        }
    }

    /// `agent-start`: append the task as a user message and request the
    /// first model turn.
    pub async fn handle_agent_start(&self, event: AgentStartEvent) {
        let mut record = match self.agents.get(&event.agent_id).await {
            Ok(record) => record,
            Err(err) => return self.fail(&event.agent_id, err).await,
        };
        record.messages.push(Message::user(record.task.clone()));
        if let Err(err) = self.agents.save(&record).await {
            return self.fail(&event.agent_id, err).await;
        }
        let request = LlmRequestEvent::new(
            event.agent_id.clone(),
            record.prompt(),
            record.tool_schemas.clone(),
        );
        if let Err(err) = emit(self.bus.as_ref(), &request).await {
            self.fail(&event.agent_id, err).await;
        }
    }

    /// `llm-response`: append the response to the stored conversation, then
    /// either fan the tool calls out for execution or finish the agent with
    /// the last assistant text.
    pub async fn handle_llm_response(&self, event: LlmResponseEvent) {
        let mut record = match self.agents.get(&event.agent_id).await {
            Ok(record) => record,
            Err(err) => return self.fail(&event.agent_id, err).await,
        };
        record.messages.extend(event.response.iter().cloned());
        record.messages = self.process(record.messages);
        if let Err(err) = self.agents.save(&record).await {
            return self.fail(&event.agent_id, err).await;
        }

        let tool_calls: Vec<ToolCallRequest> = event
            .response
            .iter()
            .filter_map(|message| match message {
                Message::ToolCall {
                    tool_call_id,
                    tool_name,
                    arguments,
                } => Some(ToolCallRequest {
                    tool_call_id: tool_call_id.clone(),
                    tool_name: tool_name.clone(),
                    arguments: arguments.clone(),
                }),
                _ => None,
            })
            .collect();

        if !tool_calls.is_empty() {
            debug!(agent_id = %event.agent_id, count = tool_calls.len(), "dispatching tool calls");
            let request = ToolExecRequestEvent::new(event.agent_id.clone(), tool_calls);
            if let Err(err) = emit(self.bus.as_ref(), &request).await {
                self.fail(&event.agent_id, err).await;
            }
            return;
        }

        let result = event
            .response
            .iter()
            .rev()
            .find_map(|message| match message {
                Message::Assistant { content } => Some(content.clone()),
                _ => None,
            })
            .unwrap_or_default();
        let finish = AgentFinishEvent::new(event.agent_id.clone(), result);
        if let Err(err) = emit(self.bus.as_ref(), &finish).await {
            self.fail(&event.agent_id, err).await;
        }
    }

    /// `tool-exec-results`: append the results in request order and ask for
    /// the next model turn. A result whose tool-call id already has a stored
    /// tool-result is a redelivery: its append is skipped, but the follow-up
    /// `llm-request` is still emitted so the machine advances.
    pub async fn handle_tool_exec_results(&self, event: ToolExecResultsEvent) {
        let mut record = match self.agents.get(&event.agent_id).await {
            Ok(record) => record,
            Err(err) => return self.fail(&event.agent_id, err).await,
        };

        let stored: HashSet<String> = record
            .messages
            .iter()
            .filter(|message| message.is_tool_result())
            .filter_map(|message| message.tool_call_id().map(str::to_string))
            .collect();
        for result in &event.results {
            if stored.contains(&result.tool_call_id) {
                debug!(
                    agent_id = %event.agent_id,
                    tool_call_id = %result.tool_call_id,
                    "skipping already-recorded tool result"
                );
                continue;
            }
            record.messages.push(Message::tool_result(
                result.tool_call_id.clone(),
                result.tool_name.clone(),
                result.result.clone(),
            ));
        }
        record.messages = self.process(record.messages);
        if let Err(err) = self.agents.save(&record).await {
            return self.fail(&event.agent_id, err).await;
        }

        let request = LlmRequestEvent::new(
            event.agent_id.clone(),
            record.prompt(),
            record.tool_schemas.clone(),
        );
        if let Err(err) = emit(self.bus.as_ref(), &request).await {
            self.fail(&event.agent_id, err).await;
        }
    }

    /// `agent-finish`: primaries re-emit as `task-finish`; every agent is
    /// then scheduled for deletion.
    pub async fn handle_agent_finish(&self, event: AgentFinishEvent) {
        info!(agent_id = %event.agent_id, "agent finished");
        if event.agent_id.is_primary() {
            let finish = TaskFinishEvent::new(event.agent_id.clone(), event.result.clone());
            if let Err(err) = emit(self.bus.as_ref(), &finish).await {
                error!(agent_id = %event.agent_id, %err, "failed to emit task-finish");
            }
        }
        self.delete_agent(&event.agent_id).await;
    }

    /// `agent-error`: symmetric to finish, with `task-error` for primaries.
    pub async fn handle_agent_error(&self, event: AgentErrorEvent) {
        warn!(agent_id = %event.agent_id, error = %event.error, "agent errored");
        if event.agent_id.is_primary() {
            let error = TaskErrorEvent::new(event.agent_id.clone(), event.error.clone());
            if let Err(err) = emit(self.bus.as_ref(), &error).await {
                error!(agent_id = %event.agent_id, %err, "failed to emit task-error");
            }
        }
        self.delete_agent(&event.agent_id).await;
    }

    /// `agent-deleted`: drop the row. Safe to repeat; failures here only
    /// log, since emitting `agent-error` from the cleanup path would loop.
    pub async fn handle_agent_deleted(&self, event: AgentDeletedEvent) {
        if let Err(err) = self.agents.delete(&event.agent_id).await {
            error!(agent_id = %event.agent_id, %err, "failed to delete agent row");
        }
    }

    fn process(&self, messages: Vec<Message>) -> Vec<Message> {
        match &self.processor {
            Some(processor) => processor(messages),
            None => messages,
        }
    }

    async fn delete_agent(&self, agent_id: &AgentId) {
        let deleted = AgentDeletedEvent::new(agent_id.clone());
        if let Err(err) = emit(self.bus.as_ref(), &deleted).await {
            error!(agent_id = %agent_id, %err, "failed to emit agent-deleted");
        }
    }

    /// Convert a handler failure into the `agent-error` unwind path.
    async fn fail(&self, agent_id: &AgentId, cause: impl fmt::Display) {
        error!(agent_id = %agent_id, error = %cause, "agent handler failed");
        let event = AgentErrorEvent::new(agent_id.clone(), cause.to_string());
        if let Err(err) = emit(self.bus.as_ref(), &event).await {
            error!(agent_id = %agent_id, %err, "failed to emit agent-error");
        }
    }
}
