//! The `create_agent` tool.
//!
//! Spawning is pure event choreography: the tool emits `agent-create` for a
//! sub-agent id derived from the caller's, then blocks on a process-local
//! one-shot rendezvous keyed by that id. The rendezvous is fed by this
//! process's `agent-finish` subscription, so only the instance that started
//! the wait can satisfy it; the 5-minute timeout bounds the blocked slot if
//! the finish lands elsewhere.

use crate::{Tool, ToolError, ToolFn, ToolRegistry};
use colony_bus::{emit, EventBus};
use colony_core::{AgentCreateEvent, AgentId, ToolParam, ToolSchema};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::info;

/// How long a parent blocks on a sub-agent before giving up.
pub const SUB_AGENT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Process-local table of pending sub-agent rendezvous, keyed by sub-agent
/// id. Single-send, single-receive; an entry is removed on every exit path.
#[derive(Default)]
pub struct SubAgentWaiters {
    slots: Mutex<HashMap<AgentId, oneshot::Sender<String>>>,
}

impl SubAgentWaiters {
    /// Open a rendezvous for `agent_id` and return its receiving end.
    pub fn register(&self, agent_id: AgentId) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        self.slots.lock().expect("slots lock").insert(agent_id, tx);
        rx
    }

    pub fn remove(&self, agent_id: &AgentId) {
        self.slots.lock().expect("slots lock").remove(agent_id);
    }

    /// Deliver a result to the waiter for `agent_id`, if one is pending.
    /// The send never blocks; a receiver that already gave up is ignored.
    pub fn notify(&self, agent_id: &AgentId, result: String) -> bool {
        match self.slots.lock().expect("slots lock").remove(agent_id) {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.slots.lock().expect("slots lock").len()
    }
}

/// Build the `create_agent` tool with the default timeout.
pub fn create_agent_tool(
    bus: Arc<dyn EventBus>,
    registry: Arc<ToolRegistry>,
    waiters: Arc<SubAgentWaiters>,
) -> Tool {
    create_agent_tool_with_timeout(bus, registry, waiters, SUB_AGENT_TIMEOUT)
}

/// Build the `create_agent` tool with an explicit wait bound.
pub fn create_agent_tool_with_timeout(
    bus: Arc<dyn EventBus>,
    registry: Arc<ToolRegistry>,
    waiters: Arc<SubAgentWaiters>,
    timeout: Duration,
) -> Tool {
    let schema = ToolSchema::new("create_agent", "Create a sub-agent to handle a specific task")
        .with_param(ToolParam::string(
            "task",
            "The task for the sub-agent to accomplish",
            true,
        ))
        .with_param(ToolParam::string_array(
            "tools",
            "List of tool names that the sub-agent can use",
            true,
        ));

    let function: ToolFn = Arc::new(move |ctx, args| {
        let bus = bus.clone();
        let registry = registry.clone();
        let waiters = waiters.clone();
        Box::pin(async move {
            let task = args
                .get("task")
                .and_then(Value::as_str)
                .filter(|task| !task.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ToolError::invalid_arguments("task is required"))?;

            let values = args
                .get("tools")
                .and_then(Value::as_array)
                .ok_or_else(|| ToolError::invalid_arguments("tools must be an array of strings"))?;
            let names: Vec<String> = values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            if names.len() != values.len() {
                return Err(ToolError::invalid_arguments("tools must be an array of strings"));
            }
            if names.is_empty() {
                return Err(ToolError::invalid_arguments("tools list cannot be empty"));
            }
            for name in &names {
                if !registry.contains(name) {
                    return Err(ToolError::invalid_arguments(format!(
                        "tool '{name}' is not available"
                    )));
                }
            }

            let sub_id = ctx.agent_id.sub_agent();
            info!(parent = %ctx.agent_id, sub_agent = %sub_id, task = %task, "creating sub-agent");

            let receiver = waiters.register(sub_id.clone());
            let event = AgentCreateEvent::new(
                sub_id.clone(),
                task.clone(),
                format!("You are a sub-agent with the following task: {task}"),
                registry.schemas(Some(&names)),
                Vec::new(),
            );
            if let Err(err) = emit(bus.as_ref(), &event).await {
                waiters.remove(&sub_id);
                return Err(ToolError::execution(format!(
                    "failed to create sub-agent: {err}"
                )));
            }

            tokio::select! {
                outcome = receiver => match outcome {
                    Ok(result) => Ok(result),
                    // The sender side was dropped: the table was cleared
                    // under us, treat it as cancellation.
                    Err(_) => Ok("cancelled".to_string()),
                },
                _ = ctx.cancel.cancelled() => {
                    waiters.remove(&sub_id);
                    Ok("cancelled".to_string())
                }
                _ = tokio::time::sleep(timeout) => {
                    waiters.remove(&sub_id);
                    Ok("timeout".to_string())
                }
            }
        })
    });

    Tool { schema, function }
}
