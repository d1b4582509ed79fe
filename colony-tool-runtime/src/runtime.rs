//! Execution handler.
//!
//! Runs every call of a `tool-exec-request` in order and publishes one
//! `tool-exec-results` whose result order matches the request order, so
//! tool-call-id alignment is preserved downstream.

use crate::create_agent::SubAgentWaiters;
use crate::{ToolContext, ToolRegistry};
use chrono::Utc;
use colony_bus::{emit, subscribe, BusError, EventBus};
use colony_core::subject::queue;
use colony_core::{
    AgentFinishEvent, AgentId, ToolCallRequest, ToolCallResult, ToolExecErrorEvent,
    ToolExecFinishEvent, ToolExecRequestEvent, ToolExecResultsEvent, ToolExecStartEvent,
    ToolRuntimeErrorEvent,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The tool runtime: registry, waiter table, and the exec subscription.
pub struct ToolRuntime {
    bus: Arc<dyn EventBus>,
    registry: Arc<ToolRegistry>,
    waiters: Arc<SubAgentWaiters>,
    cancel: CancellationToken,
}

impl ToolRuntime {
    pub fn new(bus: Arc<dyn EventBus>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            bus,
            registry,
            waiters: Arc::new(SubAgentWaiters::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        self.registry.clone()
    }

    pub fn waiters(&self) -> Arc<SubAgentWaiters> {
        self.waiters.clone()
    }

    /// Cancel in-flight tool invocations (pending sub-agent waits resolve to
    /// "cancelled").
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Install the exec-request subscription and the `agent-finish` feed
    /// that satisfies this process's sub-agent waiters.
    pub async fn subscribe(self: &Arc<Self>) -> Result<(), BusError> {
        let this = self.clone();
        subscribe::<ToolExecRequestEvent, _, _>(
            self.bus.as_ref(),
            queue::TOOL_RUNTIME,
            move |event| {
                let this = this.clone();
                async move { this.handle_exec_request(event).await }
            },
        )
        .await?;

        let waiters = self.waiters.clone();
        subscribe::<AgentFinishEvent, _, _>(self.bus.as_ref(), queue::TOOL_RUNTIME, move |event| {
            let waiters = waiters.clone();
            async move {
                if waiters.notify(&event.agent_id, event.result) {
                    debug!(agent_id = %event.agent_id, "sub-agent waiter satisfied");
                }
            }
        })
        .await
    }

    /// `tool-exec-request`: execute each call in order, accumulate results,
    /// publish them as one event.
    pub async fn handle_exec_request(&self, event: ToolExecRequestEvent) {
        info!(agent_id = %event.agent_id, count = event.tool_calls.len(), "executing tools");

        let mut results = Vec::with_capacity(event.tool_calls.len());
        for call in &event.tool_calls {
            let start = ToolExecStartEvent {
                agent_id: event.agent_id.clone(),
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
                arguments: call.arguments.clone(),
                timestamp: Utc::now(),
            };
            if let Err(err) = emit(self.bus.as_ref(), &start).await {
                warn!(agent_id = %event.agent_id, %err, "failed to emit tool-exec-start");
            }

            let result = self.execute(&event.agent_id, call).await;

            let finish = ToolExecFinishEvent {
                agent_id: event.agent_id.clone(),
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
                result: result.clone(),
                timestamp: Utc::now(),
            };
            if let Err(err) = emit(self.bus.as_ref(), &finish).await {
                warn!(agent_id = %event.agent_id, %err, "failed to emit tool-exec-finish");
            }

            results.push(ToolCallResult {
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
                result,
            });
        }

        let results = ToolExecResultsEvent::new(event.agent_id.clone(), results);
        if let Err(err) = emit(self.bus.as_ref(), &results).await {
            error!(agent_id = %event.agent_id, %err, "failed to emit tool-exec-results");
            let runtime_error =
                ToolRuntimeErrorEvent::new(event.agent_id.clone(), err.to_string());
            if let Err(err) = emit(self.bus.as_ref(), &runtime_error).await {
                error!(agent_id = %event.agent_id, %err, "failed to emit tool-runtime-error");
            }
        }
    }

    async fn execute(&self, agent_id: &AgentId, call: &ToolCallRequest) -> String {
        debug!(agent_id = %agent_id, tool = %call.tool_name, "executing tool");

        let Some(tool) = self.registry.get(&call.tool_name) else {
            self.emit_exec_error(agent_id, call, format!("Tool not found: {}", call.tool_name))
                .await;
            return format!("Error: Tool not found: {}", call.tool_name);
        };

        let ctx = ToolContext {
            agent_id: agent_id.clone(),
            cancel: self.cancel.child_token(),
        };
        match (tool.function)(ctx, call.arguments.clone()).await {
            Ok(result) => result,
            Err(err) => {
                self.emit_exec_error(agent_id, call, format!("Tool execution failed: {err}"))
                    .await;
                format!("Error: Tool execution failed: {err}")
            }
        }
    }

    async fn emit_exec_error(&self, agent_id: &AgentId, call: &ToolCallRequest, error: String) {
        let event = ToolExecErrorEvent {
            agent_id: agent_id.clone(),
            tool_call_id: call.tool_call_id.clone(),
            tool_name: call.tool_name.clone(),
            error,
            timestamp: Utc::now(),
        };
        if let Err(err) = emit(self.bus.as_ref(), &event).await {
            warn!(agent_id = %agent_id, %err, "failed to emit tool-exec-error");
        }
    }
}
