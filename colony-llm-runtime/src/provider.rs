//! The provider seam.
//!
//! A provider is a pure function from message history and tool schemas to a
//! new message sequence. It receives the bus so adapters can publish the
//! informational streaming events while producing a response.

use crate::LlmError;
use async_trait::async_trait;
use colony_bus::EventBus;
use colony_core::{AgentId, Message, ToolSchema};
use std::collections::VecDeque;
use std::sync::Mutex;

/// An LLM backend. Alternative providers (API adapters, test doubles) are
/// substitutable behind this trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        agent_id: &AgentId,
        bus: &dyn EventBus,
    ) -> Result<Vec<Message>, LlmError>;

    fn name(&self) -> &'static str;
}

/// Scripted provider for tests: returns each queued outcome in order, then
/// fails.
#[derive(Default)]
pub struct ScriptedProvider {
    outcomes: Mutex<VecDeque<Result<Vec<Message>, String>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, messages: Vec<Message>) -> Self {
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .push_back(Ok(messages));
        self
    }

    pub fn fail(self, error: impl Into<String>) -> Self {
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .push_back(Err(error.into()));
        self
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        _messages: &[Message],
        _tools: &[ToolSchema],
        _agent_id: &AgentId,
        _bus: &dyn EventBus,
    ) -> Result<Vec<Message>, LlmError> {
        let next = self.outcomes.lock().expect("outcomes lock").pop_front();
        match next {
            Some(Ok(messages)) => Ok(messages),
            Some(Err(error)) => Err(LlmError::Provider(error)),
            None => Err(LlmError::Provider("script exhausted".into())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
