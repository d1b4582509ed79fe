//! The LLM runtime.
//!
//! Consumes `llm-request`, delegates to the configured provider, and runs
//! the bounded retry loop on `llm-runtime-error`: up to five fresh requests
//! per original, after which a synthetic assistant message hands control
//! back to the agent's normal path (which terminates it as a plain text
//! response).

mod error;
mod openai;
mod provider;

pub use error::LlmError;
pub use openai::OpenAiProvider;
pub use provider::{LlmProvider, ScriptedProvider};

use colony_bus::{emit, subscribe, BusError, EventBus};
use colony_core::subject::queue;
use colony_core::{LlmRequestEvent, LlmResponseEvent, LlmRuntimeErrorEvent, Message};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Retry budget per original request, counted in-band on the event.
pub const MAX_RETRIES: u32 = 5;

/// The LLM runtime: one provider, two subscriptions.
pub struct LlmRuntime {
    bus: Arc<dyn EventBus>,
    provider: Arc<dyn LlmProvider>,
}

impl LlmRuntime {
    pub fn new(bus: Arc<dyn EventBus>, provider: Arc<dyn LlmProvider>) -> Self {
        Self { bus, provider }
    }

    /// Install the `llm-request` and `llm-runtime-error` subscriptions.
    pub async fn subscribe(self: &Arc<Self>) -> Result<(), BusError> {
        let this = self.clone();
        subscribe::<LlmRequestEvent, _, _>(self.bus.as_ref(), queue::LLM_RUNTIME, move |event| {
            let this = this.clone();
            async move { this.handle_request(event).await }
        })
        .await?;

        let this = self.clone();
        subscribe::<LlmRuntimeErrorEvent, _, _>(
            self.bus.as_ref(),
            queue::LLM_RUNTIME,
            move |event| {
                let this = this.clone();
                async move { this.handle_runtime_error(event).await }
            },
        )
        .await
    }

    /// `llm-request`: call the provider; emit the response, or an error
    /// event carrying the request so the retry loop can see the count.
    pub async fn handle_request(&self, event: LlmRequestEvent) {
        debug!(
            agent_id = %event.agent_id,
            provider = self.provider.name(),
            retry_count = event.retry_count,
            "processing llm request"
        );
        let outcome = self
            .provider
            .complete(
                &event.messages,
                &event.tool_schemas,
                &event.agent_id,
                self.bus.as_ref(),
            )
            .await;
        match outcome {
            Ok(response) => {
                let response = LlmResponseEvent::new(event, response);
                if let Err(err) = emit(self.bus.as_ref(), &response).await {
                    error!(agent_id = %response.agent_id, %err, "failed to emit llm-response");
                }
            }
            Err(cause) => {
                warn!(agent_id = %event.agent_id, error = %cause, "provider call failed");
                let error = LlmRuntimeErrorEvent::new(event, cause.to_string());
                if let Err(err) = emit(self.bus.as_ref(), &error).await {
                    error!(agent_id = %error.agent_id, %err, "failed to emit llm-runtime-error");
                }
            }
        }
    }

    /// `llm-runtime-error`: retry while budget remains; on the fifth failure
    /// synthesize an assistant message so the agent terminates normally.
    pub async fn handle_runtime_error(&self, event: LlmRuntimeErrorEvent) {
        if event.request.retry_count < MAX_RETRIES {
            let retry = event.request.retry();
            debug!(
                agent_id = %retry.agent_id,
                retry_count = retry.retry_count,
                "retrying llm request"
            );
            if let Err(err) = emit(self.bus.as_ref(), &retry).await {
                error!(agent_id = %retry.agent_id, %err, "failed to emit retry request");
            }
            return;
        }

        warn!(agent_id = %event.agent_id, "retry budget exhausted, synthesizing response");
        let message = Message::assistant(format!("Runtime error: {}", event.error));
        let response = LlmResponseEvent::new(event.request, vec![message]);
        if let Err(err) = emit(self.bus.as_ref(), &response).await {
            error!(agent_id = %response.agent_id, %err, "failed to emit synthetic response");
        }
    }
}
