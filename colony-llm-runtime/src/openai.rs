//! OpenAI chat-completions provider.
//!
//! The wire format differs from the internal message shape in one way that
//! matters: consecutive tool-call messages collapse into a single assistant
//! turn carrying a `tool_calls` list, and each tool result becomes a
//! `role: "tool"` message with a matching `tool_call_id`. The reverse
//! adapter splits a completion into an optional assistant message plus zero
//! or more tool-call messages.

use crate::{LlmError, LlmProvider};
use async_trait::async_trait;
use colony_bus::{emit, EventBus};
use colony_core::{
    AgentId, Message, MessageStreamDoneEvent, MessageStreamErrorEvent, MessageStreamStartEvent,
    ToolSchema,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Provider backed by an OpenAI-compatible chat-completions API.
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Create from `OPENAI_API_KEY`, honouring `OPENAI_BASE_URL` and
    /// `OPENAI_MODEL` overrides.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::Provider("OPENAI_API_KEY is not set".into()))?;
        let mut provider = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            provider.base_url = base_url;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            provider.model = model;
        }
        Ok(provider)
    }

    /// Override the API base URL (testing, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn call(&self, messages: &[Message], tools: &[ToolSchema]) -> Result<Vec<Message>, LlmError> {
        let mut body = json!({
            "model": self.model,
            "messages": to_wire_messages(messages),
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(to_wire_tools(tools));
        }

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|err| LlmError::Decode(err.to_string()))?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Decode("completion has no choices".into()))?;
        debug!(model = %completion.model, "completion received");
        Ok(from_wire_response(
            choice.message.content,
            choice.message.tool_calls.unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        agent_id: &AgentId,
        bus: &dyn EventBus,
    ) -> Result<Vec<Message>, LlmError> {
        // Streaming subjects are informational; a publish failure never
        // fails the completion itself.
        if let Err(err) = emit(bus, &MessageStreamStartEvent::new(agent_id.clone())).await {
            warn!(agent_id = %agent_id, %err, "failed to emit stream start");
        }

        match self.call(messages, tools).await {
            Ok(response) => {
                let text: String = response
                    .iter()
                    .filter_map(|message| match message {
                        Message::Assistant { content } => Some(content.as_str()),
                        _ => None,
                    })
                    .collect();
                let done = MessageStreamDoneEvent::new(agent_id.clone(), text);
                if let Err(err) = emit(bus, &done).await {
                    warn!(agent_id = %agent_id, %err, "failed to emit stream done");
                }
                Ok(response)
            }
            Err(cause) => {
                let event = MessageStreamErrorEvent::new(agent_id.clone(), cause.to_string());
                if let Err(err) = emit(bus, &event).await {
                    warn!(agent_id = %agent_id, %err, "failed to emit stream error");
                }
                Err(cause)
            }
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    /// Arguments arrive as a JSON-encoded string.
    arguments: String,
}

/// Lower internal messages to the chat-completions shape.
fn to_wire_messages(messages: &[Message]) -> Vec<Value> {
    let mut wire = Vec::new();
    let mut pending_calls: Vec<Value> = Vec::new();

    fn flush(wire: &mut Vec<Value>, pending: &mut Vec<Value>) {
        if !pending.is_empty() {
            wire.push(json!({
                "role": "assistant",
                "tool_calls": std::mem::take(pending),
            }));
        }
    }

    for (i, message) in messages.iter().enumerate() {
        match message {
            Message::System { content } => {
                flush(&mut wire, &mut pending_calls);
                wire.push(json!({"role": "system", "content": content}));
            }
            Message::User { content } => {
                flush(&mut wire, &mut pending_calls);
                wire.push(json!({"role": "user", "content": content}));
            }
            Message::Assistant { content } => {
                flush(&mut wire, &mut pending_calls);
                // An assistant turn immediately followed by its tool calls
                // is represented by the tool_calls message alone.
                let followed_by_call = messages
                    .get(i + 1)
                    .is_some_and(|next| next.is_tool_call());
                if !followed_by_call {
                    wire.push(json!({"role": "assistant", "content": content}));
                }
            }
            Message::ToolCall {
                tool_call_id,
                tool_name,
                arguments,
            } => {
                let arguments =
                    serde_json::to_string(arguments).unwrap_or_else(|_| "{}".to_string());
                pending_calls.push(json!({
                    "id": tool_call_id,
                    "type": "function",
                    "function": {"name": tool_name, "arguments": arguments},
                }));
            }
            Message::ToolResult {
                tool_call_id,
                result,
                ..
            } => {
                flush(&mut wire, &mut pending_calls);
                wire.push(json!({
                    "role": "tool",
                    "content": result,
                    "tool_call_id": tool_call_id,
                }));
            }
        }
    }
    flush(&mut wire, &mut pending_calls);
    wire
}

/// Lower tool schemas to the chat-completions `tools` array.
fn to_wire_tools(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for param in &tool.parameters {
                let mut property = Map::new();
                property.insert("type".into(), Value::String(param.param_type.clone()));
                property.insert(
                    "description".into(),
                    Value::String(param.description.clone()),
                );
                if let Some(items) = &param.items {
                    property.insert("items".into(), items.clone());
                }
                properties.insert(param.name.clone(), Value::Object(property));
                if param.required {
                    required.push(Value::String(param.name.clone()));
                }
            }
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": {
                        "type": "object",
                        "properties": properties,
                        "required": required,
                    },
                },
            })
        })
        .collect()
}

/// Split a completion back into internal messages.
fn from_wire_response(content: Option<String>, tool_calls: Vec<WireToolCall>) -> Vec<Message> {
    let mut messages = Vec::new();
    if let Some(content) = content {
        if !content.is_empty() {
            messages.push(Message::assistant(content));
        }
    }
    for call in tool_calls {
        let arguments: Map<String, Value> =
            serde_json::from_str(&call.function.arguments).unwrap_or_default();
        messages.push(Message::tool_call(call.id, call.function.name, arguments));
    }
    messages
}
