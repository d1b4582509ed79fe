//! Conversation messages.
//!
//! A closed tagged sum: adapters are plain matches over the tag, and the
//! tool-call/tool-result variants carry the `tool_call_id` join key that
//! pairs one requested invocation with its outcome.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single message in an agent's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// System prompt, injected ahead of the conversation.
    System { content: String },
    /// User input (the task text, for agents).
    User { content: String },
    /// Assistant text output.
    Assistant { content: String },
    /// One function invocation requested by the model.
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        arguments: Map<String, Value>,
    },
    /// The outcome of a tool call, joined by `tool_call_id`.
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        result: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    pub fn tool_call(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self::ToolCall {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            result: result.into(),
        }
    }

    /// The tool-call id, for the two variants that carry one.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::ToolCall { tool_call_id, .. } | Self::ToolResult { tool_call_id, .. } => {
                Some(tool_call_id)
            }
            _ => None,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tagged_wire_shape() {
        let msg = Message::user("say hi");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "user", "content": "say hi"}));

        let mut args = Map::new();
        args.insert("query".into(), json!("rust"));
        let call = Message::tool_call("c1", "search", args);
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value["type"], "tool_call");
        assert_eq!(value["tool_call_id"], "c1");
        assert_eq!(value["arguments"]["query"], "rust");
    }

    #[test]
    fn tool_call_arguments_default_to_empty() {
        let msg: Message = serde_json::from_value(json!({
            "type": "tool_call",
            "tool_call_id": "c9",
            "tool_name": "current_time",
        }))
        .unwrap();
        match msg {
            Message::ToolCall { arguments, .. } => assert!(arguments.is_empty()),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn round_trips_every_variant() {
        let mut args = Map::new();
        args.insert("a".into(), json!(2));
        let messages = vec![
            Message::system("be helpful"),
            Message::user("2+2"),
            Message::assistant("working on it"),
            Message::tool_call("c1", "calculator", args),
            Message::tool_result("c1", "calculator", "4"),
        ];
        let json = serde_json::to_string(&messages).unwrap();
        let back: Vec<Message> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, messages);
    }
}
