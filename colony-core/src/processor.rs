//! Conversation processors.
//!
//! An optional pure transform applied after every conversation append, meant
//! for context-window management (summarise, drop old turns). A processor
//! may rewrite the history freely as long as tool-call/tool-result pairing
//! survives: every tool result must still follow a matching tool call.

use crate::message::Message;
use std::collections::HashSet;
use std::sync::Arc;

/// Pure transform over a conversation, applied after each append.
pub type ConversationProcessor = Arc<dyn Fn(Vec<Message>) -> Vec<Message> + Send + Sync>;

/// The default processor: leaves the conversation untouched.
pub fn identity() -> ConversationProcessor {
    Arc::new(|messages| messages)
}

/// Whether every tool result in `messages` references a tool call that
/// appears earlier in the same conversation.
pub fn conversation_is_well_formed(messages: &[Message]) -> bool {
    let mut seen_calls: HashSet<&str> = HashSet::new();
    for message in messages {
        match message {
            Message::ToolCall { tool_call_id, .. } => {
                seen_calls.insert(tool_call_id);
            }
            Message::ToolResult { tool_call_id, .. } => {
                if !seen_calls.contains(tool_call_id.as_str()) {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn sample() -> Vec<Message> {
        vec![
            Message::user("2+2"),
            Message::tool_call("c1", "calculator", Map::new()),
            Message::tool_result("c1", "calculator", "4"),
            Message::assistant("4"),
        ]
    }

    #[test]
    fn identity_preserves_everything() {
        let processor = identity();
        assert_eq!(processor(sample()), sample());
    }

    #[test]
    fn well_formed_accepts_paired_history() {
        assert!(conversation_is_well_formed(&sample()));
        assert!(conversation_is_well_formed(&[]));
    }

    #[test]
    fn well_formed_rejects_orphan_result() {
        let messages = vec![
            Message::user("2+2"),
            Message::tool_result("c9", "calculator", "4"),
        ];
        assert!(!conversation_is_well_formed(&messages));
    }

    #[test]
    fn pairing_breaking_processor_is_detectable() {
        // A processor that drops tool calls but keeps results violates the
        // contract, and the check catches it.
        let dropper: ConversationProcessor =
            Arc::new(|messages| messages.into_iter().filter(|m| !m.is_tool_call()).collect());
        let out = dropper(sample());
        assert!(!conversation_is_well_formed(&out));
    }
}
