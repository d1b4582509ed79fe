//! Agent rows.
//!
//! One row per live agent, keyed by the agent id. The header fields (task,
//! system prompt, tool schemas) are frozen at creation; the message list is
//! the running conversation and is only ever replaced by a superset of
//! itself (possibly reshaped by a conversation processor). Deleted on
//! `agent-deleted`.

use crate::{Kv, StoreError, ROW_TTL};
use colony_core::{AgentId, Message, ToolSchema};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A stored agent row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: AgentId,
    pub task: String,
    #[serde(default)]
    pub system_prompt: String,
    /// Frozen at creation; a running agent's tool set never changes.
    #[serde(default)]
    pub tool_schemas: Vec<ToolSchema>,
    /// The running conversation.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl AgentRecord {
    /// Assemble the LLM prompt: the optional system message followed by the
    /// conversation.
    pub fn prompt(&self) -> Vec<Message> {
        let mut prompt = Vec::with_capacity(self.messages.len() + 1);
        if !self.system_prompt.is_empty() {
            prompt.push(Message::system(self.system_prompt.clone()));
        }
        prompt.extend(self.messages.iter().cloned());
        prompt
    }
}

/// Typed store for agent rows.
#[derive(Clone)]
pub struct AgentStore {
    kv: Arc<dyn Kv>,
}

impl AgentStore {
    pub fn new(kv: Arc<dyn Kv>) -> Self {
        Self { kv }
    }

    /// Write the row, refreshing its TTL.
    pub async fn save(&self, record: &AgentRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        self.kv.set(record.agent_id.as_str(), json, ROW_TTL).await
    }

    pub async fn get(&self, agent_id: &AgentId) -> Result<AgentRecord, StoreError> {
        match self.kv.get(agent_id.as_str()).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(StoreError::Missing {
                key: agent_id.to_string(),
            }),
        }
    }

    pub async fn exists(&self, agent_id: &AgentId) -> Result<bool, StoreError> {
        self.kv.exists(agent_id.as_str()).await
    }

    /// Remove the row. Safe to repeat.
    pub async fn delete(&self, agent_id: &AgentId) -> Result<(), StoreError> {
        self.kv.del(agent_id.as_str()).await
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.kv.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryKv;
    use colony_core::ToolParam;

    fn store() -> AgentStore {
        AgentStore::new(Arc::new(MemoryKv::new()))
    }

    fn record(agent_id: AgentId) -> AgentRecord {
        AgentRecord {
            agent_id,
            task: "2+2".into(),
            system_prompt: "be terse".into(),
            tool_schemas: vec![ToolSchema::new("calculator", "math")
                .with_param(ToolParam::string("operation", "op", true))],
            messages: vec![Message::user("2+2")],
        }
    }

    #[tokio::test]
    async fn save_get_round_trip() {
        let store = store();
        let id = AgentId::primary();
        let row = record(id.clone());
        store.save(&row).await.unwrap();

        let loaded = store.get(&id).await.unwrap();
        assert_eq!(loaded, row);
        assert!(store.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_removes_row() {
        let store = store();
        let id = AgentId::primary();
        store.save(&record(id.clone())).await.unwrap();

        store.delete(&id).await.unwrap();
        assert!(!store.exists(&id).await.unwrap());
        store.delete(&id).await.unwrap();
        assert!(matches!(
            store.get(&id).await,
            Err(StoreError::Missing { .. })
        ));
    }

    #[tokio::test]
    async fn prompt_prepends_system_message_when_present() {
        let row = record(AgentId::primary());
        let prompt = row.prompt();
        assert_eq!(prompt[0], Message::system("be terse"));
        assert_eq!(prompt[1], Message::user("2+2"));

        let mut bare = row.clone();
        bare.system_prompt.clear();
        assert_eq!(bare.prompt(), vec![Message::user("2+2")]);
    }
}
