//! Task rows.
//!
//! One row per external task, keyed `task:<agent-id>`. Created pending at
//! ingress, overwritten to its terminal state by the launcher's
//! `task-finish` / `task-error` handlers. Terminal writes are overwrites, so
//! a redelivered terminal event rewrites the same content.

use crate::{Kv, StoreError, ROW_TTL};
use colony_core::AgentId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Success,
    Failed,
}

/// A stored task row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub agent_id: AgentId,
    pub task: String,
    pub status: TaskStatus,
    /// Final answer on success, error string on failure.
    #[serde(default)]
    pub result: String,
}

/// Typed store for task rows.
#[derive(Clone)]
pub struct TaskStore {
    kv: Arc<dyn Kv>,
}

impl TaskStore {
    pub fn new(kv: Arc<dyn Kv>) -> Self {
        Self { kv }
    }

    fn key(agent_id: &AgentId) -> String {
        format!("task:{agent_id}")
    }

    async fn write(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        self.kv.set(&Self::key(&record.agent_id), json, ROW_TTL).await
    }

    /// Create the pending row at ingress.
    pub async fn create_pending(&self, agent_id: &AgentId, task: &str) -> Result<(), StoreError> {
        self.write(&TaskRecord {
            agent_id: agent_id.clone(),
            task: task.to_string(),
            status: TaskStatus::Pending,
            result: String::new(),
        })
        .await
    }

    /// Overwrite the row with its success terminal.
    pub async fn mark_success(&self, agent_id: &AgentId, result: &str) -> Result<(), StoreError> {
        let mut record = self.get_required(agent_id).await?;
        record.status = TaskStatus::Success;
        record.result = result.to_string();
        self.write(&record).await
    }

    /// Overwrite the row with its failure terminal.
    pub async fn mark_failed(&self, agent_id: &AgentId, error: &str) -> Result<(), StoreError> {
        let mut record = self.get_required(agent_id).await?;
        record.status = TaskStatus::Failed;
        record.result = error.to_string();
        self.write(&record).await
    }

    pub async fn get(&self, agent_id: &AgentId) -> Result<Option<TaskRecord>, StoreError> {
        match self.kv.get(&Self::key(agent_id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn get_required(&self, agent_id: &AgentId) -> Result<TaskRecord, StoreError> {
        self.get(agent_id).await?.ok_or_else(|| StoreError::Missing {
            key: Self::key(agent_id),
        })
    }

    /// Roll back a partially created task at ingress.
    pub async fn delete(&self, agent_id: &AgentId) -> Result<(), StoreError> {
        self.kv.del(&Self::key(agent_id)).await
    }

    pub async fn exists(&self, agent_id: &AgentId) -> Result<bool, StoreError> {
        self.kv.exists(&Self::key(agent_id)).await
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.kv.ping().await
    }
}
