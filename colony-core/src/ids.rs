//! Hierarchical agent identifiers.
//!
//! A primary agent is `agent:<uuid>`; a sub-agent is
//! `agent:<primary-uuid>:<sub-uuid>`. The part count alone decides whether an
//! id is primary, and the primary uuid segment is inherited by every
//! descendant, so the tree relation needs no stored parent pointer.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const PREFIX: &str = "agent";

/// Identifier of a running agent, primary or sub.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

/// Error returned when a string is not a valid agent id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentIdError {
    #[error("invalid agent id: {0}")]
    Invalid(String),

    #[error("not a sub-agent: {0}")]
    NotSubAgent(String),
}

impl AgentId {
    /// Allocate a fresh primary agent id.
    pub fn primary() -> Self {
        Self(format!("{PREFIX}:{}", Uuid::new_v4()))
    }

    /// Allocate a sub-agent id under this agent's primary.
    ///
    /// Siblings spawned by a sub-agent share the primary segment: extending
    /// `agent:U:V` yields `agent:U:<new>`, not a four-part id.
    pub fn sub_agent(&self) -> Self {
        let primary_uuid = self.parts()[1];
        Self(format!("{PREFIX}:{primary_uuid}:{}", Uuid::new_v4()))
    }

    /// Whether this id names a top-level agent (exactly two parts).
    pub fn is_primary(&self) -> bool {
        self.parts().len() == 2
    }

    /// Whether this id names a sub-agent (exactly three parts).
    pub fn is_sub_agent(&self) -> bool {
        self.parts().len() == 3
    }

    /// The primary ancestor of a sub-agent id.
    pub fn primary_id(&self) -> Result<AgentId, AgentIdError> {
        if !self.is_sub_agent() {
            return Err(AgentIdError::NotSubAgent(self.0.clone()));
        }
        Ok(Self(format!("{PREFIX}:{}", self.parts()[1])))
    }

    /// Parse and validate an id received off the wire.
    pub fn parse(s: &str) -> Result<Self, AgentIdError> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.len() {
            2 | 3 if parts[0] == PREFIX && parts[1..].iter().all(|p| !p.is_empty()) => {
                Ok(Self(s.to_string()))
            }
            _ => Err(AgentIdError::Invalid(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn parts(&self) -> Vec<&str> {
        self.0.split(':').collect()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl Borrow<str> for AgentId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for AgentId {
    type Err = AgentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_round_trip() {
        let id = AgentId::primary();
        assert!(id.is_primary());
        assert!(!id.is_sub_agent());
        assert_eq!(AgentId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn sub_agent_extends_primary() {
        let primary = AgentId::primary();
        let sub = primary.sub_agent();
        assert!(sub.is_sub_agent());
        assert!(!sub.is_primary());
        assert_eq!(sub.primary_id().unwrap(), primary);
    }

    #[test]
    fn sibling_of_sub_agent_shares_primary_segment() {
        let primary = AgentId::primary();
        let sub = primary.sub_agent();
        let sibling = sub.sub_agent();
        assert!(sibling.is_sub_agent());
        assert_eq!(sibling.primary_id().unwrap(), primary);
        assert_ne!(sibling, sub);
    }

    #[test]
    fn re_extension_stays_valid() {
        // Recomputing the primary and extending again must always yield a
        // parseable sub-agent id, at any depth of re-extension.
        let mut id = AgentId::primary().sub_agent();
        for _ in 0..8 {
            let primary = id.primary_id().unwrap();
            assert!(primary.is_primary());
            id = primary.sub_agent();
            assert!(AgentId::parse(id.as_str()).unwrap().is_sub_agent());
        }
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in [
            "",
            "agent",
            "agent:",
            "agent::x",
            "task:123",
            "agent:a:b:c",
            "AGENT:abc",
        ] {
            assert!(AgentId::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn serde_is_transparent() {
        let id = AgentId::primary();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
