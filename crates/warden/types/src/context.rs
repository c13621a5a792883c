//! Error occurrence context
//!
//! An [`ErrorContext`] identifies a single failure occurrence: which agent
//! reported it, when, in which environment, and any free-form metadata the
//! caller attaches. Contexts are created fresh per failure and are immutable
//! once handed to the framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{AgentId, ErrorId};
use crate::taxonomy::AgentType;

/// Metadata key under which callers list the agents affected by a failure.
pub const AFFECTED_AGENTS_KEY: &str = "affected_agents";

/// Metadata key naming the guarded operation a failure belongs to.
pub const OPERATION_KEY: &str = "operation";

/// Identifies one failure occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique ID of this occurrence.
    pub error_id: ErrorId,

    /// Agent that reported the failure.
    pub agent_id: AgentId,

    /// Role of the reporting agent.
    pub agent_type: AgentType,

    /// When the failure was observed.
    pub timestamp: DateTime<Utc>,

    /// Deployment environment tag (e.g. "production", "staging").
    pub environment: String,

    /// Free-form caller-supplied metadata.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ErrorContext {
    /// Create a context for a failure reported by the given agent.
    pub fn new(agent_id: AgentId, agent_type: AgentType) -> Self {
        Self {
            error_id: ErrorId::generate(),
            agent_id,
            agent_type,
            timestamp: Utc::now(),
            environment: "production".to_string(),
            metadata: HashMap::new(),
        }
    }

    /// Set the environment tag.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Name the guarded operation this failure belongs to.
    #[must_use]
    pub fn with_operation(self, operation: impl Into<String>) -> Self {
        self.with_metadata(OPERATION_KEY, operation.into())
    }

    /// List the agents affected by this failure.
    #[must_use]
    pub fn with_affected_agents(self, agents: &[AgentId]) -> Self {
        let ids: Vec<serde_json::Value> = agents
            .iter()
            .map(|a| serde_json::Value::String(a.as_str().to_string()))
            .collect();
        self.with_metadata(AFFECTED_AGENTS_KEY, serde_json::Value::Array(ids))
    }

    /// The guarded operation named in metadata, if any.
    pub fn operation(&self) -> Option<&str> {
        self.metadata.get(OPERATION_KEY).and_then(|v| v.as_str())
    }

    /// Agents affected by this failure.
    ///
    /// Read from the `affected_agents` metadata entry when present; the
    /// reporting agent alone otherwise.
    pub fn affected_agents(&self) -> Vec<AgentId> {
        match self.metadata.get(AFFECTED_AGENTS_KEY).and_then(|v| v.as_array()) {
            Some(list) if !list.is_empty() => list
                .iter()
                .filter_map(|v| v.as_str().map(AgentId::new))
                .collect(),
            _ => vec![self.agent_id.clone()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_defaults() {
        let ctx = ErrorContext::new(AgentId::new("workflow-1"), AgentType::Workflow);
        assert_eq!(ctx.environment, "production");
        assert!(ctx.metadata.is_empty());
    }

    #[test]
    fn test_affected_agents_falls_back_to_reporter() {
        let ctx = ErrorContext::new(AgentId::new("validator-2"), AgentType::Validation);
        assert_eq!(ctx.affected_agents(), vec![AgentId::new("validator-2")]);
    }

    #[test]
    fn test_affected_agents_from_metadata() {
        let ctx = ErrorContext::new(AgentId::new("consensus-0"), AgentType::Consensus)
            .with_affected_agents(&[AgentId::new("consensus-1"), AgentId::new("consensus-2")]);
        assert_eq!(
            ctx.affected_agents(),
            vec![AgentId::new("consensus-1"), AgentId::new("consensus-2")]
        );
    }

    #[test]
    fn test_operation_metadata() {
        let ctx = ErrorContext::new(AgentId::new("integration-4"), AgentType::Integration)
            .with_operation("ledger_write");
        assert_eq!(ctx.operation(), Some("ledger_write"));
    }
}
