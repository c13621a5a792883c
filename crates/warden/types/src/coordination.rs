//! Recovery coordination specifications and reports
//!
//! A [`RecoveryCoordination`] describes one recovery episode: which agents
//! are affected, how they are batched, and the timeouts bounding each step.
//! It is created per episode and discarded once the report is returned.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ids::{AgentId, CoordinationId};
use crate::taxonomy::RecoveryStrategy;

/// A precondition that must hold before any agent recovery is attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prerequisite {
    /// Kind of check, named by the deployment (e.g. "quorum", "storage").
    pub kind: String,

    /// Human-readable description of the check.
    pub description: String,

    /// Bound on the check's execution time.
    pub timeout: Duration,
}

impl Prerequisite {
    pub fn new(kind: impl Into<String>, description: impl Into<String>, timeout: Duration) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            timeout,
        }
    }
}

/// Specification of one multi-agent recovery episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryCoordination {
    /// Unique ID of the episode.
    pub coordination_id: CoordinationId,

    /// Agents to recover, in order.
    pub affected_agents: Vec<AgentId>,

    /// How agents are sequenced.
    pub recovery_strategy: RecoveryStrategy,

    /// Upper bound on concurrent recoveries within a batch.
    pub max_concurrent_recoveries: usize,

    /// Bound on each agent's recovery attempt.
    pub recovery_timeout: Duration,

    /// Bound on the whole episode.
    pub coordination_timeout: Duration,

    /// Checks that must pass before the first batch, in order.
    pub prerequisites: Vec<Prerequisite>,
}

impl RecoveryCoordination {
    /// Create a staged coordination over the given agents.
    pub fn new(affected_agents: Vec<AgentId>) -> Self {
        Self {
            coordination_id: CoordinationId::generate(),
            affected_agents,
            recovery_strategy: RecoveryStrategy::Staged,
            max_concurrent_recoveries: 3,
            recovery_timeout: Duration::from_secs(30),
            coordination_timeout: Duration::from_secs(300),
            prerequisites: Vec::new(),
        }
    }

    /// Set the sequencing strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: RecoveryStrategy) -> Self {
        self.recovery_strategy = strategy;
        self
    }

    /// Set the per-batch concurrency bound.
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_recoveries = max.max(1);
        self
    }

    /// Set the per-agent and overall timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, recovery: Duration, coordination: Duration) -> Self {
        self.recovery_timeout = recovery;
        self.coordination_timeout = coordination;
        self
    }

    /// Append a prerequisite check.
    #[must_use]
    pub fn with_prerequisite(mut self, prerequisite: Prerequisite) -> Self {
        self.prerequisites.push(prerequisite);
        self
    }
}

/// Outcome of one coordination episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// The episode this report belongs to.
    pub coordination_id: CoordinationId,

    /// Whether every affected agent recovered within bounds.
    pub success: bool,

    /// Agents the episode targeted.
    pub affected_agents: Vec<AgentId>,

    /// Agents that recovered.
    pub recovered_agents: Vec<AgentId>,

    /// Wall-clock duration of the episode, in milliseconds.
    pub duration_ms: u64,

    /// Whether the overall coordination timeout cut the episode short.
    pub timed_out: bool,

    /// Failure description when the episode aborted (e.g. a prerequisite).
    pub error: Option<String>,
}

/// Counts returned by rolling recovery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RollingRecoveryReport {
    /// Agents attempted.
    pub total_agents: usize,

    /// Agents that recovered.
    pub recovered_agents: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordination_builder() {
        let agents = vec![AgentId::new("a"), AgentId::new("b")];
        let spec = RecoveryCoordination::new(agents.clone())
            .with_max_concurrent(0)
            .with_prerequisite(Prerequisite::new(
                "quorum",
                "consensus quorum reachable",
                Duration::from_secs(5),
            ));

        assert_eq!(spec.affected_agents, agents);
        // Concurrency is clamped to at least one.
        assert_eq!(spec.max_concurrent_recoveries, 1);
        assert_eq!(spec.prerequisites.len(), 1);
    }
}
