//! Recovery coordinator
//!
//! Orchestrates recovery across a set of affected agents: prerequisites run
//! first and sequentially, agents recover in batches bounded by the
//! coordination's concurrency limit, and the whole episode is cut off at
//! the coordination timeout. Batch members run concurrently; batches
//! themselves run strictly in sequence.
//!
//! Actual recovery of a single agent is delegated to an injected
//! [`AgentRecovery`] implementation supplied by the hosting process.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use warden_types::{
    AgentId, Prerequisite, RecoveryCoordination, RecoveryReport, RollingRecoveryReport,
};

use crate::config::CoordinationConfig;
use crate::error::{WardenError, WardenResult};

/// Executes recovery steps for individual agents.
#[async_trait]
pub trait AgentRecovery: Send + Sync {
    /// Recover a single agent.
    async fn recover(&self, agent_id: &AgentId) -> WardenResult<()>;

    /// Verify a coordination prerequisite.
    async fn check_prerequisite(&self, _prerequisite: &Prerequisite) -> WardenResult<()> {
        Ok(())
    }
}

/// Recovery executor that succeeds without doing anything. Useful for
/// tests and for deployments that only want classification and breakers.
pub struct NoopAgentRecovery;

#[async_trait]
impl AgentRecovery for NoopAgentRecovery {
    async fn recover(&self, agent_id: &AgentId) -> WardenResult<()> {
        debug!(agent_id = %agent_id, "no-op agent recovery");
        Ok(())
    }
}

/// Recovery executor that fails for a fixed set of agents.
pub struct FailingAgentRecovery {
    failing: HashSet<AgentId>,
}

impl FailingAgentRecovery {
    /// Create an executor that fails recovery for the given agents.
    pub fn new(failing: impl IntoIterator<Item = AgentId>) -> Self {
        Self {
            failing: failing.into_iter().collect(),
        }
    }
}

#[async_trait]
impl AgentRecovery for FailingAgentRecovery {
    async fn recover(&self, agent_id: &AgentId) -> WardenResult<()> {
        if self.failing.contains(agent_id) {
            Err(WardenError::RecoveryFailed {
                agent_id: agent_id.clone(),
                reason: "simulated recovery failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Orchestrates batched multi-agent recovery episodes.
pub struct RecoveryCoordinator {
    config: CoordinationConfig,
    executor: Arc<dyn AgentRecovery>,
}

impl RecoveryCoordinator {
    /// Create a coordinator delegating to the given executor.
    pub fn new(config: CoordinationConfig, executor: Arc<dyn AgentRecovery>) -> Self {
        Self { config, executor }
    }

    /// Build a coordination spec with this coordinator's configured
    /// timeouts and concurrency bound.
    pub fn coordination_for(&self, affected_agents: Vec<AgentId>) -> RecoveryCoordination {
        RecoveryCoordination::new(affected_agents)
            .with_max_concurrent(self.config.max_concurrent_recoveries)
            .with_timeouts(self.config.recovery_timeout, self.config.coordination_timeout)
    }

    /// Run one coordination episode.
    ///
    /// Prerequisites run sequentially, each under its own timeout; any
    /// failure aborts with zero recovered agents. Agent batches then run in
    /// sequence until done or the coordination timeout is reached; a
    /// failing agent never aborts its batch or later batches.
    #[instrument(skip(self, spec), fields(coordination_id = %spec.coordination_id))]
    pub async fn coordinate_recovery(&self, spec: &RecoveryCoordination) -> RecoveryReport {
        let started = Instant::now();
        info!(
            agents = spec.affected_agents.len(),
            strategy = %spec.recovery_strategy,
            "starting recovery coordination"
        );

        for prerequisite in &spec.prerequisites {
            if let Err(e) = self.run_prerequisite(prerequisite).await {
                warn!(
                    kind = %prerequisite.kind,
                    error = %e,
                    "prerequisite failed, aborting coordination"
                );
                return RecoveryReport {
                    coordination_id: spec.coordination_id.clone(),
                    success: false,
                    affected_agents: spec.affected_agents.clone(),
                    recovered_agents: Vec::new(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    timed_out: false,
                    error: Some(e.to_string()),
                };
            }
        }

        let deadline = started + spec.coordination_timeout;
        let batch_size = spec.max_concurrent_recoveries.max(1);
        let mut recovered = Vec::new();
        let mut timed_out = false;

        for batch in spec.affected_agents.chunks(batch_size) {
            if Instant::now() >= deadline {
                warn!(
                    recovered = recovered.len(),
                    remaining = spec.affected_agents.len() - recovered.len(),
                    "coordination timeout reached, returning partial results"
                );
                timed_out = true;
                break;
            }
            recovered.extend(self.recover_batch(batch, spec.recovery_timeout).await);
        }

        let success = !timed_out && recovered.len() == spec.affected_agents.len();
        info!(
            success = success,
            recovered = recovered.len(),
            affected = spec.affected_agents.len(),
            "recovery coordination finished"
        );

        RecoveryReport {
            coordination_id: spec.coordination_id.clone(),
            success,
            affected_agents: spec.affected_agents.clone(),
            recovered_agents: recovered,
            duration_ms: started.elapsed().as_millis() as u64,
            timed_out,
            error: None,
        }
    }

    /// Recover agents in fixed-size batches with a pacing delay between
    /// batches. Used when strict pacing matters more than maximum
    /// concurrency.
    pub async fn execute_rolling_recovery(
        &self,
        agents: &[AgentId],
        batch_size: usize,
        delay_between_batches: Duration,
        timeout: Duration,
    ) -> RollingRecoveryReport {
        let batch_size = batch_size.max(1);
        let mut recovered = 0;

        for (index, batch) in agents.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(delay_between_batches).await;
            }
            recovered += self.recover_batch(batch, timeout).await.len();
        }

        RollingRecoveryReport {
            total_agents: agents.len(),
            recovered_agents: recovered,
        }
    }

    async fn run_prerequisite(&self, prerequisite: &Prerequisite) -> WardenResult<()> {
        debug!(kind = %prerequisite.kind, "running prerequisite");
        match tokio::time::timeout(
            prerequisite.timeout,
            self.executor.check_prerequisite(prerequisite),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(WardenError::PrerequisiteFailed {
                kind: prerequisite.kind.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(WardenError::PrerequisiteFailed {
                kind: prerequisite.kind.clone(),
                reason: format!("timed out after {}ms", prerequisite.timeout.as_millis()),
            }),
        }
    }

    /// Recover every agent in a batch concurrently, each bounded by the
    /// per-agent timeout. Returns the agents that recovered.
    async fn recover_batch(&self, batch: &[AgentId], timeout: Duration) -> Vec<AgentId> {
        let attempts = batch.iter().map(|agent_id| async move {
            let outcome = tokio::time::timeout(timeout, self.executor.recover(agent_id)).await;
            match outcome {
                Ok(Ok(())) => {
                    debug!(agent_id = %agent_id, "agent recovered");
                    (agent_id.clone(), true)
                }
                Ok(Err(e)) => {
                    warn!(agent_id = %agent_id, error = %e, "agent recovery failed");
                    (agent_id.clone(), false)
                }
                Err(_) => {
                    warn!(
                        agent_id = %agent_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "agent recovery timed out"
                    );
                    (agent_id.clone(), false)
                }
            }
        });

        join_all(attempts)
            .await
            .into_iter()
            .filter_map(|(agent, ok)| ok.then_some(agent))
            .collect()
    }
}
