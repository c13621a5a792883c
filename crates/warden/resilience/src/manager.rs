//! Error handling manager
//!
//! The top-level facade of the framework. A manager owns the classifier,
//! the circuit breaker registry, the degradation manager, the recovery
//! coordinator, and the audit sink, and wires them into one flow: classify
//! an incoming failure, pick a recovery approach, execute it within
//! bounds, and return a structured [`HandlingResult`] plus audit entry.
//!
//! Callers never receive a raw, unclassified failure from this path.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use warden_types::{
    AgentId, ConditionOperator, DegradationCondition, ErrorClassification, ErrorContext,
    ErrorType, HandlingResult, ImpactScope, RecoveryApproach, Severity,
};

use crate::audit::{AuditRecord, AuditSink, NoopAuditSink};
use crate::breaker::CircuitBreakerRegistry;
use crate::classifier::ErrorClassifier;
use crate::config::ErrorHandlingConfig;
use crate::coordinator::{AgentRecovery, NoopAgentRecovery, RecoveryCoordinator};
use crate::degradation::DegradationManager;
use crate::error::{WardenError, WardenResult};

/// Metric name the manager feeds into degradation evaluation.
pub const ERROR_RATE_METRIC: &str = "error_rate";

/// Window over which the manager computes its failure percentage.
const ERROR_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Aggregate counters over handled failures.
#[derive(Debug, Clone, Default)]
pub struct ErrorStatistics {
    /// Failures handled in total.
    pub total_errors: u64,

    /// Failure counts by severity.
    pub errors_by_severity: HashMap<Severity, u64>,

    /// Failure counts by type.
    pub errors_by_type: HashMap<ErrorType, u64>,

    /// Local recovery attempts made.
    pub recovery_attempts: u64,

    /// Local recovery attempts that succeeded.
    pub successful_recoveries: u64,

    /// When the last failure was handled.
    pub last_error_time: Option<DateTime<Utc>>,
}

impl ErrorStatistics {
    fn record_error(&mut self, classification: &ErrorClassification) {
        self.total_errors += 1;
        *self
            .errors_by_severity
            .entry(classification.severity)
            .or_insert(0) += 1;
        *self
            .errors_by_type
            .entry(classification.error_type)
            .or_insert(0) += 1;
        self.last_error_time = Some(Utc::now());
    }

    /// Ratio of successful local recoveries to attempts; 0.0 with no
    /// attempts.
    pub fn recovery_rate(&self) -> f64 {
        if self.recovery_attempts == 0 {
            0.0
        } else {
            self.successful_recoveries as f64 / self.recovery_attempts as f64
        }
    }
}

/// Top-level error handling facade.
pub struct ErrorHandlingManager {
    config: ErrorHandlingConfig,
    classifier: ErrorClassifier,
    breakers: CircuitBreakerRegistry,
    degradation: Arc<DegradationManager>,
    coordinator: RecoveryCoordinator,
    recovery: Arc<dyn AgentRecovery>,
    audit: Arc<dyn AuditSink>,
    stats: Mutex<ErrorStatistics>,
    /// Consecutive handled failures per guarded operation name.
    failure_streaks: DashMap<String, u32>,
    /// Recent guarded-call outcomes for the failure percentage.
    outcomes: Mutex<VecDeque<(Instant, bool)>>,
}

impl ErrorHandlingManager {
    /// Create a manager with no-op audit and recovery collaborators.
    pub fn new(config: ErrorHandlingConfig) -> Self {
        Self::with_collaborators(config, Arc::new(NoopAuditSink), Arc::new(NoopAgentRecovery))
    }

    /// Create a manager with injected audit and recovery collaborators.
    pub fn with_collaborators(
        config: ErrorHandlingConfig,
        audit: Arc<dyn AuditSink>,
        recovery: Arc<dyn AgentRecovery>,
    ) -> Self {
        let breakers = CircuitBreakerRegistry::new(config.circuit_breaker.clone());
        let degradation = Arc::new(DegradationManager::new(config.degradation.clone()));
        let coordinator = RecoveryCoordinator::new(config.coordination.clone(), recovery.clone());

        Self {
            config,
            classifier: ErrorClassifier::with_default_rules(),
            breakers,
            degradation,
            coordinator,
            recovery,
            audit,
            stats: Mutex::new(ErrorStatistics::default()),
            failure_streaks: DashMap::new(),
            outcomes: Mutex::new(VecDeque::new()),
        }
    }

    /// Start background tasks (degradation auto-recovery). Requires a
    /// running tokio runtime.
    pub fn start_background_tasks(&self) {
        self.degradation.start_auto_recovery();
    }

    /// Stop background tasks.
    pub fn shutdown(&self) {
        self.degradation.shutdown();
    }

    /// The classifier and its runtime-mutable rule set.
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// The per-service circuit breaker registry.
    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// The degradation manager.
    pub fn degradation(&self) -> &Arc<DegradationManager> {
        &self.degradation
    }

    /// The recovery coordinator.
    pub fn coordinator(&self) -> &RecoveryCoordinator {
        &self.coordinator
    }

    /// Snapshot of the aggregate failure counters.
    pub fn error_stats(&self) -> ErrorStatistics {
        self.lock_stats().clone()
    }

    /// Handle a raw failure reported by an agent.
    ///
    /// Classifies the failure, picks a recovery approach, executes it
    /// within the configured bounds, and returns the structured result.
    #[instrument(skip(self, raw_error, context), fields(error_id = %context.error_id, agent_id = %context.agent_id))]
    pub async fn handle_error(&self, raw_error: &str, context: &ErrorContext) -> HandlingResult {
        let started = Instant::now();
        let classification = self.classifier.classify(raw_error, context);
        self.note_failure(&classification);

        debug!(
            error_type = %classification.error_type,
            severity = %classification.severity,
            scope = %classification.impact_scope,
            "failure classified"
        );

        if !classification.is_retryable {
            info!(
                error_type = %classification.error_type,
                "non-retryable failure, surfacing without recovery"
            );
            let result = HandlingResult {
                success: false,
                classification: classification.clone(),
                recovery_approach: RecoveryApproach::None,
                duration_ms: started.elapsed().as_millis() as u64,
                recovered_agents: None,
                attempts: 0,
                error_id: context.error_id.clone(),
            };
            self.write_audit(context, &result).await;
            return result;
        }

        let approach = self.select_approach(&classification, context);
        let (success, attempts, recovered_agents) = match approach {
            RecoveryApproach::CircuitBreak => (self.apply_circuit_break(context), 0, None),
            RecoveryApproach::Coordinate => self.coordinate(context).await,
            RecoveryApproach::Degrade => (self.apply_degradation(), 0, None),
            RecoveryApproach::Retry | RecoveryApproach::None => {
                self.retry_local_recovery(context).await
            }
        };

        // Exhausted local attempts escalate into degradation evaluation
        // when coordination is enabled.
        if !success
            && approach == RecoveryApproach::Retry
            && self.config.enable_recovery_coordination
            && self.config.enable_graceful_degradation
        {
            self.apply_degradation();
        }

        let result = HandlingResult {
            success,
            classification,
            recovery_approach: approach,
            duration_ms: started.elapsed().as_millis() as u64,
            recovered_agents,
            attempts,
            error_id: context.error_id.clone(),
        };
        self.write_audit(context, &result).await;
        result
    }

    /// Run an operation through the circuit breaker for the named service,
    /// bounded by the default timeout.
    ///
    /// # Errors
    /// Returns [`WardenError::CircuitOpen`] when the service is isolated,
    /// [`WardenError::OperationTimeout`] past the deadline, or the
    /// operation's own error.
    pub async fn guard<T, F>(&self, service: &str, operation: F) -> WardenResult<T>
    where
        F: Future<Output = WardenResult<T>>,
    {
        let timeout = self.config.default_timeout;
        let bounded = async {
            match tokio::time::timeout(timeout, operation).await {
                Ok(result) => result,
                Err(_) => Err(WardenError::OperationTimeout {
                    operation: service.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            }
        };

        let result = if self.config.enable_circuit_breakers {
            self.breakers.get_or_create(service).call(bounded).await
        } else {
            bounded.await
        };

        match &result {
            Ok(_) => {
                self.record_outcome(true);
                self.failure_streaks.remove(service);
            }
            Err(e) if !e.is_circuit_open() => {
                self.record_outcome(false);
                *self.failure_streaks.entry(service.to_string()).or_insert(0) += 1;
            }
            Err(_) => {}
        }
        result
    }

    /// Pick the recovery approach for a retryable classification.
    fn select_approach(
        &self,
        classification: &ErrorClassification,
        context: &ErrorContext,
    ) -> RecoveryApproach {
        if self.config.enable_circuit_breakers {
            if let Some(operation) = context.operation() {
                let streak = {
                    let mut entry = self.failure_streaks.entry(operation.to_string()).or_insert(0);
                    *entry += 1;
                    *entry
                };
                if streak >= self.config.circuit_breaker.failure_threshold {
                    return RecoveryApproach::CircuitBreak;
                }
            }
        }

        if self.config.enable_recovery_coordination
            && classification.impact_scope >= ImpactScope::AgentCluster
        {
            return RecoveryApproach::Coordinate;
        }

        if self.config.enable_graceful_degradation {
            let (samples, percentage) = self.error_rate();
            if samples >= self.config.degradation.minimum_samples
                && percentage >= self.config.degradation.threshold_percentage
            {
                return RecoveryApproach::Degrade;
            }
        }

        RecoveryApproach::Retry
    }

    /// Route the named operation through its breaker, feeding the current
    /// failure in so repeated failures trip it.
    fn apply_circuit_break(&self, context: &ErrorContext) -> bool {
        let Some(operation) = context.operation() else {
            return false;
        };
        let breaker = self.breakers.get_or_create(operation);
        breaker.record_failure();
        info!(
            service = %operation,
            state = %breaker.state(),
            "recurring failure routed through circuit breaker"
        );
        true
    }

    /// Evaluate degradation against the manager's failure-rate metric.
    fn apply_degradation(&self) -> bool {
        let condition = DegradationCondition::new(
            ERROR_RATE_METRIC,
            ConditionOperator::Gt,
            self.config.degradation.threshold_percentage,
            self.config.degradation.check_interval,
        );
        let level = self.degradation.evaluate_degradation(&condition);
        debug!(level = %level, "degradation evaluated");
        self.degradation.is_active()
    }

    /// Locally recover the reporting agent, retrying with a growing delay.
    async fn retry_local_recovery(
        &self,
        context: &ErrorContext,
    ) -> (bool, u32, Option<Vec<AgentId>>) {
        let mut attempts = 0;
        for attempt in 1..=self.config.max_recovery_attempts.max(1) {
            attempts = attempt;
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_base_delay * (attempt - 1)).await;
            }
            self.lock_stats().recovery_attempts += 1;

            let outcome = tokio::time::timeout(
                self.config.default_timeout,
                self.recovery.recover(&context.agent_id),
            )
            .await;

            match outcome {
                Ok(Ok(())) => {
                    self.lock_stats().successful_recoveries += 1;
                    return (true, attempts, None);
                }
                Ok(Err(e)) => {
                    warn!(attempt = attempt, error = %e, "local recovery attempt failed");
                }
                Err(_) => {
                    warn!(attempt = attempt, "local recovery attempt timed out");
                }
            }
        }
        (false, attempts, None)
    }

    /// Delegate to the recovery coordinator with the affected-agent set
    /// derived from context.
    async fn coordinate(&self, context: &ErrorContext) -> (bool, u32, Option<Vec<AgentId>>) {
        let spec = self.coordinator.coordination_for(context.affected_agents());
        let report = self.coordinator.coordinate_recovery(&spec).await;
        (report.success, 1, Some(report.recovered_agents))
    }

    fn note_failure(&self, classification: &ErrorClassification) {
        self.lock_stats().record_error(classification);
        self.record_outcome(false);
    }

    /// Track an outcome and refresh the degradation error-rate metric.
    fn record_outcome(&self, success: bool) {
        let percentage = {
            let mut outcomes = self
                .outcomes
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            outcomes.push_back((Instant::now(), success));
            while let Some((at, _)) = outcomes.front() {
                if at.elapsed() > ERROR_RATE_WINDOW {
                    outcomes.pop_front();
                } else {
                    break;
                }
            }
            let failures = outcomes.iter().filter(|(_, ok)| !ok).count();
            failures as f64 / outcomes.len() as f64 * 100.0
        };
        self.degradation.record_metric(ERROR_RATE_METRIC, percentage);
    }

    /// Sample count and failure percentage over the recent outcome window.
    fn error_rate(&self) -> (usize, f64) {
        let outcomes = self
            .outcomes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let within: Vec<bool> = outcomes
            .iter()
            .filter(|(at, _)| at.elapsed() <= ERROR_RATE_WINDOW)
            .map(|(_, ok)| *ok)
            .collect();
        if within.is_empty() {
            return (0, 0.0);
        }
        let failures = within.iter().filter(|ok| !**ok).count();
        (within.len(), failures as f64 / within.len() as f64 * 100.0)
    }

    async fn write_audit(&self, context: &ErrorContext, result: &HandlingResult) {
        if !self.config.audit.log_error_details && !self.config.audit.log_recovery_actions {
            return;
        }

        let mut record = AuditRecord::new(
            context.operation().unwrap_or("handle_error"),
            context.error_id.clone(),
            context.agent_id.clone(),
        )
        .with_metadata("environment", context.environment.clone())
        .with_metadata("agent_type", context.agent_type.to_string());

        if self.config.audit.log_error_details {
            record = record.with_classification(result.classification.clone());
        }
        if self.config.audit.log_recovery_actions {
            record = record.with_outcome(result.recovery_approach, result.success);
            if let Some(recovered) = &result.recovered_agents {
                let ids: Vec<serde_json::Value> = recovered
                    .iter()
                    .map(|a| serde_json::Value::String(a.as_str().to_string()))
                    .collect();
                record = record.with_metadata("recovered_agents", serde_json::Value::Array(ids));
            }
        }

        if let Err(e) = self.audit.write(record).await {
            warn!(error = %e, "audit write failed");
        }
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, ErrorStatistics> {
        self.stats
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
