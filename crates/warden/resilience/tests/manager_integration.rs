//! End-to-end scenarios for the error handling manager.
//!
//! These tests exercise the full flow the governance agents see: raw
//! failure in, classification, recovery approach selection, coordinated
//! recovery, and audit records out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use warden_resilience::{
    AgentRecovery, AuditFilter, AuditSink, ClassificationRule, ErrorHandlingConfig,
    ErrorHandlingManager, MemoryAuditSink, NoopAgentRecovery, WardenError, WardenResult,
};
use warden_types::{
    AgentId, AgentType, DegradationLevel, DegradationOverrides, ErrorCategory, ErrorContext,
    ErrorType, RecoveryApproach, Severity,
};

fn fast_config() -> ErrorHandlingConfig {
    let mut config = ErrorHandlingConfig::default();
    config.retry_base_delay = Duration::from_millis(1);
    config.default_timeout = Duration::from_millis(200);
    config.circuit_breaker.failure_threshold = 3;
    config.circuit_breaker.error_threshold_percentage = 100.0;
    config.circuit_breaker.minimum_throughput = 1;
    config.circuit_breaker.recovery_timeout = Duration::from_millis(100);
    config
}

fn context_for(agent: &str, agent_type: AgentType) -> ErrorContext {
    ErrorContext::new(AgentId::new(agent), agent_type).with_environment("staging")
}

#[tokio::test]
async fn handle_error_writes_audit_trail() {
    let sink = Arc::new(MemoryAuditSink::new());
    let manager = ErrorHandlingManager::with_collaborators(
        fast_config(),
        sink.clone(),
        Arc::new(NoopAgentRecovery),
    );

    let ctx = context_for("workflow-3", AgentType::Workflow).with_operation("proposal_submit");
    let result = manager.handle_error("Rate limit exceeded", &ctx).await;

    assert!(result.success);
    assert_eq!(result.recovery_approach, RecoveryApproach::Retry);

    let records = sink
        .query(&AuditFilter::for_agent(AgentId::new("workflow-3")).with_operation("proposal_submit"))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.error_id, result.error_id);
    assert_eq!(
        record.classification.as_ref().map(|c| c.error_type),
        Some(ErrorType::RateLimitError)
    );
    assert_eq!(record.recovery_approach, Some(RecoveryApproach::Retry));
    assert!(record.success);
}

#[tokio::test]
async fn breaker_lifecycle_through_guarded_calls() {
    let manager = ErrorHandlingManager::new(fast_config());

    for _ in 0..3 {
        let result = manager
            .guard("consensus_vote", async {
                Err::<(), _>(WardenError::Operation("vote rejected".into()))
            })
            .await;
        assert!(matches!(result, Err(WardenError::Operation(_))));
    }

    // The dependency is now isolated: callers get the distinct rejection,
    // not the original failure.
    let rejected = manager
        .guard("consensus_vote", async { Ok::<_, WardenError>(()) })
        .await;
    assert!(matches!(rejected, Err(WardenError::CircuitOpen { .. })));

    // After the cooldown the breaker probes and closes again.
    tokio::time::sleep(Duration::from_millis(150)).await;
    for _ in 0..3 {
        let _ = manager
            .guard("consensus_vote", async { Ok::<_, WardenError>(()) })
            .await;
    }
    let healthy = manager
        .guard("consensus_vote", async { Ok::<_, WardenError>(()) })
        .await;
    assert!(healthy.is_ok());
}

#[tokio::test]
async fn cluster_failure_coordinates_recovery_of_affected_agents() {
    struct RecordingRecovery {
        recovered: std::sync::Mutex<Vec<AgentId>>,
    }

    #[async_trait]
    impl AgentRecovery for RecordingRecovery {
        async fn recover(&self, agent_id: &AgentId) -> WardenResult<()> {
            self.recovered.lock().unwrap().push(agent_id.clone());
            Ok(())
        }
    }

    let executor = Arc::new(RecordingRecovery {
        recovered: std::sync::Mutex::new(Vec::new()),
    });
    let manager = ErrorHandlingManager::with_collaborators(
        fast_config(),
        Arc::new(MemoryAuditSink::new()),
        executor.clone(),
    );

    let affected = vec![
        AgentId::new("consensus-1"),
        AgentId::new("consensus-2"),
        AgentId::new("consensus-3"),
    ];
    let ctx = context_for("consensus-1", AgentType::Consensus).with_affected_agents(&affected);

    let result = manager
        .handle_error("Consensus not reached: quorum lost", &ctx)
        .await;

    assert!(result.success);
    assert_eq!(result.recovery_approach, RecoveryApproach::Coordinate);
    assert_eq!(result.recovered_agents.as_ref().map(Vec::len), Some(3));
    assert_eq!(executor.recovered.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn degradation_escalates_and_operator_overrides() {
    let mut config = fast_config();
    config.degradation.threshold_percentage = 30.0;
    config.degradation.minimum_samples = 3;
    config.enable_recovery_coordination = false;
    let manager = ErrorHandlingManager::new(config);

    // Sustained failures push the error rate over the threshold.
    for _ in 0..3 {
        manager
            .handle_error("Rate limit exceeded", &context_for("workflow-1", AgentType::Workflow))
            .await;
    }
    assert!(manager.degradation().is_active());
    assert_eq!(manager.degradation().level(), DegradationLevel::Minimal);

    // Operators can override with explicit behavioral changes.
    let mut disabled = std::collections::HashSet::new();
    disabled.insert("speculative_execution".to_string());
    manager.degradation().set_degradation_level(
        DegradationLevel::Severe,
        "incident 4711",
        DegradationOverrides {
            disabled_features: disabled,
            use_cache_only: true,
            max_cache_age: Some(Duration::from_secs(120)),
        },
    );

    let state = manager.degradation().current_state();
    assert_eq!(state.level, DegradationLevel::Severe);
    assert!(state.use_cache_only);
    assert!(state.is_feature_disabled("speculative_execution"));

    manager.degradation().deactivate_degradation("incident resolved");
    assert_eq!(manager.degradation().level(), DegradationLevel::None);
    assert!(!manager.degradation().is_active());
}

#[tokio::test]
async fn runtime_rule_changes_take_effect_immediately() {
    let manager = ErrorHandlingManager::new(fast_config());
    let ctx = context_for("validation-1", AgentType::Validation);

    // Unknown message falls through to the defaults.
    let before = manager.handle_error("ballot box drift detected", &ctx).await;
    assert!(before.classification.confidence_score < 0.9);

    manager
        .classifier()
        .rules()
        .add_rule(
            ClassificationRule::new(
                "BALLOT_DRIFT",
                r"ballot box drift",
                ErrorType::DataCorruptionError,
                Severity::Critical,
                ErrorCategory::Data,
                0.97,
                300,
            )
            .unwrap(),
        )
        .unwrap();

    let after = manager.handle_error("ballot box drift detected", &ctx).await;
    assert_eq!(after.classification.error_type, ErrorType::DataCorruptionError);
    assert_eq!(after.classification.confidence_score, 0.97);
    // Data corruption is never retried.
    assert_eq!(after.recovery_approach, RecoveryApproach::None);

    manager.classifier().rules().remove_rule("BALLOT_DRIFT").unwrap();
}

#[tokio::test]
async fn non_retryable_failures_bypass_recovery_in_every_preset() {
    let presets = [
        ErrorHandlingConfig::development(),
        ErrorHandlingConfig::production(),
        ErrorHandlingConfig::high_availability(),
        ErrorHandlingConfig::performance_optimized(),
        ErrorHandlingConfig::real_time(),
        ErrorHandlingConfig::batch_processing(),
        ErrorHandlingConfig::security_focused(),
    ];

    for config in presets {
        let manager = ErrorHandlingManager::new(config);
        let result = manager
            .handle_error(
                "Validation failed: malformed payload",
                &context_for("validation-9", AgentType::Validation),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.recovery_approach, RecoveryApproach::None);
        assert_eq!(result.attempts, 0);
    }
}

#[tokio::test]
async fn failed_local_recovery_exhausts_attempts() {
    struct AlwaysFailing {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl AgentRecovery for AlwaysFailing {
        async fn recover(&self, agent_id: &AgentId) -> WardenResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(WardenError::RecoveryFailed {
                agent_id: agent_id.clone(),
                reason: "agent unresponsive".to_string(),
            })
        }
    }

    let executor = Arc::new(AlwaysFailing {
        attempts: AtomicUsize::new(0),
    });
    let mut config = fast_config();
    config.max_recovery_attempts = 3;
    config.enable_recovery_coordination = false;
    let manager = ErrorHandlingManager::with_collaborators(
        config,
        Arc::new(MemoryAuditSink::new()),
        executor.clone(),
    );

    let result = manager
        .handle_error(
            "Rate limit exceeded",
            &context_for("integration-2", AgentType::Integration),
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 3);
    assert_eq!(executor.attempts.load(Ordering::SeqCst), 3);

    let stats = manager.error_stats();
    assert_eq!(stats.recovery_attempts, 3);
    assert_eq!(stats.successful_recoveries, 0);
}
