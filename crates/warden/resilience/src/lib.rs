//! # Warden Resilience - Governance Error Handling for Agent Fleets
//!
//! This crate is the core of the Warden framework: it classifies failures
//! reported by governance agents, trips circuit breakers around unreliable
//! operations, degrades service gracefully under sustained stress, and
//! coordinates recovery across a fleet of cooperating agents.
//!
//! ## Key Components
//!
//! - [`ErrorClassifier`]: rule-driven failure classification
//! - [`RuleSet`]: runtime-mutable pattern-to-classification table
//! - [`CircuitBreaker`]: per-operation isolation of failing dependencies
//! - [`DegradationManager`]: graded service degradation with auto-recovery
//! - [`RecoveryCoordinator`]: batched multi-agent recovery episodes
//! - [`ErrorHandlingManager`]: the facade tying the above together
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_resilience::{
//!     ErrorHandlingConfig, ErrorHandlingManager, MemoryAuditSink, NoopAgentRecovery,
//! };
//! use warden_types::{AgentId, AgentType, ErrorContext};
//!
//! # async fn example() {
//! let manager = ErrorHandlingManager::with_collaborators(
//!     ErrorHandlingConfig::high_availability(),
//!     Arc::new(MemoryAuditSink::new()),
//!     Arc::new(NoopAgentRecovery),
//! );
//! manager.start_background_tasks();
//!
//! let context = ErrorContext::new(AgentId::new("consensus-1"), AgentType::Consensus)
//!     .with_operation("ledger_write");
//! let result = manager.handle_error("Connection refused", &context).await;
//! println!("handled: {} via {}", result.success, result.recovery_approach);
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! The framework is a library invoked from many concurrent tasks of the
//! hosting agent processes; it owns no scheduler. Breaker transitions are
//! linearizable per service name, classification reads a copy-on-write
//! rule snapshot without locking, and the degradation auto-recovery loop
//! is a cancellable background task stopped on shutdown.
//!
//! ## Configuration Presets
//!
//! [`ErrorHandlingConfig`] ships named factories tuned per environment:
//! `development`, `production`, `high_availability`,
//! `performance_optimized`, `real_time`, `batch_processing`, and
//! `security_focused`.

pub mod audit;
pub mod breaker;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod degradation;
pub mod error;
pub mod manager;
pub mod rules;

// Re-export main types
pub use audit::{AuditFilter, AuditRecord, AuditSink, MemoryAuditSink, NoopAuditSink};
pub use breaker::{BreakerStats, CircuitBreaker, CircuitBreakerRegistry, CircuitState};
pub use classifier::ErrorClassifier;
pub use config::{
    AuditConfig, CircuitBreakerConfig, CoordinationConfig, DegradationConfig,
    ErrorHandlingConfig,
};
pub use coordinator::{
    AgentRecovery, FailingAgentRecovery, NoopAgentRecovery, RecoveryCoordinator,
};
pub use degradation::DegradationManager;
pub use error::{WardenError, WardenResult};
pub use manager::{ErrorHandlingManager, ErrorStatistics, ERROR_RATE_METRIC};
pub use rules::{ClassificationRule, RuleSet};
