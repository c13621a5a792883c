//! # Warden Types - Core Type Definitions
//!
//! Shared vocabulary for the Warden governance error-handling framework:
//! strongly-typed identifiers, the failure taxonomy, error contexts,
//! classification results, degradation state, and recovery coordination
//! specifications.
//!
//! These types carry no behavior beyond construction and small accessors;
//! all decision logic lives in `warden-resilience`.

pub mod classification;
pub mod context;
pub mod coordination;
pub mod degradation;
pub mod ids;
pub mod taxonomy;

// Re-export main types
pub use classification::{ErrorClassification, HandlingResult};
pub use context::{ErrorContext, AFFECTED_AGENTS_KEY, OPERATION_KEY};
pub use coordination::{
    Prerequisite, RecoveryCoordination, RecoveryReport, RollingRecoveryReport,
};
pub use degradation::{
    ConditionOperator, DegradationCondition, DegradationOverrides, DegradationState,
};
pub use ids::{AgentId, CoordinationId, ErrorId};
pub use taxonomy::{
    AgentType, DegradationLevel, ErrorCategory, ErrorType, ImpactScope, RecoveryApproach,
    RecoveryStrategy, Severity,
};
