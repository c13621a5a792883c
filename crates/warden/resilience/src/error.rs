//! Error types for the warden-resilience crate
//!
//! Callers of the framework never see a raw, unclassified failure: breaker
//! rejections surface as the distinct [`WardenError::CircuitOpen`] variant,
//! and everything else is wrapped in a typed variant.

use thiserror::Error;
use warden_types::AgentId;

/// Errors produced by the error-handling framework itself.
#[derive(Debug, Error)]
pub enum WardenError {
    /// The circuit for a guarded operation is open; the dependency is
    /// currently isolated rather than failing.
    #[error("circuit open for service {service}")]
    CircuitOpen {
        /// Guarded operation name.
        service: String,
    },

    /// A bounded operation exceeded its deadline.
    #[error("operation {operation} timed out after {timeout_ms}ms")]
    OperationTimeout {
        operation: String,
        timeout_ms: u64,
    },

    /// A coordination prerequisite failed or timed out.
    #[error("prerequisite {kind} failed: {reason}")]
    PrerequisiteFailed { kind: String, reason: String },

    /// Recovery of a single agent failed.
    #[error("recovery failed for {agent_id}: {reason}")]
    RecoveryFailed { agent_id: AgentId, reason: String },

    /// A classification rule could not be compiled or registered.
    #[error("invalid classification rule {rule_id}: {reason}")]
    InvalidRule { rule_id: String, reason: String },

    /// The named classification rule does not exist.
    #[error("classification rule not found: {0}")]
    RuleNotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The injected audit sink rejected a record or query.
    #[error("audit sink error: {0}")]
    Audit(String),

    /// A wrapped operation failed with the given message.
    #[error("operation failed: {0}")]
    Operation(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WardenError {
    /// Whether this error is the breaker's rejection rather than a failure
    /// of the wrapped operation.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, WardenError::CircuitOpen { .. })
    }
}

/// Result type for framework operations.
pub type WardenResult<T> = Result<T, WardenError>;
