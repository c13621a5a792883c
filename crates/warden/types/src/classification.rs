//! Classification results and handling outcomes

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, ErrorId};
use crate::taxonomy::{ErrorCategory, ErrorType, ImpactScope, RecoveryApproach, Severity};

/// Result of classifying a raw failure.
///
/// Produced per call; not persisted beyond the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClassification {
    /// Failure type from the taxonomy.
    pub error_type: ErrorType,

    /// Severity grade.
    pub severity: Severity,

    /// Functional category.
    pub category: ErrorCategory,

    /// Confidence in the classification, 0.0 to 1.0.
    pub confidence_score: f64,

    /// Whether retrying the failed operation can succeed.
    pub is_retryable: bool,

    /// Whether the failure is expected to resolve on its own.
    pub is_transient: bool,

    /// Blast radius of the failure.
    pub impact_scope: ImpactScope,

    /// Estimated time to recover, in milliseconds.
    pub estimated_recovery_time_ms: u64,
}

/// Outcome of one `handle_error` invocation, returned synchronously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlingResult {
    /// Whether the chosen recovery approach succeeded.
    pub success: bool,

    /// Classification of the handled failure.
    pub classification: ErrorClassification,

    /// Approach the manager took.
    pub recovery_approach: RecoveryApproach,

    /// Wall-clock duration of handling, in milliseconds.
    pub duration_ms: u64,

    /// Agents recovered during coordination, when coordination ran.
    pub recovered_agents: Option<Vec<AgentId>>,

    /// Recovery attempts consumed.
    pub attempts: u32,

    /// The occurrence this result belongs to.
    pub error_id: ErrorId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_serde_roundtrip() {
        let classification = ErrorClassification {
            error_type: ErrorType::DatabaseError,
            severity: Severity::High,
            category: ErrorCategory::Infrastructure,
            confidence_score: 0.9,
            is_retryable: true,
            is_transient: false,
            impact_scope: ImpactScope::SingleAgent,
            estimated_recovery_time_ms: 240_000,
        };

        let json = serde_json::to_string(&classification).unwrap();
        let back: ErrorClassification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, classification);
    }
}
