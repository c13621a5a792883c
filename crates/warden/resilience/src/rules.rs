//! Classification rule set
//!
//! Rules map message patterns to taxonomy entries. The set is data, not
//! code: rules can be added and removed at runtime without restart. Readers
//! take a copy-on-write snapshot, so classification never blocks on writers.

use regex::{Regex, RegexBuilder};
use std::sync::{Arc, RwLock};
use tracing::debug;

use warden_types::{ErrorCategory, ErrorType, Severity};

use crate::error::{WardenError, WardenResult};

/// A single pattern-to-classification mapping.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    /// Unique rule identifier.
    pub rule_id: String,

    /// Pattern matched case-insensitively against the error message.
    pub pattern: Regex,

    /// Failure type assigned on match.
    pub error_type: ErrorType,

    /// Severity assigned on match; authoritative over keyword scanning.
    pub severity: Severity,

    /// Category assigned on match.
    pub category: ErrorCategory,

    /// Confidence in the mapping, 0.0 to 1.0.
    pub confidence: f64,

    /// Selection priority; among matching rules the highest wins, ties
    /// resolve to the rule registered first.
    pub priority: i32,
}

impl ClassificationRule {
    /// Compile a rule from a pattern source.
    ///
    /// # Errors
    /// Returns [`WardenError::InvalidRule`] when the pattern does not
    /// compile or the confidence is outside 0..=1.
    pub fn new(
        rule_id: impl Into<String>,
        pattern: &str,
        error_type: ErrorType,
        severity: Severity,
        category: ErrorCategory,
        confidence: f64,
        priority: i32,
    ) -> WardenResult<Self> {
        let rule_id = rule_id.into();

        if !(0.0..=1.0).contains(&confidence) {
            return Err(WardenError::InvalidRule {
                rule_id,
                reason: format!("confidence {} outside 0..=1", confidence),
            });
        }

        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| WardenError::InvalidRule {
                rule_id: rule_id.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            rule_id,
            pattern,
            error_type,
            severity,
            category,
            confidence,
            priority,
        })
    }

    /// Whether this rule matches the given message.
    pub fn matches(&self, message: &str) -> bool {
        self.pattern.is_match(message)
    }
}

/// Ordered, runtime-mutable collection of classification rules.
///
/// Writers swap a fresh `Arc<Vec<_>>` under the lock; readers clone the
/// current snapshot and match against it lock-free.
pub struct RuleSet {
    rules: RwLock<Arc<Vec<ClassificationRule>>>,
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Create a rule set preloaded with the default governance rules.
    pub fn with_default_rules() -> Self {
        let set = Self::new();
        for rule in default_rules() {
            set.push(rule);
        }
        set
    }

    /// Current snapshot of the rules, in registration order.
    pub fn snapshot(&self) -> Arc<Vec<ClassificationRule>> {
        self.rules
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the set holds no rules.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a rule at the end of the set.
    ///
    /// # Errors
    /// Returns [`WardenError::InvalidRule`] when a rule with the same ID is
    /// already registered.
    pub fn add_rule(&self, rule: ClassificationRule) -> WardenResult<()> {
        let mut guard = self
            .rules
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if guard.iter().any(|r| r.rule_id == rule.rule_id) {
            return Err(WardenError::InvalidRule {
                rule_id: rule.rule_id,
                reason: "rule id already registered".to_string(),
            });
        }

        debug!(rule_id = %rule.rule_id, "registering classification rule");
        let mut next = guard.as_ref().clone();
        next.push(rule);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Remove a rule by ID.
    ///
    /// # Errors
    /// Returns [`WardenError::RuleNotFound`] when no rule has the given ID.
    pub fn remove_rule(&self, rule_id: &str) -> WardenResult<()> {
        let mut guard = self
            .rules
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let before = guard.len();
        let next: Vec<ClassificationRule> = guard
            .iter()
            .filter(|r| r.rule_id != rule_id)
            .cloned()
            .collect();

        if next.len() == before {
            return Err(WardenError::RuleNotFound(rule_id.to_string()));
        }

        debug!(rule_id = %rule_id, "removing classification rule");
        *guard = Arc::new(next);
        Ok(())
    }

    fn push(&self, rule: ClassificationRule) {
        let mut guard = self
            .rules
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut next = guard.as_ref().clone();
        next.push(rule);
        *guard = Arc::new(next);
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

/// The default governance rule table.
///
/// Patterns are matched case-insensitively. Priorities separate specific
/// signatures (corruption, panics) from generic ones (timeouts).
fn default_rules() -> Vec<ClassificationRule> {
    let table: &[(&str, &str, ErrorType, Severity, ErrorCategory, f64, i32)] = &[
        (
            "SYSTEM_PANIC",
            r"(kernel|system) panic|fatal (system )?error|segmentation fault",
            ErrorType::SystemError,
            Severity::Critical,
            ErrorCategory::Infrastructure,
            0.95,
            120,
        ),
        (
            "DATA_CORRUPTION",
            r"(checksum|integrity) (mismatch|violation|check failed)|corrupt(ed)? (data|record|index|page)",
            ErrorType::DataCorruptionError,
            Severity::Critical,
            ErrorCategory::Data,
            0.95,
            110,
        ),
        (
            "DB_CONNECTION_FAILED",
            r"connection (refused|reset|aborted|closed)|could not connect|connection pool (exhausted|timed out)",
            ErrorType::DatabaseError,
            Severity::High,
            ErrorCategory::Infrastructure,
            0.9,
            100,
        ),
        (
            "RESOURCE_EXHAUSTED",
            r"out of (memory|disk( space)?|file descriptors)|resource exhausted|no space left|quota exceeded",
            ErrorType::ResourceExhaustion,
            Severity::Critical,
            ErrorCategory::Infrastructure,
            0.9,
            100,
        ),
        (
            "NETWORK_UNREACHABLE",
            r"network (is )?unreachable|dns (lookup|resolution) failed|no route to host|broken pipe",
            ErrorType::NetworkError,
            Severity::High,
            ErrorCategory::Infrastructure,
            0.9,
            95,
        ),
        (
            "DB_QUERY_FAILED",
            r"(query|transaction) (failed|aborted|rolled back)|deadlock detected|duplicate key",
            ErrorType::DatabaseError,
            Severity::High,
            ErrorCategory::Data,
            0.85,
            90,
        ),
        (
            "AUTH_FAILED",
            r"(authentication|login) failed|invalid (credentials|token|signature)|token expired",
            ErrorType::AuthenticationError,
            Severity::High,
            ErrorCategory::Security,
            0.9,
            90,
        ),
        (
            "ACCESS_DENIED",
            r"(access|permission) denied|not authorized|forbidden|insufficient privileges",
            ErrorType::AuthorizationError,
            Severity::High,
            ErrorCategory::Security,
            0.9,
            90,
        ),
        (
            "CONSENSUS_FAILED",
            r"consensus (failed|not reached|timeout)|quorum (lost|not available)|leader election failed|view change",
            ErrorType::AgentCoordinationError,
            Severity::High,
            ErrorCategory::Coordination,
            0.85,
            90,
        ),
        (
            "RATE_LIMITED",
            r"rate limit(ed)?( exceeded)?|too many requests|request throttled",
            ErrorType::RateLimitError,
            Severity::Medium,
            ErrorCategory::Performance,
            0.9,
            85,
        ),
        (
            "CONFIG_INVALID",
            r"(missing|invalid|unknown) (configuration|config) (key|value|option|file)|configuration error",
            ErrorType::ConfigurationError,
            Severity::High,
            ErrorCategory::Application,
            0.85,
            85,
        ),
        (
            "VALIDATION_FAILED",
            r"validation (failed|error)|(invalid|malformed) (input|payload|request|argument)|schema (mismatch|violation)",
            ErrorType::ValidationError,
            Severity::Low,
            ErrorCategory::Application,
            0.9,
            85,
        ),
        (
            "DEPENDENCY_UNAVAILABLE",
            r"(service|dependency|upstream|backend) unavailable|bad gateway|service is down",
            ErrorType::DependencyError,
            Severity::High,
            ErrorCategory::Infrastructure,
            0.85,
            80,
        ),
        (
            "OPERATION_TIMEOUT",
            r"timed out|timeout|deadline exceeded",
            ErrorType::TimeoutError,
            Severity::Medium,
            ErrorCategory::Performance,
            0.85,
            80,
        ),
        (
            "PROTOCOL_VIOLATION",
            r"protocol (error|violation|mismatch)|unexpected (frame|message type|response)|handshake failed",
            ErrorType::ProtocolError,
            Severity::Medium,
            ErrorCategory::Application,
            0.8,
            75,
        ),
    ];

    table
        .iter()
        .map(|(id, pattern, error_type, severity, category, confidence, priority)| {
            // Table entries are static and known-good; a failure here is a
            // programming error caught by tests.
            ClassificationRule::new(
                *id, pattern, *error_type, *severity, *category, *confidence, *priority,
            )
            .unwrap_or_else(|e| panic!("default rule table invalid: {}", e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_compile() {
        let set = RuleSet::with_default_rules();
        assert!(set.len() >= 15);
    }

    #[test]
    fn test_connection_refused_matches_db_rule() {
        let set = RuleSet::with_default_rules();
        let snapshot = set.snapshot();
        let matched: Vec<&str> = snapshot
            .iter()
            .filter(|r| r.matches("Connection refused"))
            .map(|r| r.rule_id.as_str())
            .collect();
        assert_eq!(matched, vec!["DB_CONNECTION_FAILED"]);
    }

    #[test]
    fn test_rule_matching_is_case_insensitive() {
        let set = RuleSet::with_default_rules();
        let snapshot = set.snapshot();
        assert!(snapshot
            .iter()
            .any(|r| r.rule_id == "RATE_LIMITED" && r.matches("RATE LIMIT EXCEEDED")));
    }

    #[test]
    fn test_add_and_remove_rule() {
        let set = RuleSet::new();
        let rule = ClassificationRule::new(
            "CUSTOM",
            r"ledger divergence",
            ErrorType::DataCorruptionError,
            Severity::Critical,
            ErrorCategory::Data,
            0.9,
            200,
        )
        .unwrap();

        set.add_rule(rule).unwrap();
        assert_eq!(set.len(), 1);

        // Duplicate ids are rejected.
        let dup = ClassificationRule::new(
            "CUSTOM",
            r"other",
            ErrorType::SystemError,
            Severity::Low,
            ErrorCategory::Application,
            0.5,
            1,
        )
        .unwrap();
        assert!(set.add_rule(dup).is_err());

        set.remove_rule("CUSTOM").unwrap();
        assert!(set.is_empty());
        assert!(set.remove_rule("CUSTOM").is_err());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = ClassificationRule::new(
            "BROKEN",
            r"unclosed (group",
            ErrorType::SystemError,
            Severity::Low,
            ErrorCategory::Application,
            0.5,
            1,
        );
        assert!(matches!(result, Err(WardenError::InvalidRule { .. })));
    }

    #[test]
    fn test_snapshot_isolated_from_later_writes() {
        let set = RuleSet::with_default_rules();
        let snapshot = set.snapshot();
        let before = snapshot.len();

        set.remove_rule("OPERATION_TIMEOUT").unwrap();
        assert_eq!(snapshot.len(), before);
        assert_eq!(set.len(), before - 1);
    }
}
