//! Error classifier
//!
//! Matches raw failure messages against the rule set and derives the full
//! [`ErrorClassification`]: severity, category, impact scope, retryability,
//! transience, and an estimated recovery time. Classification is pure and
//! side-effect free; it reads a copy-on-write rule snapshot and takes no
//! locks while matching.

use std::sync::Arc;
use tracing::debug;

use warden_types::{
    ErrorCategory, ErrorClassification, ErrorContext, ErrorType, ImpactScope, Severity,
};

use crate::rules::{ClassificationRule, RuleSet};

/// Failure types that never warrant a retry.
const NON_RETRYABLE_TYPES: &[ErrorType] = &[
    ErrorType::ValidationError,
    ErrorType::AuthorizationError,
    ErrorType::DataCorruptionError,
    ErrorType::ConfigurationError,
    ErrorType::BusinessLogicError,
];

/// Message phrases that mark a failure as non-retryable.
const NON_RETRYABLE_PHRASES: &[&str] =
    &["not found", "does not exist", "malformed", "syntax error"];

/// Failure types expected to resolve on their own.
const TRANSIENT_TYPES: &[ErrorType] = &[
    ErrorType::TimeoutError,
    ErrorType::RateLimitError,
    ErrorType::NetworkError,
    ErrorType::ResourceExhaustion,
];

/// Message phrases that mark a failure as transient.
const TRANSIENT_PHRASES: &[&str] = &["temporary", "rate limit", "busy", "overloaded", "throttle"];

/// Classifies raw failures against the shared rule set.
pub struct ErrorClassifier {
    rules: Arc<RuleSet>,
}

impl ErrorClassifier {
    /// Create a classifier over the given rule set.
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    /// Create a classifier preloaded with the default governance rules.
    pub fn with_default_rules() -> Self {
        Self::new(Arc::new(RuleSet::with_default_rules()))
    }

    /// The rule set backing this classifier.
    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    /// Classify a raw failure message.
    ///
    /// Deterministic for a given message and rule set: among matching rules
    /// the highest priority wins, ties resolving to the rule registered
    /// first. Without a rule match, type detection falls back to the coarse
    /// keyword table and severity to the keyword scan.
    pub fn classify(&self, message: &str, context: &ErrorContext) -> ErrorClassification {
        let snapshot = self.rules.snapshot();
        let matched = select_rule(&snapshot, message);
        let lower = message.to_lowercase();

        let (error_type, severity, category, confidence_score) = match matched {
            Some(rule) => {
                debug!(
                    error_id = %context.error_id,
                    rule_id = %rule.rule_id,
                    "classification rule matched"
                );
                (rule.error_type, rule.severity, rule.category, rule.confidence)
            }
            None => {
                let detected = detect_error_type(&lower);
                let error_type = detected.unwrap_or(ErrorType::SystemError);
                let severity = scan_severity_keywords(&lower).unwrap_or_else(|| match detected {
                    Some(t) => default_severity(t),
                    None => Severity::Medium,
                });
                let confidence = if detected.is_some() { 0.6 } else { 0.3 };
                (error_type, severity, default_category(error_type), confidence)
            }
        };

        let estimated = base_recovery_time_ms(error_type) as f64 * severity.recovery_multiplier();

        ErrorClassification {
            error_type,
            severity,
            category,
            confidence_score,
            is_retryable: is_retryable(error_type, &lower),
            is_transient: is_transient(error_type, &lower),
            impact_scope: derive_impact_scope(error_type, &lower),
            estimated_recovery_time_ms: estimated.round() as u64,
        }
    }
}

/// Pick the winning rule: highest priority, first-registered on ties.
fn select_rule<'a>(
    rules: &'a [ClassificationRule],
    message: &str,
) -> Option<&'a ClassificationRule> {
    let mut best: Option<&ClassificationRule> = None;
    for rule in rules.iter().filter(|r| r.matches(message)) {
        match best {
            Some(current) if rule.priority <= current.priority => {}
            _ => best = Some(rule),
        }
    }
    best
}

/// Coarse type detection for messages no rule matched.
///
/// Entries are ordered most-specific first; the first keyword hit wins.
fn detect_error_type(lower: &str) -> Option<ErrorType> {
    let table: &[(ErrorType, &[&str])] = &[
        (
            ErrorType::DataCorruptionError,
            &["corrupt", "checksum", "integrity"],
        ),
        (
            ErrorType::RateLimitError,
            &["rate limit", "throttle", "too many requests"],
        ),
        (
            ErrorType::DatabaseError,
            &["database", "sql", "connection pool"],
        ),
        (
            ErrorType::TimeoutError,
            &["timed out", "timeout", "deadline"],
        ),
        (
            ErrorType::AuthorizationError,
            &["authorization", "permission", "forbidden", "access denied"],
        ),
        (
            ErrorType::AuthenticationError,
            &["authentication", "login", "credential", "token"],
        ),
        (
            ErrorType::AgentCoordinationError,
            &["consensus", "quorum", "coordination", "leader election"],
        ),
        (
            ErrorType::NetworkError,
            &["network", "socket", "dns", "connection"],
        ),
        (
            ErrorType::ConfigurationError,
            &["configuration", "config"],
        ),
        (
            ErrorType::ValidationError,
            &["validation", "invalid", "malformed", "schema"],
        ),
        (
            ErrorType::DependencyError,
            &["dependency", "upstream", "downstream"],
        ),
        (
            ErrorType::ResourceExhaustion,
            &["out of memory", "disk full", "exhausted", "capacity"],
        ),
        (ErrorType::ProtocolError, &["protocol", "handshake"]),
        (
            ErrorType::BusinessLogicError,
            &["business rule", "policy violation"],
        ),
        (ErrorType::SystemError, &["system", "panic", "crash"]),
    ];

    for (error_type, keywords) in table {
        if keywords.iter().any(|k| lower.contains(k)) {
            return Some(*error_type);
        }
    }
    None
}

/// Severity keyword scan, in fixed priority order.
fn scan_severity_keywords(lower: &str) -> Option<Severity> {
    if lower.contains("emergency") {
        return Some(Severity::Emergency);
    }
    if lower.contains("critical") || lower.contains("fatal") {
        return Some(Severity::Critical);
    }
    if ["error", "failed", "exception", "unavailable"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return Some(Severity::High);
    }
    if ["warning", "timeout", "retry", "degraded"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return Some(Severity::Medium);
    }
    if ["info", "debug", "notice"].iter().any(|k| lower.contains(k)) {
        return Some(Severity::Low);
    }
    None
}

/// Default severity when neither a rule nor a keyword fixes one.
fn default_severity(error_type: ErrorType) -> Severity {
    match error_type {
        ErrorType::SystemError | ErrorType::DataCorruptionError => Severity::Critical,
        ErrorType::DatabaseError
        | ErrorType::NetworkError
        | ErrorType::AuthenticationError
        | ErrorType::AuthorizationError
        | ErrorType::AgentCoordinationError
        | ErrorType::ConfigurationError
        | ErrorType::DependencyError
        | ErrorType::ResourceExhaustion => Severity::High,
        ErrorType::TimeoutError
        | ErrorType::RateLimitError
        | ErrorType::BusinessLogicError
        | ErrorType::ProtocolError => Severity::Medium,
        ErrorType::ValidationError => Severity::Low,
    }
}

/// Category assigned on the no-rule-match path.
fn default_category(error_type: ErrorType) -> ErrorCategory {
    match error_type {
        ErrorType::SystemError
        | ErrorType::DatabaseError
        | ErrorType::NetworkError
        | ErrorType::DependencyError
        | ErrorType::ResourceExhaustion => ErrorCategory::Infrastructure,
        ErrorType::TimeoutError | ErrorType::RateLimitError => ErrorCategory::Performance,
        ErrorType::AuthenticationError | ErrorType::AuthorizationError => ErrorCategory::Security,
        ErrorType::AgentCoordinationError => ErrorCategory::Coordination,
        ErrorType::DataCorruptionError => ErrorCategory::Data,
        ErrorType::ConfigurationError | ErrorType::ValidationError | ErrorType::ProtocolError => {
            ErrorCategory::Application
        }
        ErrorType::BusinessLogicError => ErrorCategory::Business,
    }
}

/// Ordered impact chain; widest scopes are tested first and the first
/// matching condition wins.
fn derive_impact_scope(error_type: ErrorType, lower: &str) -> ImpactScope {
    let system_wide_phrases = ["system-wide", "system wide", "entire system", "all agents"];
    if error_type == ErrorType::SystemError
        || system_wide_phrases.iter().any(|p| lower.contains(p))
    {
        return ImpactScope::SystemWide;
    }

    if error_type == ErrorType::AgentCoordinationError
        || ["cluster", "quorum", "consensus"].iter().any(|p| lower.contains(p))
    {
        return ImpactScope::AgentCluster;
    }

    if matches!(error_type, ErrorType::DependencyError | ErrorType::ProtocolError)
        || ["upstream", "downstream", "external service", "third-party"]
            .iter()
            .any(|p| lower.contains(p))
    {
        return ImpactScope::CrossSystem;
    }

    if matches!(
        error_type,
        ErrorType::DatabaseError
            | ErrorType::NetworkError
            | ErrorType::ResourceExhaustion
            | ErrorType::ConfigurationError
            | ErrorType::DataCorruptionError
            | ErrorType::AuthenticationError
    ) {
        return ImpactScope::SingleAgent;
    }

    ImpactScope::SingleRequest
}

fn is_retryable(error_type: ErrorType, lower: &str) -> bool {
    if NON_RETRYABLE_TYPES.contains(&error_type) {
        return false;
    }
    if NON_RETRYABLE_PHRASES.iter().any(|p| lower.contains(p)) {
        return false;
    }
    // "invalid <something> format" marks unparseable input.
    if lower.contains("invalid") && lower.contains("format") {
        return false;
    }
    true
}

fn is_transient(error_type: ErrorType, lower: &str) -> bool {
    TRANSIENT_TYPES.contains(&error_type)
        || TRANSIENT_PHRASES.iter().any(|p| lower.contains(p))
}

/// Base recovery estimate per failure type, in milliseconds, before the
/// severity multiplier is applied.
fn base_recovery_time_ms(error_type: ErrorType) -> u64 {
    match error_type {
        ErrorType::ValidationError => 10_000,
        ErrorType::TimeoutError => 30_000,
        ErrorType::NetworkError
        | ErrorType::RateLimitError
        | ErrorType::ProtocolError => 60_000,
        ErrorType::DatabaseError | ErrorType::DependencyError => 120_000,
        ErrorType::AgentCoordinationError => 180_000,
        ErrorType::SystemError
        | ErrorType::AuthenticationError
        | ErrorType::AuthorizationError
        | ErrorType::BusinessLogicError
        | ErrorType::ResourceExhaustion => 300_000,
        ErrorType::ConfigurationError => 600_000,
        ErrorType::DataCorruptionError => 1_800_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_types::{AgentId, AgentType};

    fn test_context() -> ErrorContext {
        ErrorContext::new(AgentId::new("workflow-1"), AgentType::Workflow)
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = ErrorClassifier::with_default_rules();
        let ctx = test_context();

        let first = classifier.classify("Connection refused", &ctx);
        let second = classifier.classify("Connection refused", &ctx);
        assert_eq!(first, second);
    }

    #[test]
    fn test_connection_refused_classification() {
        let classifier = ErrorClassifier::with_default_rules();
        let result = classifier.classify("Connection refused", &test_context());

        assert_eq!(result.error_type, ErrorType::DatabaseError);
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.confidence_score, 0.9);
        assert!(result.is_retryable);
        // 120_000ms base at the high-severity multiplier.
        assert_eq!(result.estimated_recovery_time_ms, 240_000);
    }

    #[test]
    fn test_rate_limit_classification() {
        let classifier = ErrorClassifier::with_default_rules();
        let result = classifier.classify("Rate limit exceeded", &test_context());

        assert_eq!(result.error_type, ErrorType::RateLimitError);
        assert!(result.is_transient);
        assert!(result.is_retryable);
    }

    #[test]
    fn test_highest_priority_rule_wins() {
        let rules = Arc::new(RuleSet::new());
        rules
            .add_rule(
                ClassificationRule::new(
                    "LOW_PRIORITY",
                    r"replica lag",
                    ErrorType::DatabaseError,
                    Severity::Medium,
                    ErrorCategory::Data,
                    0.7,
                    10,
                )
                .unwrap(),
            )
            .unwrap();
        rules
            .add_rule(
                ClassificationRule::new(
                    "HIGH_PRIORITY",
                    r"replica lag",
                    ErrorType::DataCorruptionError,
                    Severity::Critical,
                    ErrorCategory::Data,
                    0.95,
                    50,
                )
                .unwrap(),
            )
            .unwrap();

        let classifier = ErrorClassifier::new(rules);
        let result = classifier.classify("replica lag detected", &test_context());
        assert_eq!(result.error_type, ErrorType::DataCorruptionError);
    }

    #[test]
    fn test_priority_ties_resolve_to_first_registered() {
        let rules = Arc::new(RuleSet::new());
        rules
            .add_rule(
                ClassificationRule::new(
                    "FIRST",
                    r"shard split",
                    ErrorType::DatabaseError,
                    Severity::High,
                    ErrorCategory::Data,
                    0.8,
                    42,
                )
                .unwrap(),
            )
            .unwrap();
        rules
            .add_rule(
                ClassificationRule::new(
                    "SECOND",
                    r"shard split",
                    ErrorType::SystemError,
                    Severity::Critical,
                    ErrorCategory::Infrastructure,
                    0.8,
                    42,
                )
                .unwrap(),
            )
            .unwrap();

        let classifier = ErrorClassifier::new(rules);
        let result = classifier.classify("shard split stalled", &test_context());
        assert_eq!(result.error_type, ErrorType::DatabaseError);
    }

    #[test]
    fn test_rule_severity_authoritative_over_keywords() {
        let classifier = ErrorClassifier::with_default_rules();
        // "failed" alone would scan as high severity; the validation rule
        // fixes low.
        let result = classifier.classify("Validation failed for field 'amount'", &test_context());
        assert_eq!(result.error_type, ErrorType::ValidationError);
        assert_eq!(result.severity, Severity::Low);
        assert!(!result.is_retryable);
    }

    #[test]
    fn test_keyword_severity_on_unmatched_message() {
        let rules = Arc::new(RuleSet::new());
        let classifier = ErrorClassifier::new(rules);

        let result = classifier.classify("emergency: ledger halted", &test_context());
        assert_eq!(result.severity, Severity::Emergency);
    }

    #[test]
    fn test_unmatched_unknown_message_defaults() {
        let rules = Arc::new(RuleSet::new());
        let classifier = ErrorClassifier::new(rules);

        let result = classifier.classify("the flux capacitor drifted", &test_context());
        assert_eq!(result.severity, Severity::Medium);
        assert_eq!(result.confidence_score, 0.3);
    }

    #[test]
    fn test_non_retryable_phrases() {
        let classifier = ErrorClassifier::with_default_rules();

        let result = classifier.classify("proposal 7 does not exist", &test_context());
        assert!(!result.is_retryable);

        let result = classifier.classify("invalid ballot format", &test_context());
        assert!(!result.is_retryable);
    }

    #[test]
    fn test_transient_phrases() {
        let classifier = ErrorClassifier::with_default_rules();
        let result = classifier.classify("backend busy, please retry", &test_context());
        assert!(result.is_transient);
    }

    #[test]
    fn test_impact_scope_chain() {
        let classifier = ErrorClassifier::with_default_rules();
        let ctx = test_context();

        let coordination = classifier.classify("Consensus not reached in round 4", &ctx);
        assert_eq!(coordination.impact_scope, ImpactScope::AgentCluster);

        let system = classifier.classify("fatal system error in scheduler", &ctx);
        assert_eq!(system.impact_scope, ImpactScope::SystemWide);

        let db = classifier.classify("Connection refused", &ctx);
        assert_eq!(db.impact_scope, ImpactScope::SingleAgent);

        let rate = classifier.classify("Rate limit exceeded", &ctx);
        assert_eq!(rate.impact_scope, ImpactScope::SingleRequest);
    }

    #[test]
    fn test_recovery_time_scales_with_severity() {
        let rules = Arc::new(RuleSet::new());
        rules
            .add_rule(
                ClassificationRule::new(
                    "CORRUPTION_EMERGENCY",
                    r"ledger corruption",
                    ErrorType::DataCorruptionError,
                    Severity::Emergency,
                    ErrorCategory::Data,
                    0.99,
                    500,
                )
                .unwrap(),
            )
            .unwrap();

        let classifier = ErrorClassifier::new(rules);
        let result = classifier.classify("ledger corruption detected", &test_context());
        // 1_800_000ms base at the emergency multiplier.
        assert_eq!(result.estimated_recovery_time_ms, 9_000_000);
    }
}
