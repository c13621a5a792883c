//! Error taxonomy shared across the framework
//!
//! Defines the failure type hierarchy, severity grades, impact scopes, and
//! degradation levels used by classification and recovery decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure types recognized by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Failure of the host system itself.
    SystemError,
    /// Database connectivity or query failure.
    DatabaseError,
    /// Network transport failure.
    NetworkError,
    /// Operation exceeded its deadline.
    TimeoutError,
    /// Identity could not be established.
    AuthenticationError,
    /// Identity established but access refused.
    AuthorizationError,
    /// Caller exceeded a rate limit.
    RateLimitError,
    /// Consensus, quorum, or inter-agent protocol failure.
    AgentCoordinationError,
    /// Stored data failed an integrity check.
    DataCorruptionError,
    /// Invalid or missing configuration.
    ConfigurationError,
    /// Domain rule violated by an otherwise well-formed request.
    BusinessLogicError,
    /// Malformed or out-of-contract input.
    ValidationError,
    /// A dependency outside the agent fleet failed.
    DependencyError,
    /// Memory, disk, connections, or quota exhausted.
    ResourceExhaustion,
    /// Wire or framing contract violated.
    ProtocolError,
}

impl ErrorType {
    /// All taxonomy members, in declaration order.
    pub const ALL: [ErrorType; 15] = [
        ErrorType::SystemError,
        ErrorType::DatabaseError,
        ErrorType::NetworkError,
        ErrorType::TimeoutError,
        ErrorType::AuthenticationError,
        ErrorType::AuthorizationError,
        ErrorType::RateLimitError,
        ErrorType::AgentCoordinationError,
        ErrorType::DataCorruptionError,
        ErrorType::ConfigurationError,
        ErrorType::BusinessLogicError,
        ErrorType::ValidationError,
        ErrorType::DependencyError,
        ErrorType::ResourceExhaustion,
        ErrorType::ProtocolError,
    ];
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorType::SystemError => "system_error",
            ErrorType::DatabaseError => "database_error",
            ErrorType::NetworkError => "network_error",
            ErrorType::TimeoutError => "timeout_error",
            ErrorType::AuthenticationError => "authentication_error",
            ErrorType::AuthorizationError => "authorization_error",
            ErrorType::RateLimitError => "rate_limit_error",
            ErrorType::AgentCoordinationError => "agent_coordination_error",
            ErrorType::DataCorruptionError => "data_corruption_error",
            ErrorType::ConfigurationError => "configuration_error",
            ErrorType::BusinessLogicError => "business_logic_error",
            ErrorType::ValidationError => "validation_error",
            ErrorType::DependencyError => "dependency_error",
            ErrorType::ResourceExhaustion => "resource_exhaustion",
            ErrorType::ProtocolError => "protocol_error",
        };
        write!(f, "{}", name)
    }
}

/// Severity grades, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational, no immediate action required.
    Low,
    /// Requires attention but not urgent.
    Medium,
    /// Requires immediate attention.
    High,
    /// System stability at risk.
    Critical,
    /// Active incident, all hands.
    Emergency,
}

impl Severity {
    /// Multiplier applied to per-type base recovery times.
    pub fn recovery_multiplier(&self) -> f64 {
        match self {
            Severity::Low => 0.5,
            Severity::Medium => 1.0,
            Severity::High => 2.0,
            Severity::Critical => 3.0,
            Severity::Emergency => 5.0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Emergency => "emergency",
        };
        write!(f, "{}", name)
    }
}

/// Broad functional category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Hosts, networks, databases, storage.
    Infrastructure,
    /// Application-level defects and misconfiguration surfaces.
    Application,
    /// Data integrity and consistency.
    Data,
    /// Authentication, authorization, audit.
    Security,
    /// Latency, throughput, rate limiting.
    Performance,
    /// Multi-agent consensus and orchestration.
    Coordination,
    /// Domain rules and business invariants.
    Business,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Infrastructure => "infrastructure",
            ErrorCategory::Application => "application",
            ErrorCategory::Data => "data",
            ErrorCategory::Security => "security",
            ErrorCategory::Performance => "performance",
            ErrorCategory::Coordination => "coordination",
            ErrorCategory::Business => "business",
        };
        write!(f, "{}", name)
    }
}

/// Blast radius of a failure, ordered from narrowest to widest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ImpactScope {
    /// A single request failed; the agent is otherwise healthy.
    SingleRequest,
    /// One agent is affected.
    SingleAgent,
    /// A cluster of cooperating agents is affected.
    AgentCluster,
    /// The failure crosses into external systems.
    CrossSystem,
    /// The whole deployment is affected.
    SystemWide,
}

impl fmt::Display for ImpactScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImpactScope::SingleRequest => "single_request",
            ImpactScope::SingleAgent => "single_agent",
            ImpactScope::AgentCluster => "agent_cluster",
            ImpactScope::CrossSystem => "cross_system",
            ImpactScope::SystemWide => "system_wide",
        };
        write!(f, "{}", name)
    }
}

/// Graded degradation operating modes, ordered from none to emergency.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DegradationLevel {
    /// Full functionality.
    None,
    /// Non-essential features disabled.
    Minimal,
    /// Reduced functionality, cached responses preferred.
    Moderate,
    /// Essential operations only.
    Severe,
    /// Survival mode, cache-only responses.
    Emergency,
}

impl DegradationLevel {
    /// The next level up, saturating at `Emergency`.
    pub fn step_up(&self) -> DegradationLevel {
        match self {
            DegradationLevel::None => DegradationLevel::Minimal,
            DegradationLevel::Minimal => DegradationLevel::Moderate,
            DegradationLevel::Moderate => DegradationLevel::Severe,
            DegradationLevel::Severe | DegradationLevel::Emergency => DegradationLevel::Emergency,
        }
    }

    /// The next level down, saturating at `None`.
    pub fn step_down(&self) -> DegradationLevel {
        match self {
            DegradationLevel::None | DegradationLevel::Minimal => DegradationLevel::None,
            DegradationLevel::Moderate => DegradationLevel::Minimal,
            DegradationLevel::Severe => DegradationLevel::Moderate,
            DegradationLevel::Emergency => DegradationLevel::Severe,
        }
    }
}

impl fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DegradationLevel::None => "none",
            DegradationLevel::Minimal => "minimal",
            DegradationLevel::Moderate => "moderate",
            DegradationLevel::Severe => "severe",
            DegradationLevel::Emergency => "emergency",
        };
        write!(f, "{}", name)
    }
}

/// The approach the manager took to recover from a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryApproach {
    /// No recovery attempted (non-retryable failure).
    None,
    /// Local retry with growing backoff.
    Retry,
    /// Calls to the failing dependency were isolated behind a breaker.
    CircuitBreak,
    /// Service level was degraded.
    Degrade,
    /// Multi-agent recovery coordination ran.
    Coordinate,
}

impl fmt::Display for RecoveryApproach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryApproach::None => "none",
            RecoveryApproach::Retry => "retry",
            RecoveryApproach::CircuitBreak => "circuit_break",
            RecoveryApproach::Degrade => "degrade",
            RecoveryApproach::Coordinate => "coordinate",
        };
        write!(f, "{}", name)
    }
}

/// How agents are sequenced during coordinated recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Fixed-size batches with pacing delays between them.
    RollingRestart,
    /// All agents as fast as concurrency allows.
    Immediate,
    /// Concurrent batches bounded by `max_concurrent_recoveries`.
    Staged,
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryStrategy::RollingRestart => "rolling_restart",
            RecoveryStrategy::Immediate => "immediate",
            RecoveryStrategy::Staged => "staged",
        };
        write!(f, "{}", name)
    }
}

/// Role of a governance agent within the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Drives consensus rounds across the fleet.
    Consensus,
    /// Executes governance workflows.
    Workflow,
    /// Validates proposals and submissions.
    Validation,
    /// Bridges external systems.
    Integration,
    /// Any other role, named by the deployment.
    Custom(String),
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentType::Consensus => write!(f, "consensus"),
            AgentType::Workflow => write!(f, "workflow"),
            AgentType::Validation => write!(f, "validation"),
            AgentType::Integration => write!(f, "integration"),
            AgentType::Custom(name) => write!(f, "{}", name),
        }
    }
}
