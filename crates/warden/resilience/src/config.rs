//! Framework configuration
//!
//! Defines configuration for classification, circuit breaking, degradation,
//! recovery coordination, and audit behavior, plus named environment presets.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use warden_types::DegradationLevel;

/// Top-level configuration for the error-handling framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    /// Route recurring failures through circuit breakers.
    pub enable_circuit_breakers: bool,

    /// Allow the manager to degrade service under sustained stress.
    pub enable_graceful_degradation: bool,

    /// Allow multi-agent recovery coordination.
    pub enable_recovery_coordination: bool,

    /// Maximum local recovery attempts per failure.
    pub max_recovery_attempts: u32,

    /// Bound on each handling step (retries, guarded calls).
    pub default_timeout: Duration,

    /// Base delay for the growing inter-attempt backoff.
    pub retry_base_delay: Duration,

    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Degradation configuration.
    pub degradation: DegradationConfig,

    /// Recovery coordination configuration.
    pub coordination: CoordinationConfig,

    /// Audit configuration.
    pub audit: AuditConfig,

    /// Log verbosity hint for the hosting process ("trace" through "error").
    pub log_level: String,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            enable_circuit_breakers: true,
            enable_graceful_degradation: true,
            enable_recovery_coordination: true,
            max_recovery_attempts: 3,
            default_timeout: Duration::from_secs(30),
            retry_base_delay: Duration::from_millis(500),
            circuit_breaker: CircuitBreakerConfig::default(),
            degradation: DegradationConfig::default(),
            coordination: CoordinationConfig::default(),
            audit: AuditConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failures within the rolling window that trip the breaker.
    pub failure_threshold: u32,

    /// Failure percentage within the rolling window that trips the breaker.
    pub error_threshold_percentage: f64,

    /// Time to wait in OPEN before probing recovery.
    pub recovery_timeout: Duration,

    /// Width of the rolling outcome window.
    pub rolling_window: Duration,

    /// Minimum requests in the window before trip conditions apply.
    pub minimum_throughput: u32,

    /// Trial calls admitted in HALF_OPEN; the same count of consecutive
    /// successes closes the circuit.
    pub test_request_volume: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            error_threshold_percentage: 50.0,
            recovery_timeout: Duration::from_secs(30),
            rolling_window: Duration::from_secs(60),
            minimum_throughput: 5,
            test_request_volume: 3,
        }
    }
}

/// Degradation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationConfig {
    /// Error percentage past which the manager evaluates degradation.
    pub threshold_percentage: f64,

    /// Minimum outcomes in the window before the error percentage is
    /// meaningful.
    pub minimum_samples: usize,

    /// Interval of the background auto-recovery evaluation.
    pub check_interval: Duration,

    /// Step the level back down when the trigger metric stays calm.
    pub auto_recovery: bool,

    /// Ceiling the degradation level never exceeds.
    pub max_level: DegradationLevel,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            threshold_percentage: 50.0,
            minimum_samples: 5,
            check_interval: Duration::from_secs(30),
            auto_recovery: true,
            max_level: DegradationLevel::Emergency,
        }
    }
}

/// Recovery coordination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Bound on a whole coordination episode.
    pub coordination_timeout: Duration,

    /// Concurrent recoveries per batch.
    pub max_concurrent_recoveries: usize,

    /// Bound on each agent's recovery attempt.
    pub recovery_timeout: Duration,

    /// Pacing delay between rolling-recovery batches.
    pub batch_delay: Duration,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            coordination_timeout: Duration::from_secs(300),
            max_concurrent_recoveries: 3,
            recovery_timeout: Duration::from_secs(30),
            batch_delay: Duration::from_secs(5),
        }
    }
}

/// Audit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Write classification details for every handled failure.
    pub log_error_details: bool,

    /// Write records for recovery actions taken.
    pub log_recovery_actions: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_error_details: true,
            log_recovery_actions: true,
        }
    }
}

impl ErrorHandlingConfig {
    /// Relaxed limits and verbose logging for local development.
    pub fn development() -> Self {
        let mut config = Self::default();
        config.max_recovery_attempts = 5;
        config.circuit_breaker.failure_threshold = 10;
        config.circuit_breaker.recovery_timeout = Duration::from_secs(5);
        config.degradation.auto_recovery = true;
        config.degradation.check_interval = Duration::from_secs(5);
        config.log_level = "debug".to_string();
        config
    }

    /// Balanced defaults for production deployments.
    pub fn production() -> Self {
        Self::default()
    }

    /// Trip early and recover aggressively; availability over latency.
    pub fn high_availability() -> Self {
        let mut config = Self::default();
        config.max_recovery_attempts = 5;
        config.circuit_breaker.failure_threshold = 3;
        config.circuit_breaker.error_threshold_percentage = 25.0;
        config.circuit_breaker.recovery_timeout = Duration::from_secs(10);
        config.coordination.max_concurrent_recoveries = 5;
        config.degradation.threshold_percentage = 30.0;
        config.degradation.check_interval = Duration::from_secs(10);
        config
    }

    /// Wider windows and fewer retries; throughput over resilience work.
    pub fn performance_optimized() -> Self {
        let mut config = Self::default();
        config.max_recovery_attempts = 2;
        config.retry_base_delay = Duration::from_millis(100);
        config.circuit_breaker.rolling_window = Duration::from_secs(120);
        config.circuit_breaker.minimum_throughput = 20;
        config.audit.log_error_details = false;
        config
    }

    /// Tight deadlines everywhere; fail fast rather than wait.
    pub fn real_time() -> Self {
        let mut config = Self::default();
        config.max_recovery_attempts = 1;
        config.default_timeout = Duration::from_secs(2);
        config.retry_base_delay = Duration::from_millis(50);
        config.circuit_breaker.recovery_timeout = Duration::from_secs(5);
        config.coordination.coordination_timeout = Duration::from_secs(30);
        config.coordination.recovery_timeout = Duration::from_secs(5);
        config.coordination.batch_delay = Duration::from_millis(500);
        config
    }

    /// Long deadlines and patient retries for offline batch work.
    pub fn batch_processing() -> Self {
        let mut config = Self::default();
        config.max_recovery_attempts = 10;
        config.default_timeout = Duration::from_secs(300);
        config.retry_base_delay = Duration::from_secs(5);
        config.circuit_breaker.rolling_window = Duration::from_secs(600);
        config.circuit_breaker.recovery_timeout = Duration::from_secs(120);
        config.coordination.coordination_timeout = Duration::from_secs(1800);
        config
    }

    /// Conservative recovery with a full audit trail.
    pub fn security_focused() -> Self {
        let mut config = Self::default();
        config.max_recovery_attempts = 2;
        config.enable_recovery_coordination = false;
        config.degradation.max_level = DegradationLevel::Severe;
        config.audit.log_error_details = true;
        config.audit.log_recovery_actions = true;
        config.log_level = "debug".to_string();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_diverge_from_default() {
        let default = ErrorHandlingConfig::default();
        let ha = ErrorHandlingConfig::high_availability();
        let rt = ErrorHandlingConfig::real_time();

        assert!(ha.circuit_breaker.failure_threshold < default.circuit_breaker.failure_threshold);
        assert!(rt.default_timeout < default.default_timeout);
        assert_eq!(rt.max_recovery_attempts, 1);
    }

    #[test]
    fn test_security_preset_caps_degradation() {
        let config = ErrorHandlingConfig::security_focused();
        assert_eq!(config.degradation.max_level, DegradationLevel::Severe);
        assert!(!config.enable_recovery_coordination);
    }

    #[test]
    fn test_batch_preset_is_patient() {
        let config = ErrorHandlingConfig::batch_processing();
        assert_eq!(config.max_recovery_attempts, 10);
        assert!(config.default_timeout >= Duration::from_secs(300));
    }
}
