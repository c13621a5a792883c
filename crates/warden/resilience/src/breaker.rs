//! Circuit breaker
//!
//! Per-guarded-operation state machine that stops calling a failing
//! dependency once the rolling-window trip condition is met, and probes
//! recovery after a cooldown. State transitions are linearizable per service
//! name: every read and mutation happens under the breaker's mutex, and the
//! lock is never held across an await point.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CircuitBreakerConfig;
use crate::error::{WardenError, WardenResult};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Operations execute normally; outcomes are tracked in the window.
    Closed,

    /// Calls are rejected without executing the wrapped operation.
    Open,

    /// A limited number of trial calls probe whether the dependency
    /// recovered.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// One recorded call outcome inside the rolling window.
#[derive(Debug, Clone, Copy)]
struct Outcome {
    at: Instant,
    success: bool,
}

/// Mutable breaker state, guarded by the breaker's mutex.
struct BreakerInner {
    state: CircuitState,
    window: VecDeque<Outcome>,
    opened_at: Option<Instant>,
    half_open_admitted: u32,
    half_open_successes: u32,
    last_transition: DateTime<Utc>,
}

/// Circuit breaker for a single guarded operation.
pub struct CircuitBreaker {
    service_name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker for the named operation.
    pub fn new(service_name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            service_name: service_name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                half_open_admitted: 0,
                half_open_successes: 0,
                last_transition: Utc::now(),
            }),
        }
    }

    /// Name of the guarded operation.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Current state, after applying any due OPEN -> HALF_OPEN transition.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.check_recovery_timeout(&mut inner);
        inner.state
    }

    /// Run an operation through the breaker.
    ///
    /// # Errors
    /// Returns [`WardenError::CircuitOpen`] without executing the operation
    /// when the circuit is open (or half-open with its trial budget spent).
    /// The operation's own failure is recorded and propagated unchanged.
    pub async fn call<T, F>(&self, operation: F) -> WardenResult<T>
    where
        F: Future<Output = WardenResult<T>>,
    {
        self.try_acquire()?;

        match operation.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    /// Reserve permission for one call.
    ///
    /// # Errors
    /// Returns [`WardenError::CircuitOpen`] when the circuit rejects the
    /// call.
    pub fn try_acquire(&self) -> WardenResult<()> {
        let mut inner = self.lock();
        self.check_recovery_timeout(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => Err(WardenError::CircuitOpen {
                service: self.service_name.clone(),
            }),
            CircuitState::HalfOpen => {
                if inner.half_open_admitted < self.config.test_request_volume {
                    inner.half_open_admitted += 1;
                    Ok(())
                } else {
                    Err(WardenError::CircuitOpen {
                        service: self.service_name.clone(),
                    })
                }
            }
        }
    }

    /// Record a successful call outcome.
    pub fn record_success(&self) {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => {
                self.push_outcome(&mut inner, true);
                self.maybe_trip(&mut inner);
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.test_request_volume {
                    info!(
                        service = %self.service_name,
                        successes = inner.half_open_successes,
                        "circuit closing after successful trial calls"
                    );
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Open => {
                debug!(service = %self.service_name, "success recorded while circuit open");
            }
        }
    }

    /// Record a failed call outcome.
    pub fn record_failure(&self) {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => {
                self.push_outcome(&mut inner, false);
                self.maybe_trip(&mut inner);
            }
            CircuitState::HalfOpen => {
                warn!(
                    service = %self.service_name,
                    "circuit re-opening after half-open failure"
                );
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    /// Force the breaker to a specific state.
    pub fn force_state(&self, new_state: CircuitState) {
        let mut inner = self.lock();
        info!(
            service = %self.service_name,
            old_state = %inner.state,
            new_state = %new_state,
            "circuit state forced"
        );
        self.transition(&mut inner, new_state);
    }

    /// Reset the breaker to closed, clearing the window.
    pub fn reset(&self) {
        self.force_state(CircuitState::Closed);
    }

    /// Snapshot of the breaker's counters.
    pub fn stats(&self) -> BreakerStats {
        let mut inner = self.lock();
        self.check_recovery_timeout(&mut inner);
        self.prune_window(&mut inner);

        let failures = inner.window.iter().filter(|o| !o.success).count() as u32;
        BreakerStats {
            service_name: self.service_name.clone(),
            state: inner.state,
            window_requests: inner.window.len() as u32,
            window_failures: failures,
            last_transition: inner.last_transition,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Transition OPEN -> HALF_OPEN once the recovery timeout elapses.
    fn check_recovery_timeout(&self, inner: &mut BreakerInner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let due = inner
            .opened_at
            .map(|t| t.elapsed() >= self.config.recovery_timeout)
            .unwrap_or(false);
        if due {
            info!(
                service = %self.service_name,
                "circuit half-open after recovery timeout"
            );
            self.transition(inner, CircuitState::HalfOpen);
        }
    }

    fn push_outcome(&self, inner: &mut BreakerInner, success: bool) {
        inner.window.push_back(Outcome {
            at: Instant::now(),
            success,
        });
        self.prune_window(inner);
    }

    fn prune_window(&self, inner: &mut BreakerInner) {
        let horizon = self.config.rolling_window;
        while let Some(front) = inner.window.front() {
            if front.at.elapsed() > horizon {
                inner.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Evaluate the trip condition against the current window.
    ///
    /// The percentage gate uses a strictly-greater comparison so that
    /// setting `error_threshold_percentage` to 100.0 disables it, leaving
    /// the count threshold alone in charge.
    fn maybe_trip(&self, inner: &mut BreakerInner) {
        if inner.state != CircuitState::Closed {
            return;
        }

        let total = inner.window.len() as u32;
        if total < self.config.minimum_throughput {
            return;
        }

        let failures = inner.window.iter().filter(|o| !o.success).count() as u32;
        let failure_pct = f64::from(failures) / f64::from(total) * 100.0;

        if failures >= self.config.failure_threshold
            || failure_pct > self.config.error_threshold_percentage
        {
            warn!(
                service = %self.service_name,
                failures = failures,
                requests = total,
                failure_pct = failure_pct,
                "circuit opening"
            );
            self.transition(inner, CircuitState::Open);
        }
    }

    fn transition(&self, inner: &mut BreakerInner, new_state: CircuitState) {
        inner.state = new_state;
        inner.last_transition = Utc::now();

        match new_state {
            CircuitState::Closed => {
                inner.window.clear();
                inner.opened_at = None;
                inner.half_open_admitted = 0;
                inner.half_open_successes = 0;
            }
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
                inner.half_open_admitted = 0;
                inner.half_open_successes = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_admitted = 0;
                inner.half_open_successes = 0;
            }
        }
    }
}

/// Snapshot of a breaker's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerStats {
    /// Guarded operation name.
    pub service_name: String,

    /// Current state.
    pub state: CircuitState,

    /// Requests in the rolling window.
    pub window_requests: u32,

    /// Failures in the rolling window.
    pub window_failures: u32,

    /// Time of the last state transition.
    pub last_transition: DateTime<Utc>,
}

/// One-breaker-per-service-name registry, owned by the manager.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry that builds breakers from the given config.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Get the breaker for a service, creating it on first use.
    pub fn get_or_create(&self, service: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service, self.config.clone())))
            .clone()
    }

    /// Get the breaker for a service, if one exists.
    pub fn get(&self, service: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(service).map(|entry| entry.value().clone())
    }

    /// Stats for every registered breaker.
    pub fn stats(&self) -> Vec<BreakerStats> {
        self.breakers.iter().map(|entry| entry.stats()).collect()
    }

    /// Reset every registered breaker to closed.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            error_threshold_percentage: 100.0,
            recovery_timeout: Duration::from_millis(100),
            rolling_window: Duration::from_secs(60),
            minimum_throughput: 1,
            test_request_volume: 1,
        }
    }

    async fn failing_call(breaker: &CircuitBreaker) -> WardenResult<()> {
        breaker
            .call(async { Err::<(), _>(WardenError::Operation("boom".into())) })
            .await
    }

    #[tokio::test]
    async fn test_opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new("ledger_write", test_config());

        for _ in 0..3 {
            let err = failing_call(&breaker).await.unwrap_err();
            assert!(matches!(err, WardenError::Operation(_)));
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking_operation() {
        let breaker = CircuitBreaker::new("ledger_write", test_config());
        for _ in 0..3 {
            let _ = failing_call(&breaker).await;
        }

        let invocations = AtomicU32::new(0);
        let result = breaker
            .call(async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok::<_, WardenError>(())
            })
            .await;

        assert!(matches!(result, Err(WardenError::CircuitOpen { .. })));
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_half_open_after_recovery_timeout() {
        let breaker = CircuitBreaker::new("ledger_write", test_config());
        for _ in 0..3 {
            let _ = failing_call(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_half_open_success_closes() {
        let breaker = CircuitBreaker::new("ledger_write", test_config());
        for _ in 0..3 {
            let _ = failing_call(&breaker).await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;

        breaker
            .call(async { Ok::<_, WardenError>(()) })
            .await
            .unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("ledger_write", test_config());
        for _ in 0..3 {
            let _ = failing_call(&breaker).await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        let _ = failing_call(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        // The recovery timer restarts from the half-open failure.
        let rejected = breaker
            .call(async { Ok::<_, WardenError>(()) })
            .await;
        assert!(matches!(rejected, Err(WardenError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn test_minimum_throughput_gates_trip() {
        let config = CircuitBreakerConfig {
            minimum_throughput: 5,
            ..test_config()
        };
        let breaker = CircuitBreaker::new("ledger_write", config);

        for _ in 0..3 {
            let _ = failing_call(&breaker).await;
        }
        // Three failures, but below minimum throughput.
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker
            .call(async { Ok::<_, WardenError>(()) })
            .await
            .unwrap();
        breaker
            .call(async { Ok::<_, WardenError>(()) })
            .await
            .unwrap();
        // Five requests with three failures now meets the trip condition.
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_failures_age_out_of_window() {
        let config = CircuitBreakerConfig {
            rolling_window: Duration::from_millis(50),
            ..test_config()
        };
        let breaker = CircuitBreaker::new("ledger_write", config);

        let _ = failing_call(&breaker).await;
        let _ = failing_call(&breaker).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let _ = failing_call(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_error_percentage_trip() {
        let config = CircuitBreakerConfig {
            failure_threshold: 100,
            error_threshold_percentage: 40.0,
            minimum_throughput: 4,
            ..test_config()
        };
        let breaker = CircuitBreaker::new("ledger_write", config);

        breaker
            .call(async { Ok::<_, WardenError>(()) })
            .await
            .unwrap();
        breaker
            .call(async { Ok::<_, WardenError>(()) })
            .await
            .unwrap();
        let _ = failing_call(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);

        // 2 of 4 failed: 50% > 40%.
        let _ = failing_call(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_registry_returns_same_instance_per_service() {
        let registry = CircuitBreakerRegistry::new(test_config());
        let a = registry.get_or_create("consensus_vote");
        let b = registry.get_or_create("consensus_vote");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.stats().len(), 1);
    }
}
