//! Graceful degradation manager
//!
//! Tracks the deployment-wide degradation level and the behavioral
//! overrides attached to it. Escalation moves exactly one step at a time
//! and never exceeds the configured ceiling. Auto-recovery runs as a
//! cancellable periodic task owned by the manager's lifecycle, never from
//! the request path.
//!
//! Every degradation change is logged: entering and leaving a degraded
//! mode is an operational event that must be traceable afterwards.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use warden_types::{
    ConditionOperator, DegradationCondition, DegradationLevel, DegradationOverrides,
    DegradationState,
};

use crate::config::DegradationConfig;

/// How long metric samples are retained for window evaluation.
const METRIC_RETENTION: Duration = Duration::from_secs(600);

/// Tracks and adjusts the deployment's degradation posture.
pub struct DegradationManager {
    config: DegradationConfig,
    state: RwLock<DegradationState>,
    metrics: Mutex<HashMap<String, VecDeque<(Instant, f64)>>>,
    /// Condition that caused the current escalation, evaluated by the
    /// auto-recovery task for stepping back down.
    trigger: Mutex<Option<DegradationCondition>>,
    auto_task: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl DegradationManager {
    /// Create a manager starting at full functionality.
    pub fn new(config: DegradationConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            state: RwLock::new(DegradationState::default()),
            metrics: Mutex::new(HashMap::new()),
            trigger: Mutex::new(None),
            auto_task: Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Current degradation state.
    pub fn current_state(&self) -> DegradationState {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Current degradation level.
    pub fn level(&self) -> DegradationLevel {
        self.current_state().level
    }

    /// Whether any degradation is in effect.
    pub fn is_active(&self) -> bool {
        self.current_state().active
    }

    /// Whether the named feature is disabled at the current level.
    pub fn is_feature_disabled(&self, feature: &str) -> bool {
        self.current_state().is_feature_disabled(feature)
    }

    /// Record a sample of a monitored metric.
    pub fn record_metric(&self, metric: &str, value: f64) {
        let mut metrics = self.lock_metrics();
        let samples = metrics.entry(metric.to_string()).or_default();
        samples.push_back((Instant::now(), value));
        while let Some((at, _)) = samples.front() {
            if at.elapsed() > METRIC_RETENTION {
                samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Evaluate a trigger condition against recorded samples.
    ///
    /// When the most recent sample of the metric within the condition's
    /// window breaches it, the level escalates by exactly one step, capped
    /// at the configured maximum. Returns the level in effect after
    /// evaluation.
    pub fn evaluate_degradation(&self, condition: &DegradationCondition) -> DegradationLevel {
        let samples = self.windowed_samples(&condition.metric, condition.window);
        let Some(latest) = samples.last().copied() else {
            return self.level();
        };

        if !breaches(condition.operator, latest, condition.threshold) {
            debug!(
                metric = %condition.metric,
                observed = latest,
                threshold = condition.threshold,
                "degradation condition not breached"
            );
            return self.level();
        }

        self.escalate(condition, latest)
    }

    /// Set the level explicitly, with a reason and behavioral overrides.
    ///
    /// The level is clamped to the configured maximum.
    pub fn set_degradation_level(
        &self,
        level: DegradationLevel,
        reason: impl Into<String>,
        overrides: DegradationOverrides,
    ) {
        let capped = level.min(self.config.max_level);
        if capped != level {
            warn!(
                requested = %level,
                capped = %capped,
                "requested degradation level exceeds configured maximum"
            );
        }

        let reason = reason.into();
        let mut state = self.lock_state();
        warn!(
            level = %capped,
            reason = %reason,
            cache_only = overrides.use_cache_only,
            disabled = ?overrides.disabled_features,
            "degradation level set"
        );

        state.level = capped;
        state.active = capped != DegradationLevel::None;
        state.reason = reason;
        state.disabled_features = overrides.disabled_features;
        state.use_cache_only = overrides.use_cache_only;
        state.max_cache_age = overrides.max_cache_age;
    }

    /// Reset to full functionality, clearing all overrides.
    pub fn deactivate_degradation(&self, reason: impl Into<String>) {
        let reason = reason.into();
        {
            let mut state = self.lock_state();
            info!(reason = %reason, "degradation deactivated, full functionality restored");
            *state = DegradationState::default();
        }
        *self.lock_trigger() = None;
    }

    /// Spawn the periodic auto-recovery task, if enabled and not running.
    ///
    /// The task holds only a weak reference, so dropping the manager ends
    /// it; `shutdown` stops it promptly.
    pub fn start_auto_recovery(self: &Arc<Self>) {
        if !self.config.auto_recovery {
            return;
        }

        let mut task = self
            .auto_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if task.is_some() {
            return;
        }

        let weak = Arc::downgrade(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = self.config.check_interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match weak.upgrade() {
                            Some(manager) => manager.run_recovery_check(),
                            None => break,
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        }));
    }

    /// Stop the auto-recovery task.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self
            .auto_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    /// One auto-recovery evaluation: step the level down when the trigger
    /// metric stayed below its threshold for the whole check window.
    fn run_recovery_check(&self) {
        if !self.is_active() {
            return;
        }
        let Some(condition) = self.lock_trigger().clone() else {
            return;
        };

        let window = condition.window.max(self.config.check_interval);
        let samples = self.windowed_samples(&condition.metric, window);
        let calm = !samples.is_empty()
            && samples
                .iter()
                .all(|v| !breaches(condition.operator, *v, condition.threshold));
        if !calm {
            return;
        }

        let mut state = self.lock_state();
        let next = state.level.step_down();
        info!(
            from = %state.level,
            to = %next,
            metric = %condition.metric,
            "degradation stepping down after calm window"
        );
        state.level = next;

        if next == DegradationLevel::None {
            *state = DegradationState::default();
            drop(state);
            *self.lock_trigger() = None;
        }
    }

    fn escalate(&self, condition: &DegradationCondition, observed: f64) -> DegradationLevel {
        let mut state = self.lock_state();
        let next = state.level.step_up().min(self.config.max_level);
        if next == state.level {
            return state.level;
        }

        warn!(
            from = %state.level,
            to = %next,
            metric = %condition.metric,
            observed = observed,
            threshold = condition.threshold,
            "degradation escalating"
        );

        state.level = next;
        state.active = true;
        state.reason = format!(
            "metric {} breached threshold {} (observed {:.3})",
            condition.metric, condition.threshold, observed
        );
        drop(state);

        *self.lock_trigger() = Some(condition.clone());
        next
    }

    fn windowed_samples(&self, metric: &str, window: Duration) -> Vec<f64> {
        let metrics = self.lock_metrics();
        metrics
            .get(metric)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|(at, _)| at.elapsed() <= window)
                    .map(|(_, v)| *v)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lock_state(&self) -> std::sync::RwLockWriteGuard<'_, DegradationState> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_metrics(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<(Instant, f64)>>> {
        self.metrics
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_trigger(&self) -> std::sync::MutexGuard<'_, Option<DegradationCondition>> {
        self.trigger
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for DegradationManager {
    fn drop(&mut self) {
        if let Some(handle) = self
            .auto_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

fn breaches(operator: ConditionOperator, value: f64, threshold: f64) -> bool {
    match operator {
        ConditionOperator::Gt => value > threshold,
        ConditionOperator::Lt => value < threshold,
        ConditionOperator::Eq => (value - threshold).abs() < 1e-9,
    }
}
