//! Degradation state and trigger conditions

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::taxonomy::DegradationLevel;

/// Comparison operator for degradation trigger conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Breaches when the metric exceeds the threshold.
    Gt,
    /// Breaches when the metric falls below the threshold.
    Lt,
    /// Breaches when the metric equals the threshold.
    Eq,
}

/// A monitored-metric condition that can trigger degradation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationCondition {
    /// Name of the monitored metric.
    pub metric: String,

    /// How the metric is compared against the threshold.
    pub operator: ConditionOperator,

    /// Threshold value.
    pub threshold: f64,

    /// Window over which metric samples are considered.
    pub window: Duration,
}

impl DegradationCondition {
    pub fn new(
        metric: impl Into<String>,
        operator: ConditionOperator,
        threshold: f64,
        window: Duration,
    ) -> Self {
        Self {
            metric: metric.into(),
            operator,
            threshold,
            window,
        }
    }
}

/// Behavioral overrides that accompany a degradation level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DegradationOverrides {
    /// Features turned off while degraded.
    pub disabled_features: HashSet<String>,

    /// Whether responses must come from cache only.
    pub use_cache_only: bool,

    /// Maximum acceptable cache age while in cache-only mode.
    pub max_cache_age: Option<Duration>,
}

/// Current degradation posture of a deployment (or subsystem).
///
/// Singleton per manager; mutated by evaluation or explicit operator action,
/// only ever reset back to [`DegradationLevel::None`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationState {
    /// Current level.
    pub level: DegradationLevel,

    /// Whether any degradation is in effect.
    pub active: bool,

    /// Why the current level was entered.
    pub reason: String,

    /// Features turned off at the current level.
    pub disabled_features: HashSet<String>,

    /// Whether responses must come from cache only.
    pub use_cache_only: bool,

    /// Maximum acceptable cache age while in cache-only mode.
    pub max_cache_age: Option<Duration>,
}

impl Default for DegradationState {
    fn default() -> Self {
        Self {
            level: DegradationLevel::None,
            active: false,
            reason: String::new(),
            disabled_features: HashSet::new(),
            use_cache_only: false,
            max_cache_age: None,
        }
    }
}

impl DegradationState {
    /// Whether the named feature is currently disabled.
    pub fn is_feature_disabled(&self, feature: &str) -> bool {
        self.disabled_features.contains(feature)
    }
}
