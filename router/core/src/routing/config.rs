//! Routing Configuration
//!
//! Runtime configuration for the router: which backend is primary, whether
//! fallback and automatic re-election are on, and the thresholds that decide
//! when a backend counts as slow or unhealthy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::document::BackendId;

// ============================================================================
// Thresholds
// ============================================================================

/// When a primary is considered too slow or too error-prone
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceThreshold {
    /// A successful search slower than this is re-issued to the secondary
    pub max_latency_ms: u64,

    /// Primary error rate above which re-election is allowed (0.0 - 1.0)
    pub max_error_rate: f64,
}

impl Default for PerformanceThreshold {
    fn default() -> Self {
        Self {
            max_latency_ms: 5_000,
            max_error_rate: 0.1,
        }
    }
}

impl PerformanceThreshold {
    /// Latency budget as a Duration
    #[must_use]
    pub fn max_latency(&self) -> Duration {
        Duration::from_millis(self.max_latency_ms)
    }
}

/// Guard rails on primary re-election
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPolicy {
    /// Minimum time between two re-elections
    pub cooldown_secs: u64,

    /// A candidate must have an error rate below this to be elected (0.0 - 1.0)
    pub healthy_error_rate: f64,
}

impl Default for SwitchPolicy {
    fn default() -> Self {
        Self {
            cooldown_secs: 300, // 5 minutes
            healthy_error_rate: 0.05,
        }
    }
}

impl SwitchPolicy {
    /// Cooldown as a chrono Duration, for comparison with wall-clock timestamps
    #[must_use]
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.cooldown_secs).unwrap_or(i64::MAX))
    }
}

// ============================================================================
// Router Configuration
// ============================================================================

/// Complete router configuration
///
/// Exactly one backend is primary at any instant; the other is the secondary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    /// Backend tried first for every operation
    pub primary: BackendId,

    /// Use the secondary on failure or slowness, and replicate writes to it
    pub fallback_enabled: bool,

    /// Allow a successful write fallback to re-elect the primary
    pub auto_switch: bool,

    /// Latency and error-rate limits
    pub performance_threshold: PerformanceThreshold,

    /// Re-election guard rails
    pub switch_policy: SwitchPolicy,

    /// Upper bound on any single backend call
    pub call_timeout_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            primary: BackendId::Pgvector,
            fallback_enabled: true,
            auto_switch: true,
            performance_threshold: PerformanceThreshold::default(),
            switch_policy: SwitchPolicy::default(),
            call_timeout_ms: 30_000,
        }
    }
}

impl RouterConfig {
    /// The backend that is not primary
    #[must_use]
    pub fn secondary(&self) -> BackendId {
        self.primary.other()
    }

    /// Per-call timeout as a Duration
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Check that rates and timeouts are in range
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        let rates = [
            ("performanceThreshold.maxErrorRate", self.performance_threshold.max_error_rate),
            ("switchPolicy.healthyErrorRate", self.switch_policy.healthy_error_rate),
        ];
        for (name, rate) in rates {
            if !(0.0..=1.0).contains(&rate) {
                return Err(format!("{name} must be between 0.0 and 1.0, got {rate}"));
            }
        }
        if self.call_timeout_ms == 0 {
            return Err("callTimeoutMs must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Partial configuration for runtime updates
///
/// Each `Some` field replaces the corresponding top-level field; nested
/// structs are replaced whole, not merged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfigUpdate {
    /// New primary
    #[serde(default)]
    pub primary: Option<BackendId>,
    /// New fallback flag
    #[serde(default)]
    pub fallback_enabled: Option<bool>,
    /// New auto-switch flag
    #[serde(default)]
    pub auto_switch: Option<bool>,
    /// New thresholds
    #[serde(default)]
    pub performance_threshold: Option<PerformanceThreshold>,
    /// New re-election guard rails
    #[serde(default)]
    pub switch_policy: Option<SwitchPolicy>,
    /// New per-call timeout
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

impl RouterConfigUpdate {
    /// Shallow-merge this update over `config`
    pub fn apply(self, config: &mut RouterConfig) {
        if let Some(primary) = self.primary {
            config.primary = primary;
        }
        if let Some(enabled) = self.fallback_enabled {
            config.fallback_enabled = enabled;
        }
        if let Some(enabled) = self.auto_switch {
            config.auto_switch = enabled;
        }
        if let Some(threshold) = self.performance_threshold {
            config.performance_threshold = threshold;
        }
        if let Some(policy) = self.switch_policy {
            config.switch_policy = policy;
        }
        if let Some(timeout) = self.call_timeout_ms {
            config.call_timeout_ms = timeout;
        }
    }
}
