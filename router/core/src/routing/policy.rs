//! Primary Reassignment Policy
//!
//! Decides whether a backend that just served a write fallback should become
//! the primary. The rule is deliberately conservative: all of
//!
//! 1. the cooldown since the last switch has elapsed (or there never was one),
//! 2. the current primary's error rate is above `maxErrorRate`,
//! 3. the candidate's error rate is below `healthyErrorRate`,
//!
//! must hold. One good fallback call is not enough; the candidate's history
//! has to look healthy already.

use chrono::{DateTime, Utc};

use super::config::RouterConfig;
use super::metrics::MetricsSnapshot;
use crate::document::BackendId;

/// Outcome of evaluating a candidate for primary
#[derive(Clone, Debug, PartialEq)]
pub enum SwitchDecision {
    /// All conditions hold; make the candidate primary
    Switch,
    /// The candidate already is primary
    AlreadyPrimary,
    /// The last switch was too recent
    CooldownActive {
        /// Time left before another switch is allowed
        remaining: chrono::Duration,
    },
    /// The current primary is within its error budget
    PrimaryHealthy {
        /// Current primary's error rate
        error_rate: f64,
    },
    /// The candidate's own history is not clean enough
    CandidateUnhealthy {
        /// Candidate's error rate
        error_rate: f64,
    },
}

impl SwitchDecision {
    /// Whether the decision is to switch
    #[must_use]
    pub fn is_switch(&self) -> bool {
        matches!(self, Self::Switch)
    }
}

/// Evaluate `candidate` against the current primary
#[must_use]
pub fn evaluate_switch(
    candidate: BackendId,
    config: &RouterConfig,
    metrics: &MetricsSnapshot,
    last_switch: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> SwitchDecision {
    let current = config.primary;
    if candidate == current {
        return SwitchDecision::AlreadyPrimary;
    }

    if let Some(last) = last_switch {
        let elapsed = now - last;
        let cooldown = config.switch_policy.cooldown();
        if elapsed < cooldown {
            return SwitchDecision::CooldownActive {
                remaining: cooldown - elapsed,
            };
        }
    }

    let current_rate = metrics.backend(current).error_rate;
    if current_rate <= config.performance_threshold.max_error_rate {
        return SwitchDecision::PrimaryHealthy {
            error_rate: current_rate,
        };
    }

    let candidate_rate = metrics.backend(candidate).error_rate;
    if candidate_rate >= config.switch_policy.healthy_error_rate {
        return SwitchDecision::CandidateUnhealthy {
            error_rate: candidate_rate,
        };
    }

    SwitchDecision::Switch
}
