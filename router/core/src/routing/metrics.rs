//! Router Metrics
//!
//! Counters the reassignment policy reads on every write fallback:
//! - Per-backend successes and errors
//! - Fallback triggers
//! - Background replication outcomes
//! - Time of the last primary switch
//!
//! Counters are lock-free atomics; concurrent calls never block each other to
//! record an outcome. Counts only move forward until [`RouterMetrics::reset`].

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::document::BackendId;

// ============================================================================
// Counter
// ============================================================================

/// A monotonic atomic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Create a counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// Errors divided by attempts, with an empty history reading as 0.0
#[must_use]
pub fn error_rate(successes: u64, errors: u64) -> f64 {
    errors as f64 / (errors + successes).max(1) as f64
}

// ============================================================================
// Per-Backend Counters
// ============================================================================

/// Outcome counters for one backend
#[derive(Debug, Default)]
pub struct BackendCounters {
    /// Calls the backend completed in time
    pub successes: Counter,
    /// Calls that failed, timed out, or were too slow
    pub errors: Counter,
}

impl BackendCounters {
    fn snapshot(&self) -> BackendCountersSnapshot {
        let successes = self.successes.get();
        let errors = self.errors.get();
        BackendCountersSnapshot {
            successes,
            errors,
            error_rate: error_rate(successes, errors),
        }
    }

    fn reset(&self) {
        self.successes.reset();
        self.errors.reset();
    }
}

/// Point-in-time view of one backend's counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendCountersSnapshot {
    /// Successful calls
    pub successes: u64,
    /// Failed calls
    pub errors: u64,
    /// `errors / max(errors + successes, 1)`
    pub error_rate: f64,
}

// ============================================================================
// Router Metrics
// ============================================================================

/// All metrics the router keeps
#[derive(Debug, Default)]
pub struct RouterMetrics {
    pgvector: BackendCounters,
    pinecone: BackendCounters,
    /// Operations the secondary had to serve
    pub fallback_triggers: Counter,
    /// Background replica writes that landed
    pub replications_succeeded: Counter,
    /// Background replica writes that failed
    pub replications_failed: Counter,
    /// Times the primary changed through re-election
    pub primary_switches: Counter,
    last_switch_time: Mutex<Option<DateTime<Utc>>>,
}

impl RouterMetrics {
    /// Create zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for one backend
    #[must_use]
    pub fn backend(&self, id: BackendId) -> &BackendCounters {
        match id {
            BackendId::Pgvector => &self.pgvector,
            BackendId::Pinecone => &self.pinecone,
        }
    }

    /// Count a successful call
    pub fn record_success(&self, id: BackendId) {
        self.backend(id).successes.inc();
    }

    /// Count a failed (or too slow) call
    pub fn record_error(&self, id: BackendId) {
        self.backend(id).errors.inc();
    }

    /// Current error rate of one backend
    #[must_use]
    pub fn error_rate(&self, id: BackendId) -> f64 {
        let counters = self.backend(id);
        error_rate(counters.successes.get(), counters.errors.get())
    }

    /// When the primary last changed
    #[must_use]
    pub fn last_switch_time(&self) -> Option<DateTime<Utc>> {
        *self.last_switch_time.lock()
    }

    /// Record a primary switch
    pub fn set_last_switch_time(&self, at: DateTime<Utc>) {
        *self.last_switch_time.lock() = Some(at);
    }

    /// Zero every counter and forget the last switch
    pub fn reset(&self) {
        self.pgvector.reset();
        self.pinecone.reset();
        self.fallback_triggers.reset();
        self.replications_succeeded.reset();
        self.replications_failed.reset();
        self.primary_switches.reset();
        *self.last_switch_time.lock() = None;
    }

    /// Copy every value out
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pgvector: self.pgvector.snapshot(),
            pinecone: self.pinecone.snapshot(),
            fallback_triggers: self.fallback_triggers.get(),
            replications_succeeded: self.replications_succeeded.get(),
            replications_failed: self.replications_failed.get(),
            primary_switches: self.primary_switches.get(),
            last_switch_time: self.last_switch_time(),
        }
    }
}

/// Point-in-time view of [`RouterMetrics`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// pgvector counters
    pub pgvector: BackendCountersSnapshot,
    /// Pinecone counters
    pub pinecone: BackendCountersSnapshot,
    /// Operations the secondary had to serve
    pub fallback_triggers: u64,
    /// Background replica writes that landed
    pub replications_succeeded: u64,
    /// Background replica writes that failed
    pub replications_failed: u64,
    /// Times the primary changed through re-election
    pub primary_switches: u64,
    /// When the primary last changed
    pub last_switch_time: Option<DateTime<Utc>>,
}

impl MetricsSnapshot {
    /// Counters for one backend
    #[must_use]
    pub fn backend(&self, id: BackendId) -> &BackendCountersSnapshot {
        match id {
            BackendId::Pgvector => &self.pgvector,
            BackendId::Pinecone => &self.pinecone,
        }
    }
}
