//! Dual-Backend Routing
//!
//! Failover, replication, and primary re-election across the two vector
//! stores.
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |   VectorRouter   |  <-- Entry point for every store operation
//! +--------+---------+
//!          |
//!    +-----+------------------+
//!    |                        |
//!    v                        v
//! +-----------+       +----------------+
//! |  primary  |  -->  |   secondary    |  <-- on error, slowness, or replication
//! +-----------+       +----------------+
//!          |                  ^
//!          v                  |
//! +------------------+   +-----------------+
//! |  RouterMetrics   |-->| evaluate_switch |  <-- may swap primary and secondary
//! +------------------+   +-----------------+
//! ```
//!
//! Background replica writes and secondary deletes run on
//! [`BackgroundTasks`](tasks::BackgroundTasks) so they can be drained at shutdown.
//!
//! # Design Principles
//!
//! 1. **Writes fail loud**: a write nobody stored is an error
//! 2. **Reads fail quiet**: an empty result beats an outage
//! 3. **Slow is broken**: a primary over its latency budget is treated as failed
//! 4. **Conservative re-election**: cooldown plus error-rate evidence on both sides

pub mod config;
pub mod metrics;
pub mod policy;
pub mod router;
pub mod tasks;

#[cfg(test)]
pub mod test_utils;

pub use config::{PerformanceThreshold, RouterConfig, RouterConfigUpdate, SwitchPolicy};
pub use metrics::{MetricsSnapshot, RouterMetrics};
pub use policy::{evaluate_switch, SwitchDecision};
pub use router::{BackendStatistics, RouterStatistics, VectorRouter};
pub use tasks::{BackgroundTaskStats, BackgroundTasks, DrainReport, TaskKind};
