//! Vector Router
//!
//! The entry point callers use instead of talking to either store directly.
//! Every operation goes to the current primary first and, depending on the
//! operation, to the secondary on failure or slowness.
//!
//! # Failure policy
//!
//! | Operation           | Primary fails                      | Both fail            |
//! |---------------------|------------------------------------|----------------------|
//! | `add_documents`     | secondary write, maybe re-elect    | `AggregateFailure`   |
//! | `search_similar`    | secondary search                   | empty result list    |
//! | `hybrid_search`     | degrade to `search_similar`        | empty result list    |
//! | `delete_documents`  | logged                             | logged, never raised |
//! | `statistics`        | inline `{ "error": ... }`          | inline per backend   |
//!
//! Writes fail loudly; reads, deletes, and statistics fail quietly.
//!
//! # Consistency
//!
//! Replication to the secondary is best-effort and one-directional (primary to
//! secondary). A successful `add_documents` only guarantees the primary has
//! the documents; the replica write runs in the background and may fail.
//!
//! # Usage
//!
//! ```ignore
//! let router = VectorRouter::new(RouterConfig::default(), pgvector, pinecone);
//!
//! let ids = router.add_documents(chunks, Some(shared_metadata)).await?;
//! let results = router.search_similar("what is rust", &SearchOptions::top_k(5)).await;
//!
//! router.shutdown(Duration::from_secs(10)).await;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::{RouterConfig, RouterConfigUpdate};
use super::metrics::{MetricsSnapshot, RouterMetrics};
use super::policy::{evaluate_switch, SwitchDecision};
use super::tasks::{BackgroundTaskStats, BackgroundTasks, DrainReport, TaskKind};
use crate::backend::VectorBackend;
use crate::document::{
    BackendHit, BackendId, Document, DocumentMetadata, HybridSearchOptions, SearchOptions, VectorSearchResult,
};
use crate::error::{BackendError, BackendResult, RouterError};

// ============================================================================
// Statistics
// ============================================================================

/// Native statistics of one backend, or why they could not be fetched
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackendStatistics {
    /// Failed to fetch
    Error {
        /// Error description
        error: String,
    },
    /// Whatever the backend reports about itself
    Available(Value),
}

/// Everything `statistics` reports
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterStatistics {
    /// Active configuration
    pub config: RouterConfig,
    /// Counter snapshot
    pub metrics: MetricsSnapshot,
    /// Background replication and delete activity
    pub background: BackgroundTaskStats,
    /// pgvector native statistics
    pub pgvector: BackendStatistics,
    /// Pinecone native statistics
    pub pinecone: BackendStatistics,
}

// ============================================================================
// Fallback Reasons
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FallbackReason {
    PrimaryError,
    PrimarySlow,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PrimaryError => "primary_error",
            Self::PrimarySlow => "primary_slow",
        })
    }
}

/// Bound a backend call by `timeout`
async fn with_timeout<T, F>(backend: BackendId, timeout: Duration, call: F) -> BackendResult<T>
where
    F: Future<Output = BackendResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout {
            backend,
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

fn tag(hits: Vec<BackendHit>, backend: BackendId) -> Vec<VectorSearchResult> {
    hits.into_iter()
        .map(|hit| VectorSearchResult::from_hit(hit, backend))
        .collect()
}

/// Assign missing ids and overlay shared metadata
fn prepare(documents: Vec<Document>, shared: Option<&DocumentMetadata>) -> Vec<Document> {
    documents
        .into_iter()
        .map(|mut doc| {
            if doc.id.as_deref().map_or(true, str::is_empty) {
                doc.id = Some(Uuid::new_v4().to_string());
            }
            if let Some(shared) = shared {
                doc.metadata = std::mem::take(&mut doc.metadata).merged_over(shared);
            }
            doc
        })
        .collect()
}

// ============================================================================
// Vector Router
// ============================================================================

/// Dual-backend router with failover and primary re-election
///
/// Call [`shutdown`](Self::shutdown) before dropping it; a dropped router
/// aborts replicas and deletes that are still running.
pub struct VectorRouter {
    config: RwLock<RouterConfig>,
    pgvector: Arc<dyn VectorBackend>,
    pinecone: Arc<dyn VectorBackend>,
    metrics: Arc<RouterMetrics>,
    tasks: BackgroundTasks,
}

impl fmt::Debug for VectorRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorRouter")
            .field("config", &*self.config.read())
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl VectorRouter {
    /// Create a router over the two backends
    pub fn new(config: RouterConfig, pgvector: Arc<dyn VectorBackend>, pinecone: Arc<dyn VectorBackend>) -> Self {
        info!(
            primary = %config.primary,
            fallback_enabled = config.fallback_enabled,
            auto_switch = config.auto_switch,
            "Vector router created"
        );
        Self {
            config: RwLock::new(config),
            pgvector,
            pinecone,
            metrics: Arc::new(RouterMetrics::new()),
            tasks: BackgroundTasks::new(),
        }
    }

    fn backend(&self, id: BackendId) -> &Arc<dyn VectorBackend> {
        match id {
            BackendId::Pgvector => &self.pgvector,
            BackendId::Pinecone => &self.pinecone,
        }
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> Arc<RouterMetrics> {
        Arc::clone(&self.metrics)
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Store documents on the primary and replicate them to the secondary
    ///
    /// Documents without an id get a fresh UUID so the replica stores the
    /// same id. `metadata` is overlaid under each document's own metadata.
    ///
    /// # Errors
    ///
    /// [`RouterError::AggregateFailure`] when both backends reject the write,
    /// [`RouterError::PrimaryFailed`] when the primary rejects it and fallback
    /// is disabled.
    pub async fn add_documents(
        &self,
        documents: Vec<Document>,
        metadata: Option<DocumentMetadata>,
    ) -> Result<Vec<String>, RouterError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let config = self.config();
        let primary = config.primary;
        let documents = Arc::new(prepare(documents, metadata.as_ref()));

        let result = with_timeout(primary, config.call_timeout(), self.backend(primary).add(&documents)).await;
        match result {
            Ok(ids) => {
                self.metrics.record_success(primary);
                debug!(backend = %primary, count = ids.len(), "Documents added");
                if config.fallback_enabled {
                    self.replicate(&config, documents);
                }
                Ok(ids)
            }
            Err(e) => {
                self.metrics.record_error(primary);
                warn!(backend = %primary, error_kind = e.kind(), error = %e, "Primary add failed");
                if !config.fallback_enabled {
                    return Err(RouterError::PrimaryFailed {
                        backend: primary,
                        source: e,
                    });
                }
                self.add_with_fallback(&config, &documents, e).await
            }
        }
    }

    /// Retry a failed primary write on the secondary
    async fn add_with_fallback(
        &self,
        config: &RouterConfig,
        documents: &[Document],
        primary_error: BackendError,
    ) -> Result<Vec<String>, RouterError> {
        let secondary = config.secondary();
        let result = with_timeout(secondary, config.call_timeout(), self.backend(secondary).add(documents)).await;
        match result {
            Ok(ids) => {
                self.metrics.record_success(secondary);
                self.metrics.fallback_triggers.inc();
                warn!(
                    primary = %config.primary,
                    backend = %secondary,
                    reason = %FallbackReason::PrimaryError,
                    count = ids.len(),
                    "Documents added via fallback"
                );
                if config.auto_switch {
                    self.consider_primary_switch(secondary);
                }
                Ok(ids)
            }
            Err(fallback_error) => {
                self.metrics.record_error(secondary);
                warn!(
                    backend = %secondary,
                    error_kind = fallback_error.kind(),
                    error = %fallback_error,
                    "Fallback add failed"
                );
                Err(RouterError::AggregateFailure {
                    primary: config.primary,
                    primary_error,
                    fallback: secondary,
                    fallback_error,
                })
            }
        }
    }

    /// Copy documents to the secondary in the background
    fn replicate(&self, config: &RouterConfig, documents: Arc<Vec<Document>>) {
        let secondary = config.secondary();
        let backend = Arc::clone(self.backend(secondary));
        let metrics = Arc::clone(&self.metrics);
        let timeout = config.call_timeout();

        self.tasks.spawn(TaskKind::Replication, secondary, async move {
            let result = with_timeout(secondary, timeout, backend.add(&documents)).await;
            match result {
                Ok(_) => {
                    metrics.replications_succeeded.inc();
                    Ok(())
                }
                Err(e) => {
                    metrics.replications_failed.inc();
                    Err(e)
                }
            }
        });
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Similarity search with failover
    ///
    /// A primary that errors, or succeeds slower than `maxLatencyMs`, is
    /// replaced by the secondary. Never fails: when no backend can answer the
    /// result is empty.
    pub async fn search_similar(&self, query: &str, options: &SearchOptions) -> Vec<VectorSearchResult> {
        let config = self.config();
        let primary = config.primary;
        let started = Instant::now();

        let result = with_timeout(primary, config.call_timeout(), self.backend(primary).search(query, options)).await;
        let elapsed = started.elapsed();

        match result {
            Ok(hits) if elapsed > config.performance_threshold.max_latency() && config.fallback_enabled => {
                self.metrics.record_error(primary);
                warn!(
                    backend = %primary,
                    elapsed_ms = elapsed.as_millis() as u64,
                    max_latency_ms = config.performance_threshold.max_latency_ms,
                    "Primary search too slow"
                );
                match self.search_secondary(&config, query, options, FallbackReason::PrimarySlow).await {
                    Some(results) => results,
                    // the slow answer is still better than none
                    None => tag(hits, primary),
                }
            }
            Ok(hits) => {
                self.metrics.record_success(primary);
                debug!(
                    backend = %primary,
                    elapsed_ms = elapsed.as_millis() as u64,
                    count = hits.len(),
                    "Search served"
                );
                tag(hits, primary)
            }
            Err(e) => {
                self.metrics.record_error(primary);
                warn!(backend = %primary, error_kind = e.kind(), error = %e, "Primary search failed");
                if !config.fallback_enabled {
                    return Vec::new();
                }
                self.search_secondary(&config, query, options, FallbackReason::PrimaryError)
                    .await
                    .unwrap_or_default()
            }
        }
    }

    async fn search_secondary(
        &self,
        config: &RouterConfig,
        query: &str,
        options: &SearchOptions,
        reason: FallbackReason,
    ) -> Option<Vec<VectorSearchResult>> {
        let secondary = config.secondary();
        let result = with_timeout(secondary, config.call_timeout(), self.backend(secondary).search(query, options)).await;
        match result {
            Ok(hits) => {
                self.metrics.record_success(secondary);
                self.metrics.fallback_triggers.inc();
                warn!(
                    primary = %config.primary,
                    backend = %secondary,
                    reason = %reason,
                    count = hits.len(),
                    "Search served by fallback"
                );
                Some(tag(hits, secondary))
            }
            Err(e) => {
                self.metrics.record_error(secondary);
                warn!(backend = %secondary, error_kind = e.kind(), error = %e, "Fallback search failed");
                None
            }
        }
    }

    /// Keyword + semantic search, degrading to [`search_similar`](Self::search_similar)
    ///
    /// Hybrid scoring is only used when the current primary supports it and
    /// answers; otherwise the results are semantic-only with the same shape.
    pub async fn hybrid_search(&self, query: &str, options: &HybridSearchOptions) -> Vec<VectorSearchResult> {
        let config = self.config();
        let primary = config.primary;
        let backend = self.backend(primary);

        if backend.supports_hybrid() {
            let result = with_timeout(primary, config.call_timeout(), backend.hybrid_search(query, options)).await;
            match result {
                Ok(hits) => {
                    self.metrics.record_success(primary);
                    debug!(backend = %primary, count = hits.len(), "Hybrid search served");
                    return tag(hits, primary);
                }
                Err(e) => {
                    self.metrics.record_error(primary);
                    warn!(
                        backend = %primary,
                        error_kind = e.kind(),
                        error = %e,
                        "Hybrid search failed; degrading to similarity search"
                    );
                }
            }
        } else {
            debug!(backend = %primary, "Primary lacks hybrid search; degrading to similarity search");
        }

        self.search_similar(query, &options.to_similarity_options()).await
    }

    // ------------------------------------------------------------------------
    // Deletes
    // ------------------------------------------------------------------------

    /// Delete ids from the primary and, with fallback on, the secondary
    ///
    /// Best-effort: failures are logged and never returned. The secondary
    /// delete runs in the background alongside the primary one.
    pub async fn delete_documents(&self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }

        let config = self.config();
        let primary = config.primary;

        if config.fallback_enabled {
            let secondary = config.secondary();
            let backend = Arc::clone(self.backend(secondary));
            let owned = ids.to_vec();
            let timeout = config.call_timeout();
            self.tasks.spawn(TaskKind::Delete, secondary, async move {
                with_timeout(secondary, timeout, backend.delete(&owned)).await
            });
        }

        match with_timeout(primary, config.call_timeout(), self.backend(primary).delete(ids)).await {
            Ok(()) => {
                self.metrics.record_success(primary);
                debug!(backend = %primary, count = ids.len(), "Documents deleted");
            }
            Err(e) => {
                self.metrics.record_error(primary);
                warn!(backend = %primary, error_kind = e.kind(), error = %e, "Primary delete failed");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Introspection and configuration
    // ------------------------------------------------------------------------

    /// Configuration, metrics, and each backend's own statistics
    pub async fn statistics(&self) -> RouterStatistics {
        let config = self.config();
        let timeout = config.call_timeout();

        let (pgvector, pinecone) = future::join(
            with_timeout(BackendId::Pgvector, timeout, self.pgvector.statistics()),
            with_timeout(BackendId::Pinecone, timeout, self.pinecone.statistics()),
        )
        .await;

        let inline = |backend: BackendId, result: BackendResult<Value>| match result {
            Ok(value) => BackendStatistics::Available(value),
            Err(e) => {
                warn!(backend = %backend, error = %e, "Backend statistics unavailable");
                BackendStatistics::Error { error: e.to_string() }
            }
        };

        RouterStatistics {
            config,
            metrics: self.metrics.snapshot(),
            background: self.tasks.stats(),
            pgvector: inline(BackendId::Pgvector, pgvector),
            pinecone: inline(BackendId::Pinecone, pinecone),
        }
    }

    /// Copy of the active configuration
    pub fn config(&self) -> RouterConfig {
        self.config.read().clone()
    }

    /// Shallow-merge `update` into the active configuration
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidConfig`] if the merged configuration is invalid;
    /// the active configuration is left untouched.
    pub fn update_config(&self, update: RouterConfigUpdate) -> Result<(), RouterError> {
        let mut config = self.config.write();
        let mut merged = config.clone();
        update.apply(&mut merged);
        merged.validate().map_err(RouterError::InvalidConfig)?;

        if merged.primary != config.primary {
            info!(from = %config.primary, to = %merged.primary, "Primary changed by configuration update");
        }
        *config = merged;
        Ok(())
    }

    /// Zero all counters and forget the last switch
    pub fn reset_metrics(&self) {
        self.metrics.reset();
        info!("Router metrics reset");
    }

    /// Make `candidate` primary if the reassignment policy allows it
    ///
    /// Returns whether the primary changed.
    pub fn consider_primary_switch(&self, candidate: BackendId) -> bool {
        // config lock first, then the switch timestamp
        let mut config = self.config.write();
        let now = Utc::now();
        let decision = evaluate_switch(
            candidate,
            &config,
            &self.metrics.snapshot(),
            self.metrics.last_switch_time(),
            now,
        );

        match decision {
            SwitchDecision::Switch => {
                let previous = config.primary;
                config.primary = candidate;
                self.metrics.set_last_switch_time(now);
                self.metrics.primary_switches.inc();
                info!(
                    from = %previous,
                    to = %candidate,
                    previous_error_rate = self.metrics.error_rate(previous),
                    candidate_error_rate = self.metrics.error_rate(candidate),
                    "Primary backend switched"
                );
                true
            }
            other => {
                debug!(candidate = %candidate, decision = ?other, "Primary switch declined");
                false
            }
        }
    }

    /// Background task counters
    pub fn background_tasks(&self) -> BackgroundTaskStats {
        self.tasks.stats()
    }

    /// Stop background work, waiting up to `timeout` for replicas and deletes
    pub async fn shutdown(&self, timeout: Duration) -> DrainReport {
        let report = self.tasks.drain(timeout).await;
        info!(
            completed = report.completed,
            aborted = report.aborted,
            "Vector router shut down"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ResultSource;
    use crate::routing::config::SwitchPolicy;
    use crate::routing::test_utils::{MockOp, MockVectorBackend};
    use pretty_assertions::assert_eq;
    use tokio_test::assert_ok;

    struct Harness {
        router: VectorRouter,
        pgvector: Arc<MockVectorBackend>,
        pinecone: Arc<MockVectorBackend>,
    }

    fn harness(config: RouterConfig) -> Harness {
        let pgvector = Arc::new(MockVectorBackend::with_hybrid(BackendId::Pgvector));
        let pinecone = Arc::new(MockVectorBackend::new(BackendId::Pinecone));
        let router = VectorRouter::new(config, pgvector.clone(), pinecone.clone());
        Harness {
            router,
            pgvector,
            pinecone,
        }
    }

    fn docs(contents: &[&str]) -> Vec<Document> {
        contents.iter().map(|c| Document::new(*c)).collect()
    }

    const DRAIN: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_add_to_healthy_primary() {
        let h = harness(RouterConfig::default());

        let ids = assert_ok!(h.router.add_documents(docs(&["Python is a language"]), None).await);
        assert_eq!(ids.len(), 1);

        let snapshot = h.router.metrics().snapshot();
        assert_eq!(snapshot.pgvector.successes, 1);
        assert_eq!(snapshot.fallback_triggers, 0);

        let results = h.router.search_similar("python", &SearchOptions::top_k(5)).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, ids[0]);
        assert_eq!(results[0].source, ResultSource::Pgvector);
    }

    #[tokio::test]
    async fn test_add_returns_one_id_per_document_and_replicates() {
        let h = harness(RouterConfig::default());
        let contents = ["alpha chunk", "beta chunk", "gamma chunk"];

        let ids = h.router.add_documents(docs(&contents), None).await.unwrap();
        assert_eq!(ids.len(), contents.len());

        h.router.shutdown(DRAIN).await;
        assert_eq!(h.pinecone.stored_ids(), ids);

        let snapshot = h.router.metrics().snapshot();
        assert_eq!(snapshot.replications_succeeded, 1);
        // replication does not count as a caller-visible pinecone call
        assert_eq!(snapshot.pinecone.successes, 0);
    }

    #[tokio::test]
    async fn test_add_assigns_ids_and_merges_shared_metadata() {
        let h = harness(RouterConfig::default());
        let shared = DocumentMetadata {
            knowledge_id: Some("kb-1".into()),
            tags: vec!["shared".into()],
            ..Default::default()
        };
        let own = Document::new("explicit").with_id("doc-1").with_metadata(DocumentMetadata {
            tags: vec!["own".into()],
            ..Default::default()
        });

        let ids = h
            .router
            .add_documents(vec![own, Document::new("generated")], Some(shared))
            .await
            .unwrap();
        assert_eq!(ids[0], "doc-1");
        assert!(Uuid::parse_str(&ids[1]).is_ok());

        let results = h.router.search_similar("explicit", &SearchOptions::top_k(1)).await;
        assert_eq!(results[0].metadata.knowledge_id.as_deref(), Some("kb-1"));
        assert_eq!(results[0].metadata.tags, vec!["shared", "own"]);
    }

    #[tokio::test]
    async fn test_add_empty_touches_no_backend() {
        let h = harness(RouterConfig::default());
        assert!(h.router.add_documents(Vec::new(), None).await.unwrap().is_empty());
        assert_eq!(h.pgvector.calls(MockOp::Add), 0);
        assert_eq!(h.pinecone.calls(MockOp::Add), 0);
    }

    #[tokio::test]
    async fn test_add_falls_back_when_primary_fails() {
        let h = harness(RouterConfig::default());
        h.pgvector.fail(MockOp::Add);

        let ids = h
            .router
            .add_documents(docs(&["Python is a language"]), None)
            .await
            .unwrap();
        assert_eq!(h.pinecone.stored_ids(), ids);

        let snapshot = h.router.metrics().snapshot();
        assert_eq!(snapshot.fallback_triggers, 1);
        assert_eq!(snapshot.pgvector.errors, 1);
        assert_eq!(snapshot.pinecone.successes, 1);
    }

    #[tokio::test]
    async fn test_fallback_keeps_primary_with_good_history() {
        let h = harness(RouterConfig::default());
        for _ in 0..20 {
            h.router.metrics().record_success(BackendId::Pgvector);
        }
        h.pgvector.fail(MockOp::Add);

        // one error in 21 calls is within the 0.1 budget
        h.router.add_documents(docs(&["stay"]), None).await.unwrap();
        assert_eq!(h.router.config().primary, BackendId::Pgvector);
        assert!(h.router.metrics().last_switch_time().is_none());
    }

    #[tokio::test]
    async fn test_add_aggregate_failure_when_both_fail() {
        let h = harness(RouterConfig::default());
        h.pgvector.fail(MockOp::Add);
        h.pinecone.fail(MockOp::Add);

        let err = h.router.add_documents(docs(&["doomed"]), None).await.unwrap_err();
        match err {
            RouterError::AggregateFailure { primary, fallback, .. } => {
                assert_eq!(primary, BackendId::Pgvector);
                assert_eq!(fallback, BackendId::Pinecone);
            }
            other => panic!("expected AggregateFailure, got {other:?}"),
        }

        let snapshot = h.router.metrics().snapshot();
        assert_eq!(snapshot.pgvector.successes, 0);
        assert_eq!(snapshot.pinecone.successes, 0);
        assert_eq!(snapshot.fallback_triggers, 0);
    }

    #[tokio::test]
    async fn test_add_without_fallback_reports_primary_failure() {
        let h = harness(RouterConfig {
            fallback_enabled: false,
            ..Default::default()
        });
        h.pgvector.fail(MockOp::Add);

        let err = h.router.add_documents(docs(&["doomed"]), None).await.unwrap_err();
        assert!(matches!(err, RouterError::PrimaryFailed { backend: BackendId::Pgvector, .. }));
        assert_eq!(h.pinecone.calls(MockOp::Add), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_primary_times_out_into_fallback() {
        let h = harness(RouterConfig {
            call_timeout_ms: 1_000,
            ..Default::default()
        });
        h.pgvector.set_latency(MockOp::Add, Duration::from_secs(3600));

        let ids = h.router.add_documents(docs(&["slow write"]), None).await.unwrap();
        assert_eq!(h.pinecone.stored_ids(), ids);
        assert_eq!(h.router.metrics().snapshot().pgvector.errors, 1);
    }

    #[tokio::test]
    async fn test_fallback_reelects_unhealthy_primary() {
        let h = harness(RouterConfig::default());
        let metrics = h.router.metrics();
        for _ in 0..4 {
            metrics.record_success(BackendId::Pgvector);
        }
        metrics.set_last_switch_time(Utc::now() - chrono::Duration::minutes(6));
        h.pgvector.fail(MockOp::Add);

        // pgvector: 4 successes, 1 error -> 0.2; pinecone: 1 success -> 0.0
        h.router.add_documents(docs(&["switch me"]), None).await.unwrap();

        assert_eq!(h.router.config().primary, BackendId::Pinecone);
        let last_switch = metrics.last_switch_time().unwrap();
        assert!(Utc::now() - last_switch < chrono::Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_auto_switch_disabled_keeps_primary() {
        let h = harness(RouterConfig {
            auto_switch: false,
            ..Default::default()
        });
        h.pgvector.fail(MockOp::Add);
        h.router.add_documents(docs(&["stay"]), None).await.unwrap();
        assert_eq!(h.router.config().primary, BackendId::Pgvector);
    }

    #[tokio::test]
    async fn test_switch_not_repeated_within_cooldown() {
        let h = harness(RouterConfig::default());
        let metrics = h.router.metrics();
        metrics.record_error(BackendId::Pgvector);
        assert!(h.router.consider_primary_switch(BackendId::Pinecone));
        assert_eq!(h.router.config().primary, BackendId::Pinecone);

        // now make the way back look just as justified
        for _ in 0..100 {
            metrics.record_success(BackendId::Pgvector);
        }
        for _ in 0..10 {
            metrics.record_error(BackendId::Pinecone);
        }
        for _ in 0..3 {
            assert!(!h.router.consider_primary_switch(BackendId::Pgvector));
        }
        assert_eq!(h.router.config().primary, BackendId::Pinecone);

        // the conditions really did hold; only the cooldown stopped it
        h.router
            .update_config(RouterConfigUpdate {
                switch_policy: Some(SwitchPolicy {
                    cooldown_secs: 0,
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap();
        assert!(h.router.consider_primary_switch(BackendId::Pgvector));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failing_adds_switch_once() {
        const CALLS: usize = 64;

        let h = harness(RouterConfig::default());
        h.pgvector.fail(MockOp::Add);
        h.pgvector.set_latency(MockOp::Add, Duration::from_millis(2));
        let router = Arc::new(h.router);

        let mut adds = tokio::task::JoinSet::new();
        for i in 0..CALLS {
            let router = Arc::clone(&router);
            adds.spawn(async move { router.add_documents(vec![Document::new(format!("chunk {i}"))], None).await });
        }
        let mut ids = Vec::new();
        while let Some(joined) = adds.join_next().await {
            ids.extend(joined.unwrap().unwrap());
        }
        assert_eq!(ids.len(), CALLS);

        router.shutdown(DRAIN).await;
        let snapshot = router.metrics().snapshot();

        assert_eq!(router.config().primary, BackendId::Pinecone);
        assert_eq!(snapshot.primary_switches, 1);
        assert!(snapshot.last_switch_time.is_some());

        // every pgvector failure was absorbed by pinecone
        assert_eq!(snapshot.fallback_triggers, snapshot.pgvector.errors);
        assert_eq!(snapshot.pgvector.successes, 0);
        assert_eq!(snapshot.pinecone.errors, 0);

        // the rest went straight to pinecone once it was primary
        let direct = snapshot.pinecone.successes - snapshot.fallback_triggers;
        assert_eq!(snapshot.fallback_triggers + direct, CALLS as u64);
        assert_eq!(snapshot.replications_failed, direct);
        assert_eq!(snapshot.replications_succeeded, 0);
        assert_eq!(h.pinecone.stored_ids().len(), CALLS);
        assert_eq!(h.pgvector.calls(MockOp::Add), CALLS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_primary_search_served_by_secondary() {
        let h = harness(RouterConfig::default());
        h.pgvector.seed(Document::new("python from pgvector").with_id("a"));
        h.pinecone.seed(Document::new("python from pinecone").with_id("b"));
        h.pgvector.set_latency(MockOp::Search, Duration::from_millis(6_000));

        let results = h.router.search_similar("python", &SearchOptions::top_k(5)).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, ResultSource::Pinecone);

        let snapshot = h.router.metrics().snapshot();
        assert_eq!(snapshot.pgvector.errors, 1);
        assert_eq!(snapshot.pinecone.successes, 1);
        assert_eq!(snapshot.fallback_triggers, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_primary_kept_when_secondary_fails() {
        let h = harness(RouterConfig::default());
        h.pgvector.seed(Document::new("python from pgvector").with_id("a"));
        h.pgvector.set_latency(MockOp::Search, Duration::from_millis(6_000));
        h.pinecone.fail(MockOp::Search);

        let results = h.router.search_similar("python", &SearchOptions::top_k(5)).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, ResultSource::Pgvector);
    }

    #[tokio::test]
    async fn test_search_failure_degrades_to_empty() {
        let h = harness(RouterConfig::default());
        h.pinecone.seed(Document::new("rust ownership").with_id("r"));
        h.pgvector.fail(MockOp::Search);

        let results = h.router.search_similar("rust", &SearchOptions::top_k(5)).await;
        assert_eq!(results[0].source, ResultSource::Pinecone);

        h.pinecone.fail(MockOp::Search);
        assert!(h.router.search_similar("rust", &SearchOptions::top_k(5)).await.is_empty());
        assert_eq!(h.router.metrics().snapshot().pinecone.errors, 1);
    }

    #[tokio::test]
    async fn test_search_without_fallback_stays_on_primary() {
        let h = harness(RouterConfig {
            fallback_enabled: false,
            ..Default::default()
        });
        h.pgvector.fail(MockOp::Search);
        assert!(h.router.search_similar("rust", &SearchOptions::default()).await.is_empty());
        assert_eq!(h.pinecone.calls(MockOp::Search), 0);
    }

    #[tokio::test]
    async fn test_hybrid_uses_native_support_on_primary() {
        let h = harness(RouterConfig::default());
        h.pgvector.seed(Document::new("hybrid keyword match").with_id("h"));

        let results = h.router.hybrid_search("keyword", &HybridSearchOptions::top_k(3)).await;
        assert_eq!(results[0].source, ResultSource::Pgvector);
        assert_eq!(h.pgvector.calls(MockOp::Hybrid), 1);
        assert_eq!(h.pgvector.calls(MockOp::Search), 0);
    }

    #[tokio::test]
    async fn test_hybrid_degrades_when_primary_lacks_support() {
        let h = harness(RouterConfig {
            primary: BackendId::Pinecone,
            ..Default::default()
        });
        h.pinecone.seed(Document::new("keyword in pinecone").with_id("p"));

        let hybrid = h.router.hybrid_search("keyword", &HybridSearchOptions::top_k(3)).await;
        let similar = h.router.search_similar("keyword", &SearchOptions::top_k(3)).await;
        assert_eq!(hybrid, similar);
        assert_eq!(h.pgvector.calls(MockOp::Hybrid), 0);
        assert_eq!(h.pinecone.calls(MockOp::Search), 2);
    }

    #[tokio::test]
    async fn test_hybrid_failure_degrades_to_similarity() {
        let h = harness(RouterConfig::default());
        h.pgvector.seed(Document::new("keyword again").with_id("k"));
        h.pgvector.fail(MockOp::Hybrid);

        let results = h.router.hybrid_search("keyword", &HybridSearchOptions::default()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, ResultSource::Pgvector);
        assert_eq!(h.pgvector.calls(MockOp::Search), 1);
    }

    #[tokio::test]
    async fn test_delete_never_fails() {
        let h = harness(RouterConfig::default());
        h.pgvector.fail(MockOp::Delete);
        h.pinecone.fail(MockOp::Delete);

        h.router.delete_documents(&["id1".to_string()]).await;
        h.router.shutdown(DRAIN).await;

        assert_eq!(h.pgvector.calls(MockOp::Delete), 1);
        assert_eq!(h.pinecone.calls(MockOp::Delete), 1);
        assert_eq!(h.router.background_tasks().failed, 1);
        assert_eq!(h.router.metrics().snapshot().pgvector.errors, 1);
    }

    #[tokio::test]
    async fn test_delete_reaches_both_stores() {
        let h = harness(RouterConfig::default());
        let ids = h.router.add_documents(docs(&["to be removed"]), None).await.unwrap();
        while h.router.background_tasks().in_flight > 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.pinecone.stored_ids(), ids);

        h.router.delete_documents(&ids).await;
        h.router.shutdown(DRAIN).await;

        assert!(h.pgvector.stored_ids().is_empty());
        assert!(h.pinecone.stored_ids().is_empty());
    }

    #[tokio::test]
    async fn test_statistics_inline_backend_errors() {
        let h = harness(RouterConfig::default());
        h.pinecone.fail(MockOp::Statistics);
        h.router.add_documents(docs(&["counted"]), None).await.unwrap();

        let stats = h.router.statistics().await;
        assert_eq!(stats.config, RouterConfig::default());
        assert_eq!(stats.metrics.pgvector.successes, 1);
        assert!(matches!(stats.pgvector, BackendStatistics::Available(_)));

        let json = serde_json::to_value(&stats).unwrap();
        assert!(json["pinecone"]["error"].as_str().unwrap().contains("injected"));
        assert_eq!(json["pgvector"]["documentCount"], serde_json::json!(1));
    }

    #[tokio::test]
    async fn test_reset_metrics_clears_everything() {
        let h = harness(RouterConfig::default());
        h.pgvector.fail(MockOp::Add);
        h.router.add_documents(docs(&["x"]), None).await.unwrap();
        h.router.metrics().set_last_switch_time(Utc::now());

        h.router.reset_metrics();
        let snapshot = h.router.metrics().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
        assert!(snapshot.last_switch_time.is_none());
    }

    #[tokio::test]
    async fn test_update_config_merges_and_validates() {
        let h = harness(RouterConfig::default());
        h.router
            .update_config(RouterConfigUpdate {
                primary: Some(BackendId::Pinecone),
                fallback_enabled: Some(false),
                ..Default::default()
            })
            .unwrap();

        let config = h.router.config();
        assert_eq!(config.primary, BackendId::Pinecone);
        assert!(!config.fallback_enabled);
        assert!(config.auto_switch);

        let err = h
            .router
            .update_config(RouterConfigUpdate {
                call_timeout_ms: Some(0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidConfig(_)));
        assert_eq!(h.router.config(), config);
    }

    #[tokio::test]
    async fn test_writes_after_shutdown_skip_replication() {
        let h = harness(RouterConfig::default());
        h.router.shutdown(DRAIN).await;

        let ids = h.router.add_documents(docs(&["late"]), None).await.unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(h.router.background_tasks().refused, 1);
        assert!(h.pinecone.stored_ids().is_empty());
    }

}
