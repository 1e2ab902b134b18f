//! Router Test Utilities
//!
//! A scriptable in-memory [`VectorBackend`] for exercising routing decisions
//! without a network. Failures and latency can be injected per operation, and
//! every call is counted so tests can assert which backend was tried.
//!
//! # Usage
//!
//! ```ignore
//! let primary = Arc::new(MockVectorBackend::new(BackendId::Pgvector));
//! primary.fail(MockOp::Add);
//! primary.set_latency(MockOp::Search, Duration::from_secs(6));
//!
//! // ... drive the router ...
//! assert_eq!(primary.calls(MockOp::Add), 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::backend::VectorBackend;
use crate::document::{BackendHit, BackendId, Document, HybridSearchOptions, SearchOptions};
use crate::error::{BackendError, BackendResult};

/// Operations whose behavior can be scripted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// `add`
    Add,
    /// `search`
    Search,
    /// `hybrid_search`
    Hybrid,
    /// `delete`
    Delete,
    /// `statistics`
    Statistics,
}

/// In-memory backend with failure and latency injection
#[derive(Debug)]
pub struct MockVectorBackend {
    id: BackendId,
    hybrid: bool,
    store: Mutex<Vec<Document>>,
    failing: Mutex<HashSet<MockOp>>,
    latencies: Mutex<HashMap<MockOp, Duration>>,
    calls: Mutex<HashMap<MockOp, usize>>,
}

impl MockVectorBackend {
    /// Healthy backend without native hybrid search
    pub fn new(id: BackendId) -> Self {
        Self {
            id,
            hybrid: false,
            store: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            latencies: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Healthy backend that supports hybrid search
    pub fn with_hybrid(id: BackendId) -> Self {
        Self {
            hybrid: true,
            ..Self::new(id)
        }
    }

    /// Make `op` fail until [`recover`](Self::recover)
    pub fn fail(&self, op: MockOp) {
        self.failing.lock().insert(op);
    }

    /// Make `op` succeed again
    pub fn recover(&self, op: MockOp) {
        self.failing.lock().remove(&op);
    }

    /// Delay `op` by `latency` before answering
    pub fn set_latency(&self, op: MockOp, latency: Duration) {
        self.latencies.lock().insert(op, latency);
    }

    /// Number of times `op` was invoked (including failed calls)
    pub fn calls(&self, op: MockOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Ids currently stored
    pub fn stored_ids(&self) -> Vec<String> {
        self.store
            .lock()
            .iter()
            .map(|d| d.id_or_empty().to_string())
            .collect()
    }

    /// Seed a document directly, bypassing call counting
    pub fn seed(&self, document: Document) {
        self.store.lock().push(document);
    }

    async fn enter(&self, op: MockOp) -> BackendResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;

        let latency = self.latencies.lock().get(&op).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.lock().contains(&op) {
            return Err(BackendError::Unavailable {
                backend: self.id,
                message: format!("injected {op:?} failure"),
            });
        }
        Ok(())
    }

    /// Fraction of query words present in each document
    fn rank(&self, query: &str, k: usize, threshold: Option<f32>) -> Vec<BackendHit> {
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<BackendHit> = self
            .store
            .lock()
            .iter()
            .filter_map(|doc| {
                let content = doc.content.to_lowercase();
                let matched = words.iter().filter(|w| content.contains(w.as_str())).count();
                let score = matched as f32 / words.len() as f32;
                (score > 0.0).then(|| BackendHit {
                    id: doc.id_or_empty().to_string(),
                    content: doc.content.clone(),
                    metadata: doc.metadata.clone(),
                    score,
                })
            })
            .filter(|hit| threshold.map_or(true, |min| hit.score >= min))
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        hits
    }
}

#[async_trait]
impl VectorBackend for MockVectorBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    fn supports_hybrid(&self) -> bool {
        self.hybrid
    }

    async fn add(&self, documents: &[Document]) -> BackendResult<Vec<String>> {
        self.enter(MockOp::Add).await?;
        let mut store = self.store.lock();
        store.extend(documents.iter().cloned());
        Ok(documents.iter().map(|d| d.id_or_empty().to_string()).collect())
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> BackendResult<Vec<BackendHit>> {
        self.enter(MockOp::Search).await?;
        Ok(self.rank(query, options.k, options.score_threshold))
    }

    async fn hybrid_search(&self, query: &str, options: &HybridSearchOptions) -> BackendResult<Vec<BackendHit>> {
        if !self.hybrid {
            return Err(BackendError::CapabilityUnsupported {
                backend: self.id,
                operation: "hybrid search",
            });
        }
        self.enter(MockOp::Hybrid).await?;
        Ok(self.rank(query, options.k, None))
    }

    async fn delete(&self, ids: &[String]) -> BackendResult<()> {
        self.enter(MockOp::Delete).await?;
        self.store
            .lock()
            .retain(|d| !ids.iter().any(|id| id == d.id_or_empty()));
        Ok(())
    }

    async fn statistics(&self) -> BackendResult<Value> {
        self.enter(MockOp::Statistics).await?;
        Ok(json!({ "documentCount": self.store.lock().len() }))
    }
}
