//! Vector Backend Traits
//!
//! Trait definition for vector stores. This abstraction lets the router drive
//! two independently operated stores (a pgvector table and a Pinecone index)
//! without knowing either one's wire format.
//!
//! # Contract
//!
//! Adapters translate the router's generic options into whatever their store
//! needs (RPC names, namespaces, filter syntax) and must report failures as
//! errors. Returning an empty list for a failed call would hide the outage
//! from the router's failover logic, which has to tell "backend failed" apart
//! from "backend found nothing".

use async_trait::async_trait;

use crate::document::{BackendHit, BackendId, Document, HybridSearchOptions, SearchOptions};
use crate::error::{BackendError, BackendResult};

/// Vector store client
///
/// Implement this trait to put another store behind the router.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Which of the two router slots this backend fills
    fn id(&self) -> BackendId;

    /// Whether [`VectorBackend::hybrid_search`] is implemented natively
    fn supports_hybrid(&self) -> bool {
        false
    }

    /// Store documents and return their ids, in input order
    ///
    /// Documents reach the adapter with ids already assigned.
    async fn add(&self, documents: &[Document]) -> BackendResult<Vec<String>>;

    /// Semantic similarity search
    async fn search(&self, query: &str, options: &SearchOptions) -> BackendResult<Vec<BackendHit>>;

    /// Combined keyword + semantic search
    async fn hybrid_search(
        &self,
        _query: &str,
        _options: &HybridSearchOptions,
    ) -> BackendResult<Vec<BackendHit>> {
        Err(BackendError::CapabilityUnsupported {
            backend: self.id(),
            operation: "hybrid search",
        })
    }

    /// Remove documents by id
    async fn delete(&self, ids: &[String]) -> BackendResult<()>;

    /// Store-native statistics (document counts, index stats, ...)
    async fn statistics(&self) -> BackendResult<serde_json::Value>;
}
