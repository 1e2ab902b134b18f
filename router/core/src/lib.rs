//! Vector Router Core - Dual-Backend Vector Search Routing
//!
//! One interface over two independently operated vector stores: a pgvector
//! table behind PostgREST and a Pinecone index. The router sends every
//! operation to the current primary, routes around a failing or slow
//! primary, replicates writes to the secondary in the background, and
//! re-elects the primary when the error counters justify it.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │          Callers (ingestion pipeline, retrieval layer)         │
//! └───────────────────────────────┬───────────────────────────────┘
//!                                 │ add / search / hybrid / delete
//! ┌───────────────────────────────┼───────────────────────────────┐
//! │                         VectorRouter                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐  │
//! │  │ RouterConfig │  │RouterMetrics │  │  BackgroundTasks     │  │
//! │  │  (primary)   │  │ (counters)   │  │ (replicas, deletes)  │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────────┘  │
//! └───────────────┬───────────────────────────────┬───────────────┘
//!                 │                               │
//!        ┌────────┴────────┐             ┌────────┴────────┐
//!        │ PgvectorBackend │             │ PineconeBackend │
//!        │  (+ Embedder)   │             │ (server embeds) │
//!        └─────────────────┘             └─────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`VectorRouter`]: Entry point for every store operation
//! - [`VectorBackend`]: Contract each store adapter implements
//! - [`RouterConfig`]: Primary, fallback, and threshold settings
//! - [`VectorSearchResult`]: A match tagged with the backend that produced it
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use vector_router_core::{
//!     load_config, HttpEmbedder, PgvectorBackend, PineconeBackend, SearchOptions, VectorRouter,
//! };
//!
//! let settings = load_config().await?;
//! let embedder = Arc::new(HttpEmbedder::new(settings.embedding.clone())?);
//! let router = VectorRouter::new(
//!     settings.router.clone(),
//!     Arc::new(PgvectorBackend::new(settings.pgvector.clone(), embedder)?),
//!     Arc::new(PineconeBackend::new(settings.pinecone.clone())?),
//! );
//!
//! let results = router.search_similar("how do lifetimes work", &SearchOptions::top_k(5)).await;
//! ```
//!
//! # Module Overview
//!
//! - [`document`]: Documents, metadata, search options, results
//! - [`backend`]: Backend contract and the pgvector and Pinecone adapters
//! - [`embedding`]: Embedding client used by the pgvector adapter
//! - [`routing`]: Router, metrics, re-election policy, background tasks
//! - [`config`]: TOML, environment, and CLI configuration
//! - [`error`]: Backend and router error types

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod routing;

// Re-exports for convenience
pub use backend::{PgvectorBackend, PgvectorSettings, PineconeBackend, PineconeSettings, VectorBackend};
pub use document::{
    BackendHit, BackendId, Document, DocumentMetadata, HybridSearchOptions, MetadataFilter, ResultSource,
    SearchOptions, VectorSearchResult,
};
pub use embedding::{Embedder, EmbeddingSettings, HttpEmbedder};
pub use error::{BackendError, BackendResult, RouterError};

// Routing exports
pub use routing::{
    BackendStatistics, MetricsSnapshot, PerformanceThreshold, RouterConfig, RouterConfigUpdate, RouterMetrics,
    RouterStatistics, SwitchDecision, SwitchPolicy, VectorRouter,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, load_config_with_env, ConfigError, ConfigOverrides,
    ConfigSource, RouterSettings,
};
