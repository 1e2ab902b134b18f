//! Vector Backend Integration
//!
//! This module provides access to the two vector stores the router fronts
//! through a common trait interface.
//!
//! # Available Backends
//!
//! - **pgvector**: Postgres table reached over PostgREST; embeds locally,
//!   supports hybrid (full-text + vector) search natively
//! - **Pinecone**: Managed index with integrated embedding; similarity only
//!
//! # Usage
//!
//! ```ignore
//! use vector_router_core::backend::{PineconeBackend, PineconeSettings, VectorBackend};
//!
//! let backend = PineconeBackend::new(PineconeSettings::default())?;
//! let hits = backend.search("what is rust", &SearchOptions::top_k(5)).await?;
//! ```

mod http;
mod pgvector;
mod pinecone;
mod traits;

pub use pgvector::{PgvectorBackend, PgvectorSettings};
pub use pinecone::{PineconeBackend, PineconeSettings};
pub use traits::VectorBackend;
