//! Error Types
//!
//! Backend adapters fail with [`BackendError`]; the router only ever returns
//! [`RouterError`] from the write path. Reads, deletes, and statistics absorb
//! backend failures (see the router module for the propagation policy).

use thiserror::Error;

use crate::document::BackendId;

/// Result type returned by backend adapters
pub type BackendResult<T> = Result<T, BackendError>;

/// A failed call to one backend
#[derive(Clone, Debug, Error)]
pub enum BackendError {
    /// Connection-level failure (DNS, refused, reset, TLS)
    #[error("{backend} unavailable: {message}")]
    Unavailable {
        /// Backend that failed
        backend: BackendId,
        /// Transport error description
        message: String,
    },

    /// The backend answered with a non-success HTTP status
    #[error("{backend} returned HTTP {status}: {body}")]
    Http {
        /// Backend that failed
        backend: BackendId,
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// The call did not complete within the configured timeout
    #[error("{backend} call timed out after {timeout_ms}ms")]
    Timeout {
        /// Backend that failed
        backend: BackendId,
        /// Timeout that elapsed
        timeout_ms: u64,
    },

    /// The backend answered but the body could not be understood
    #[error("{backend} returned an invalid response: {message}")]
    InvalidResponse {
        /// Backend that failed
        backend: BackendId,
        /// What was wrong with the body
        message: String,
    },

    /// The requested operation is not offered by this backend
    #[error("{backend} does not support {operation}")]
    CapabilityUnsupported {
        /// Backend that lacks the capability
        backend: BackendId,
        /// Operation that was requested
        operation: &'static str,
    },

    /// Computing embeddings for the request failed
    #[error("{backend} embedding failed: {message}")]
    Embedding {
        /// Backend whose embedder failed
        backend: BackendId,
        /// Embedder error description
        message: String,
    },
}

impl BackendError {
    /// Backend the error belongs to
    #[must_use]
    pub fn backend(&self) -> BackendId {
        match self {
            Self::Unavailable { backend, .. }
            | Self::Http { backend, .. }
            | Self::Timeout { backend, .. }
            | Self::InvalidResponse { backend, .. }
            | Self::CapabilityUnsupported { backend, .. }
            | Self::Embedding { backend, .. } => *backend,
        }
    }

    /// Short machine-readable kind for structured logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "unavailable",
            Self::Http { .. } => "http",
            Self::Timeout { .. } => "timeout",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::CapabilityUnsupported { .. } => "capability_unsupported",
            Self::Embedding { .. } => "embedding",
        }
    }

    /// Map a reqwest error onto the taxonomy
    ///
    /// `timeout_ms` is the client timeout that applied to the request.
    #[must_use]
    pub fn from_reqwest(backend: BackendId, err: &reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { backend, timeout_ms }
        } else if err.is_decode() {
            Self::InvalidResponse {
                backend,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Http {
                backend,
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Unavailable {
                backend,
                message: err.to_string(),
            }
        }
    }
}

/// Errors surfaced to callers of the router
#[derive(Debug, Error)]
pub enum RouterError {
    /// Both the primary and the fallback backend failed a write
    #[error(
        "write failed on both backends: {primary} ({primary_error}); {fallback} ({fallback_error})"
    )]
    AggregateFailure {
        /// Backend tried first
        primary: BackendId,
        /// Why the primary failed
        primary_error: BackendError,
        /// Backend tried second
        fallback: BackendId,
        /// Why the fallback failed
        fallback_error: BackendError,
    },

    /// The primary failed a write and fallback is disabled
    #[error("write failed on {backend} and fallback is disabled: {source}")]
    PrimaryFailed {
        /// Backend that failed
        backend: BackendId,
        /// Why it failed
        #[source]
        source: BackendError,
    },

    /// A configuration update was rejected
    #[error("invalid router configuration: {0}")]
    InvalidConfig(String),
}
