//! Document and Search Result Model
//!
//! The shapes passed into and out of the router. Documents arrive already
//! chunked from the ingestion pipeline; search results leave tagged with the
//! backend that actually produced them.
//!
//! # Metadata
//!
//! [`DocumentMetadata`] carries the well-known fields every ingestion path sets
//! (knowledge base, source document, chunk position, ownership, tags,
//! timestamps) as typed fields, and everything else in a flattened `extra` map
//! so unknown keys survive a round trip through either backend.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Backend Identity
// ============================================================================

/// One of the two vector stores the router fronts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// Postgres with the pgvector extension (relational store)
    Pgvector,
    /// Pinecone managed index (cloud store)
    Pinecone,
}

impl BackendId {
    /// Both backends, in a stable order
    pub const ALL: [BackendId; 2] = [BackendId::Pgvector, BackendId::Pinecone];

    /// The backend that is not `self`
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Pgvector => Self::Pinecone,
            Self::Pinecone => Self::Pgvector,
        }
    }

    /// Stable lowercase name used in logs and configuration
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pgvector => "pgvector",
            Self::Pinecone => "pinecone",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pgvector" | "postgres" | "supabase" => Ok(Self::Pgvector),
            "pinecone" => Ok(Self::Pinecone),
            other => Err(format!("unknown backend '{other}' (expected pgvector or pinecone)")),
        }
    }
}

/// Where a search result came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    /// Served by the pgvector store
    Pgvector,
    /// Served by the Pinecone index
    Pinecone,
    /// Served by an upstream result cache (never produced by the router)
    Cache,
}

impl From<BackendId> for ResultSource {
    fn from(id: BackendId) -> Self {
        match id {
            BackendId::Pgvector => Self::Pgvector,
            BackendId::Pinecone => Self::Pinecone,
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Metadata attached to a document chunk
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Knowledge base the chunk belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_id: Option<String>,

    /// Source document the chunk was cut from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,

    /// Original file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// File type (extension or MIME type)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,

    /// Position of this chunk within its source document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,

    /// Number of chunks the source document was split into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,

    /// Owning user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Owning organization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    /// Free-form tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// When the chunk was first ingested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// When the chunk was last re-ingested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Keys outside the well-known set
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentMetadata {
    /// Overlay `self` on top of `defaults`.
    ///
    /// Fields set on `self` win; tags are unioned (order preserved, no
    /// duplicates); extra keys from both sides are kept with `self` winning.
    #[must_use]
    pub fn merged_over(self, defaults: &DocumentMetadata) -> DocumentMetadata {
        let mut tags = defaults.tags.clone();
        let mut seen: BTreeSet<String> = tags.iter().cloned().collect();
        for tag in self.tags {
            if seen.insert(tag.clone()) {
                tags.push(tag);
            }
        }

        let mut extra = defaults.extra.clone();
        extra.extend(self.extra);

        DocumentMetadata {
            knowledge_id: self.knowledge_id.or_else(|| defaults.knowledge_id.clone()),
            document_id: self.document_id.or_else(|| defaults.document_id.clone()),
            file_name: self.file_name.or_else(|| defaults.file_name.clone()),
            file_type: self.file_type.or_else(|| defaults.file_type.clone()),
            chunk_index: self.chunk_index.or(defaults.chunk_index),
            total_chunks: self.total_chunks.or(defaults.total_chunks),
            user_id: self.user_id.or_else(|| defaults.user_id.clone()),
            organization_id: self
                .organization_id
                .or_else(|| defaults.organization_id.clone()),
            tags,
            created_at: self.created_at.or(defaults.created_at),
            updated_at: self.updated_at.or(defaults.updated_at),
            extra,
        }
    }

    /// Metadata as a JSON object
    #[must_use]
    pub fn to_json_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Rebuild metadata from a JSON object, keeping unknown keys in `extra`.
    ///
    /// Each well-known key is decoded on its own; one with an unexpected type
    /// lands in `extra` without affecting the others. Whole-number floats are
    /// accepted for the chunk counters.
    #[must_use]
    pub fn from_json_map(map: Map<String, Value>) -> DocumentMetadata {
        let mut metadata = DocumentMetadata::default();
        for (key, value) in map {
            if !WELL_KNOWN_KEYS.contains(&key.as_str()) {
                metadata.extra.insert(key, value);
                continue;
            }

            let value = match key.as_str() {
                "chunkIndex" | "totalChunks" => whole_number(value),
                _ => value,
            };
            let single = Map::from_iter([(key.clone(), value.clone())]);
            match serde_json::from_value::<DocumentMetadata>(Value::Object(single)) {
                Ok(decoded) => metadata = decoded.merged_over(&metadata),
                Err(_) => {
                    metadata.extra.insert(key, value);
                }
            }
        }
        metadata
    }
}

/// JSON keys of the typed [`DocumentMetadata`] fields
const WELL_KNOWN_KEYS: &[&str] = &[
    "knowledgeId",
    "documentId",
    "fileName",
    "fileType",
    "chunkIndex",
    "totalChunks",
    "userId",
    "organizationId",
    "tags",
    "createdAt",
    "updatedAt",
];

/// `2.0` becomes `2`; anything else is returned unchanged
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_number(value: Value) -> Value {
    match value.as_f64() {
        Some(f) if value.is_f64() && f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f) => {
            Value::from(f as u64)
        }
        _ => value,
    }
}

/// A chunk of text to be embedded and stored
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Chunk id; assigned by the router when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Text content
    pub content: String,

    /// Chunk metadata
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a document with empty metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    /// Set the chunk id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The chunk id, or the empty string before the router assigns one
    #[must_use]
    pub fn id_or_empty(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

// ============================================================================
// Search Options
// ============================================================================

/// Equality constraints over metadata keys (camelCase, as stored)
pub type MetadataFilter = Map<String, Value>;

fn default_k() -> usize {
    5
}

fn default_keyword_weight() -> f32 {
    0.3
}

/// Options for plain similarity search
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    /// Maximum number of results
    #[serde(default = "default_k")]
    pub k: usize,

    /// Drop results scoring below this value
    #[serde(default)]
    pub score_threshold: Option<f32>,

    /// Metadata equality filter
    #[serde(default)]
    pub filter: Option<MetadataFilter>,

    /// Restrict to one knowledge base
    #[serde(default)]
    pub knowledge_base_id: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: default_k(),
            score_threshold: None,
            filter: None,
            knowledge_base_id: None,
        }
    }
}

impl SearchOptions {
    /// Options returning at most `k` results
    #[must_use]
    pub fn top_k(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    /// Set the score threshold
    #[must_use]
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    /// Set the metadata filter
    #[must_use]
    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Restrict to a knowledge base
    #[must_use]
    pub fn with_knowledge_base(mut self, id: impl Into<String>) -> Self {
        self.knowledge_base_id = Some(id.into());
        self
    }

    /// The filter with the knowledge base folded in as a `knowledgeId` constraint
    #[must_use]
    pub fn effective_filter(&self) -> Option<MetadataFilter> {
        combine_filter(self.filter.as_ref(), self.knowledge_base_id.as_deref())
    }
}

/// Options for combined keyword + semantic search
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridSearchOptions {
    /// Maximum number of results
    #[serde(default = "default_k")]
    pub k: usize,

    /// Weight of the keyword score (0.0 - 1.0); semantic weight is the rest
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    /// Metadata equality filter
    #[serde(default)]
    pub filter: Option<MetadataFilter>,

    /// Restrict to one knowledge base
    #[serde(default)]
    pub knowledge_base_id: Option<String>,
}

impl Default for HybridSearchOptions {
    fn default() -> Self {
        Self {
            k: default_k(),
            keyword_weight: default_keyword_weight(),
            filter: None,
            knowledge_base_id: None,
        }
    }
}

impl HybridSearchOptions {
    /// Options returning at most `k` results
    #[must_use]
    pub fn top_k(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    /// Set the keyword weight (clamped to 0.0 - 1.0)
    #[must_use]
    pub fn with_keyword_weight(mut self, weight: f32) -> Self {
        self.keyword_weight = weight.clamp(0.0, 1.0);
        self
    }

    /// Keyword weight clamped to 0.0 - 1.0
    #[must_use]
    pub fn clamped_keyword_weight(&self) -> f32 {
        self.keyword_weight.clamp(0.0, 1.0)
    }

    /// The filter with the knowledge base folded in as a `knowledgeId` constraint
    #[must_use]
    pub fn effective_filter(&self) -> Option<MetadataFilter> {
        combine_filter(self.filter.as_ref(), self.knowledge_base_id.as_deref())
    }

    /// Semantic-only equivalent used when hybrid scoring is unavailable
    #[must_use]
    pub fn to_similarity_options(&self) -> SearchOptions {
        SearchOptions {
            k: self.k,
            score_threshold: None,
            filter: self.filter.clone(),
            knowledge_base_id: self.knowledge_base_id.clone(),
        }
    }
}

fn combine_filter(filter: Option<&MetadataFilter>, knowledge_base_id: Option<&str>) -> Option<MetadataFilter> {
    match (filter, knowledge_base_id) {
        (None, None) => None,
        (filter, kb) => {
            let mut combined = filter.cloned().unwrap_or_default();
            if let Some(kb) = kb {
                combined.insert("knowledgeId".to_string(), Value::String(kb.to_string()));
            }
            Some(combined)
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// A raw match as returned by a backend adapter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendHit {
    /// Chunk id
    pub id: String,
    /// Text content
    pub content: String,
    /// Chunk metadata
    pub metadata: DocumentMetadata,
    /// Similarity score (higher is closer)
    pub score: f32,
}

/// A ranked match returned to callers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchResult {
    /// Chunk id
    pub id: String,
    /// Text content
    pub content: String,
    /// Chunk metadata
    pub metadata: DocumentMetadata,
    /// Similarity score (higher is closer)
    pub score: f32,
    /// Backend that produced this result
    pub source: ResultSource,
}

impl VectorSearchResult {
    /// Tag a backend hit with the backend that produced it
    #[must_use]
    pub fn from_hit(hit: BackendHit, backend: BackendId) -> Self {
        Self {
            id: hit.id,
            content: hit.content,
            metadata: hit.metadata,
            score: hit.score,
            source: backend.into(),
        }
    }
}
