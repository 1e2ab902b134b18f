//! pgvector Backend Implementation
//!
//! Vector store backed by a Postgres table with the pgvector extension,
//! reached through its PostgREST API (as exposed by Supabase and similar).
//!
//! # PostgREST API
//!
//! - `POST /rest/v1/{table}` - Insert chunks (content, metadata, embedding)
//! - `POST /rest/v1/rpc/{match_function}` - Cosine similarity search
//! - `POST /rest/v1/rpc/{hybrid_function}` - Full-text + vector search
//! - `DELETE /rest/v1/{table}?id=in.(...)` - Delete chunks
//! - `GET /rest/v1/{table}` with `Prefer: count=exact` - Row count
//!
//! The two RPC functions are SQL functions installed alongside the table.
//! They receive the query embedding computed here and a JSONB metadata filter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::http;
use super::traits::VectorBackend;
use crate::document::{BackendHit, BackendId, Document, DocumentMetadata, HybridSearchOptions, SearchOptions};
use crate::embedding::Embedder;
use crate::error::{BackendError, BackendResult};

const ID: BackendId = BackendId::Pgvector;

/// Connection settings for the pgvector store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PgvectorSettings {
    /// PostgREST base URL (without `/rest/v1`)
    pub base_url: String,
    /// Service key sent as `apikey` and bearer token
    pub api_key: Option<String>,
    /// Table holding the chunks
    pub table: String,
    /// RPC function for similarity search
    pub match_function: String,
    /// RPC function for hybrid search
    pub hybrid_function: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for PgvectorSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: None,
            table: "documents".to_string(),
            match_function: "match_documents".to_string(),
            hybrid_function: "hybrid_search".to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Serialize)]
struct InsertRow<'a> {
    id: &'a str,
    content: &'a str,
    metadata: &'a DocumentMetadata,
    embedding: &'a [f32],
}

#[derive(Deserialize)]
struct InsertedRow {
    id: Value,
}

#[derive(Deserialize)]
struct MatchRow {
    id: Value,
    content: String,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, Value>>,
    #[serde(alias = "score")]
    similarity: f32,
}

impl MatchRow {
    fn into_hit(self) -> BackendHit {
        BackendHit {
            id: id_to_string(self.id),
            content: self.content,
            metadata: DocumentMetadata::from_json_map(self.metadata.unwrap_or_default()),
            score: self.similarity,
        }
    }
}

fn id_to_string(id: Value) -> String {
    match id {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// PostgREST client for a pgvector table
pub struct PgvectorBackend {
    settings: PgvectorSettings,
    embedder: Arc<dyn Embedder>,
    http_client: reqwest::Client,
}

impl PgvectorBackend {
    /// Create a new pgvector backend
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(settings: PgvectorSettings, embedder: Arc<dyn Embedder>) -> BackendResult<Self> {
        let http_client = http::build_client(ID, Duration::from_millis(settings.timeout_ms))?;
        Ok(Self {
            settings,
            embedder,
            http_client,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> BackendResult<reqwest::Response> {
        http::send(ID, self.settings.timeout_ms, request).await
    }

    fn rest_url(&self, path: &str) -> String {
        http::join_url(&self.settings.base_url, &format!("rest/v1/{path}"))
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(ref key) = self.settings.api_key {
            if let Ok(value) = HeaderValue::from_str(key) {
                headers.insert("apikey", value);
            }
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {key}")) {
                headers.insert(reqwest::header::AUTHORIZATION, value);
            }
        }
        headers
    }

    async fn embed(&self, texts: &[&str]) -> BackendResult<Vec<Vec<f32>>> {
        let vectors = self
            .embedder
            .embed(texts)
            .await
            .map_err(|e| BackendError::Embedding {
                backend: ID,
                message: e.to_string(),
            })?;

        if vectors.len() != texts.len() {
            return Err(BackendError::InvalidResponse {
                backend: ID,
                message: format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                ),
            });
        }
        Ok(vectors)
    }

    async fn embed_query(&self, query: &str) -> BackendResult<Vec<f32>> {
        self.embed(&[query])
            .await?
            .pop()
            .ok_or_else(|| BackendError::InvalidResponse {
                backend: ID,
                message: "embedder returned no vector for the query".to_string(),
            })
    }

    async fn call_rpc(&self, function: &str, body: &Value) -> BackendResult<Vec<MatchRow>> {
        let request = self
            .http_client
            .post(self.rest_url(&format!("rpc/{function}")))
            .headers(self.auth_headers())
            .json(body);
        let response = self.send(request).await?;
        http::json(ID, response).await
    }
}

/// Keep hits at or above the threshold, best first, at most `k`
fn finish_hits(mut hits: Vec<BackendHit>, threshold: Option<f32>, k: usize) -> Vec<BackendHit> {
    if let Some(min) = threshold {
        hits.retain(|h| h.score >= min);
    }
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(k);
    hits
}

#[async_trait]
impl VectorBackend for PgvectorBackend {
    fn id(&self) -> BackendId {
        ID
    }

    fn supports_hybrid(&self) -> bool {
        true
    }

    async fn add(&self, documents: &[Document]) -> BackendResult<Vec<String>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let vectors = self.embed(&texts).await?;

        let rows: Vec<InsertRow<'_>> = documents
            .iter()
            .zip(&vectors)
            .map(|(doc, embedding)| InsertRow {
                id: doc.id_or_empty(),
                content: &doc.content,
                metadata: &doc.metadata,
                embedding,
            })
            .collect();

        let request = self
            .http_client
            .post(self.rest_url(&format!("{}?select=id", self.settings.table)))
            .headers(self.auth_headers())
            .header("Prefer", "return=representation")
            .json(&rows);
        let response = self.send(request).await?;
        let inserted: Vec<InsertedRow> = http::json(ID, response).await?;

        if inserted.len() != documents.len() {
            return Err(BackendError::InvalidResponse {
                backend: ID,
                message: format!("inserted {} rows for {} documents", inserted.len(), documents.len()),
            });
        }

        debug!(table = %self.settings.table, count = inserted.len(), "Inserted chunks");
        Ok(inserted.into_iter().map(|row| id_to_string(row.id)).collect())
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> BackendResult<Vec<BackendHit>> {
        let embedding = self.embed_query(query).await?;
        let body = json!({
            "query_embedding": embedding,
            "match_count": options.k,
            "match_threshold": options.score_threshold.unwrap_or(0.0),
            "filter": options.effective_filter().unwrap_or_default(),
        });

        let rows = self.call_rpc(&self.settings.match_function, &body).await?;
        let hits = rows.into_iter().map(MatchRow::into_hit).collect();
        Ok(finish_hits(hits, options.score_threshold, options.k))
    }

    async fn hybrid_search(&self, query: &str, options: &HybridSearchOptions) -> BackendResult<Vec<BackendHit>> {
        let embedding = self.embed_query(query).await?;
        let keyword_weight = options.clamped_keyword_weight();
        let body = json!({
            "query_text": query,
            "query_embedding": embedding,
            "match_count": options.k,
            "full_text_weight": keyword_weight,
            "semantic_weight": 1.0 - keyword_weight,
            "filter": options.effective_filter().unwrap_or_default(),
        });

        let rows = self.call_rpc(&self.settings.hybrid_function, &body).await?;
        let hits = rows.into_iter().map(MatchRow::into_hit).collect();
        Ok(finish_hits(hits, None, options.k))
    }

    async fn delete(&self, ids: &[String]) -> BackendResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        // PostgREST list syntax; quote ids so commas or parens inside them survive
        let list = ids
            .iter()
            .map(|id| format!("\"{}\"", id.replace('"', "\\\"")))
            .collect::<Vec<_>>()
            .join(",");

        let request = self
            .http_client
            .delete(self.rest_url(&self.settings.table))
            .headers(self.auth_headers())
            .query(&[("id", format!("in.({list})"))]);
        self.send(request).await?;

        debug!(table = %self.settings.table, count = ids.len(), "Deleted chunks");
        Ok(())
    }

    async fn statistics(&self) -> BackendResult<Value> {
        let request = self
            .http_client
            .get(self.rest_url(&self.settings.table))
            .headers(self.auth_headers())
            .query(&[("select", "id")])
            .header("Prefer", "count=exact")
            .header("Range", "0-0");
        let response = self.send(request).await?;

        // Content-Range: 0-0/1234 (or */0 for an empty table)
        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| BackendError::InvalidResponse {
                backend: ID,
                message: "missing or malformed Content-Range header".to_string(),
            })?;

        Ok(json!({
            "table": self.settings.table,
            "documentCount": total,
            "embeddingModel": self.embedder.model(),
            "hybridSearch": true,
        }))
    }
}
