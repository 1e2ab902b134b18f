//! Pinecone Backend Implementation
//!
//! Vector store backed by a Pinecone serverless index with integrated
//! embedding: records are upserted as text and Pinecone embeds them
//! server-side, so this adapter never computes vectors itself.
//!
//! # Pinecone API
//!
//! - `POST /records/namespaces/{ns}/upsert` - Upsert text records (NDJSON)
//! - `POST /records/namespaces/{ns}/search` - Search by text
//! - `POST /vectors/delete` - Delete by id
//! - `POST /describe_index_stats` - Index statistics
//!
//! Pinecone metadata only accepts strings, numbers, booleans, and lists of
//! strings. Anything else is stored as a JSON-encoded string.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::http;
use super::traits::VectorBackend;
use crate::document::{BackendHit, BackendId, Document, DocumentMetadata, SearchOptions};
use crate::error::{BackendError, BackendResult};

const ID: BackendId = BackendId::Pinecone;

/// Connection settings for the Pinecone index
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PineconeSettings {
    /// Index host, e.g. `https://docs-abc123.svc.us-east1-gcp.pinecone.io`
    pub index_host: String,
    /// API key
    pub api_key: Option<String>,
    /// Namespace holding the records
    pub namespace: String,
    /// Record field the index embeds
    pub text_field: String,
    /// Value sent as `X-Pinecone-API-Version`
    pub api_version: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for PineconeSettings {
    fn default() -> Self {
        Self {
            index_host: "http://localhost:5080".to_string(),
            api_key: None,
            namespace: "default".to_string(),
            text_field: "content".to_string(),
            api_version: "2025-04".to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: f32,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Pinecone index client
pub struct PineconeBackend {
    settings: PineconeSettings,
    http_client: reqwest::Client,
}

impl PineconeBackend {
    /// Create a new Pinecone backend
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(settings: PineconeSettings) -> BackendResult<Self> {
        let http_client = http::build_client(ID, Duration::from_millis(settings.timeout_ms))?;
        Ok(Self {
            settings,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        http::join_url(&self.settings.index_host, path)
    }

    fn namespace_url(&self, action: &str) -> String {
        self.url(&format!("records/namespaces/{}/{action}", self.settings.namespace))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> BackendResult<reqwest::Response> {
        http::send(ID, self.settings.timeout_ms, request).await
    }

    fn post(&self, url: String) -> reqwest::RequestBuilder {
        let mut request = self
            .http_client
            .post(url)
            .header("X-Pinecone-API-Version", &self.settings.api_version);
        if let Some(ref key) = self.settings.api_key {
            request = request.header("Api-Key", key);
        }
        request
    }

    /// Build one upsert record: id, text field, flattened metadata
    fn to_record(&self, document: &Document) -> Map<String, Value> {
        let mut record = Map::new();
        for (key, value) in document.metadata.to_json_map() {
            if let Some(value) = flatten_metadata_value(value) {
                record.insert(key, value);
            }
        }
        record.insert("_id".to_string(), Value::String(document.id_or_empty().to_string()));
        record.insert(self.settings.text_field.clone(), Value::String(document.content.clone()));
        record
    }

    fn from_hit(&self, hit: Hit) -> BackendHit {
        let mut fields = hit.fields;
        let content = match fields.remove(&self.settings.text_field) {
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        BackendHit {
            id: hit.id,
            content,
            metadata: DocumentMetadata::from_json_map(fields),
            score: hit.score,
        }
    }
}

/// Coerce a metadata value into something Pinecone will store
///
/// Nulls are dropped, string lists pass through, other lists and objects are
/// JSON-encoded.
fn flatten_metadata_value(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Some(value),
        Value::Array(ref items) if items.iter().all(Value::is_string) => Some(value),
        other => Some(Value::String(other.to_string())),
    }
}

#[async_trait]
impl VectorBackend for PineconeBackend {
    fn id(&self) -> BackendId {
        ID
    }

    async fn add(&self, documents: &[Document]) -> BackendResult<Vec<String>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut body = String::new();
        for document in documents {
            let line = serde_json::to_string(&self.to_record(document)).map_err(|e| {
                BackendError::InvalidResponse {
                    backend: ID,
                    message: format!("failed to encode record: {e}"),
                }
            })?;
            body.push_str(&line);
            body.push('\n');
        }

        let request = self
            .post(self.namespace_url("upsert"))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        self.send(request).await?;

        debug!(namespace = %self.settings.namespace, count = documents.len(), "Upserted records");
        Ok(documents.iter().map(|d| d.id_or_empty().to_string()).collect())
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> BackendResult<Vec<BackendHit>> {
        let mut search = json!({
            "inputs": { "text": query },
            "top_k": options.k,
        });
        if let Some(filter) = options.effective_filter() {
            search["filter"] = Value::Object(filter);
        }

        let response = self.send(self.post(self.namespace_url("search")).json(&json!({ "query": search }))).await?;
        let parsed: SearchResponse = http::json(ID, response).await?;

        let mut hits: Vec<BackendHit> = parsed.result.hits.into_iter().map(|h| self.from_hit(h)).collect();
        if let Some(min) = options.score_threshold {
            hits.retain(|h| h.score >= min);
        }
        hits.truncate(options.k);
        Ok(hits)
    }

    async fn delete(&self, ids: &[String]) -> BackendResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let body = json!({ "ids": ids, "namespace": self.settings.namespace });
        self.send(self.post(self.url("vectors/delete")).json(&body)).await?;

        debug!(namespace = %self.settings.namespace, count = ids.len(), "Deleted records");
        Ok(())
    }

    async fn statistics(&self) -> BackendResult<Value> {
        let response = self.send(self.post(self.url("describe_index_stats")).json(&json!({}))).await?;
        http::json(ID, response).await
    }
}
