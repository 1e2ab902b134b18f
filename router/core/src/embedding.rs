//! Query and Document Embedding
//!
//! The pgvector store only holds vectors, so its adapter has to embed text on
//! the way in. The Pinecone index embeds server-side and never touches this
//! module.
//!
//! [`HttpEmbedder`] speaks the OpenAI-compatible `/embeddings` API, which also
//! covers Ollama, vLLM, LiteLLM, and most hosted gateways.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// OpenAI's per-request input limit
const MAX_BATCH: usize = 100;

/// Turns text into vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, reported in backend statistics
    fn model(&self) -> &str;

    /// Embed `texts`, returning one vector per input in input order
    async fn embed(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Embedding endpoint settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Bearer token (optional for local servers)
    pub api_key: Option<String>,
    /// Requested output dimensions, for models that support shortening
    pub dimensions: Option<u32>,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            dimensions: None,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// OpenAI-compatible embedding client
#[derive(Clone)]
pub struct HttpEmbedder {
    settings: EmbeddingSettings,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .finish_non_exhaustive()
    }
}

impl HttpEmbedder {
    /// Create a client from settings
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(settings: EmbeddingSettings) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()?;
        Ok(Self {
            settings,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.settings.base_url.trim_end_matches('/'))
    }

    async fn embed_batch(&self, batch: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.settings.model,
            input: batch,
            dimensions: self.settings.dimensions,
        };

        let mut request = self.http_client.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("embedding endpoint returned {status}: {text}");
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != batch.len() {
            anyhow::bail!(
                "embedding endpoint returned {} vectors for {} inputs",
                parsed.data.len(),
                batch.len()
            );
        }

        // Servers may answer out of order; `index` is authoritative when present
        if parsed.data.iter().all(|d| d.index.is_some()) {
            parsed.data.sort_by_key(|d| d.index);
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn embed(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            all.extend(self.embed_batch(batch).await?);
        }

        debug!(model = %self.settings.model, count = all.len(), "Computed embeddings");
        Ok(all)
    }
}
