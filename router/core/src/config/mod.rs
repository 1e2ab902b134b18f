//! TOML Configuration File Support
//!
//! Loads router, backend, and embedding settings from
//! `~/.config/vector-router/router.toml`, environment variables, and CLI
//! overrides.
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [router]
//! primary = "pgvector"
//! fallback_enabled = true
//! auto_switch = true
//! max_latency_ms = 5000
//! max_error_rate = 0.1
//! cooldown_secs = 300
//! healthy_error_rate = 0.05
//! call_timeout_ms = 30000
//!
//! [pgvector]
//! url = "https://project.supabase.co"
//! table = "documents"
//!
//! [pinecone]
//! index_host = "https://docs-abc123.svc.us-east1-gcp.pinecone.io"
//! namespace = "default"
//!
//! [embedding]
//! model = "text-embedding-3-small"
//! ```
//!
//! Secrets are best left to the environment (`PINECONE_API_KEY`,
//! `OPENAI_API_KEY`, `VECTOR_ROUTER_PGVECTOR_KEY`).

use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{PgvectorSettings, PineconeSettings};
use crate::document::BackendId;
use crate::embedding::EmbeddingSettings;
use crate::routing::RouterConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the last applied configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[router]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterToml {
    /// `pgvector` or `pinecone`
    pub primary: Option<String>,
    /// Use the secondary on failure and replicate writes
    pub fallback_enabled: Option<bool>,
    /// Allow automatic primary re-election
    pub auto_switch: Option<bool>,
    /// Search latency budget in milliseconds
    pub max_latency_ms: Option<u64>,
    /// Primary error rate that allows re-election
    pub max_error_rate: Option<f64>,
    /// Minimum seconds between re-elections
    pub cooldown_secs: Option<u64>,
    /// Candidate error rate required for re-election
    pub healthy_error_rate: Option<f64>,
    /// Per-call timeout in milliseconds
    pub call_timeout_ms: Option<u64>,
}

/// `[pgvector]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PgvectorToml {
    /// PostgREST base URL
    pub url: Option<String>,
    /// Service key
    pub api_key: Option<String>,
    /// Chunk table
    pub table: Option<String>,
    /// Similarity RPC function
    pub match_function: Option<String>,
    /// Hybrid RPC function
    pub hybrid_function: Option<String>,
    /// HTTP timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// `[pinecone]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PineconeToml {
    /// Index host URL
    pub index_host: Option<String>,
    /// API key
    pub api_key: Option<String>,
    /// Namespace
    pub namespace: Option<String>,
    /// Field the index embeds
    pub text_field: Option<String>,
    /// API version header value
    pub api_version: Option<String>,
    /// HTTP timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// `[embedding]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingToml {
    /// OpenAI-compatible base URL
    pub base_url: Option<String>,
    /// Model name
    pub model: Option<String>,
    /// Bearer token
    pub api_key: Option<String>,
    /// Output dimensions
    pub dimensions: Option<u32>,
    /// HTTP timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterFileToml {
    /// Routing policy
    pub router: RouterToml,
    /// pgvector connection
    pub pgvector: PgvectorToml,
    /// Pinecone connection
    pub pinecone: PineconeToml,
    /// Embedding endpoint
    pub embedding: EmbeddingToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Everything needed to build a router and its backends
#[derive(Clone, Debug, PartialEq)]
pub struct RouterSettings {
    /// Routing policy
    pub router: RouterConfig,
    /// pgvector connection
    pub pgvector: PgvectorSettings,
    /// Pinecone connection
    pub pinecone: PineconeSettings,
    /// Embedding endpoint used by pgvector
    pub embedding: EmbeddingSettings,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            pgvector: PgvectorSettings::default(),
            pinecone: PineconeSettings::default(),
            embedding: EmbeddingSettings::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl RouterSettings {
    /// Get the source of the last applied value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check the routing policy for out-of-range values
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.router.validate().map_err(ConfigError::ValidationError)
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/vector-router/router.toml` or
/// `~/.config/vector-router/router.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("vector-router").join("router.toml"))
}

/// Load configuration from the default path and the process environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed,
/// or if the result fails validation. A missing file is not an error.
pub async fn load_config() -> Result<RouterSettings, ConfigError> {
    load_config_from_path(default_config_path()).await
}

/// Load configuration from a specific path and the process environment
///
/// # Errors
///
/// See [`load_config`].
pub async fn load_config_from_path(path: Option<PathBuf>) -> Result<RouterSettings, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok()).await
}

/// Load configuration with a custom environment lookup
///
/// # Errors
///
/// See [`load_config`].
pub async fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<RouterSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = RouterSettings::default();

    if let Some(config_path) = path {
        match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => {
                let toml_config: RouterFileToml = toml::from_str(&content)?;
                apply_toml_config(&mut config, &toml_config)?;
                config.source = ConfigSource::File;
                tracing::info!(path = %config_path.display(), "Loaded configuration from file");
                config.config_file_path = Some(config_path);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %config_path.display(), "Config file not found, using defaults");
            }
            Err(source) => {
                return Err(ConfigError::ReadError {
                    path: config_path,
                    source,
                });
            }
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut RouterSettings, toml: &RouterFileToml) -> Result<(), ConfigError> {
    // Routing policy
    let router = &toml.router;
    if let Some(ref primary) = router.primary {
        config.router.primary = primary
            .parse::<BackendId>()
            .map_err(|e| ConfigError::ValidationError(format!("router.primary: {e}")))?;
    }
    if let Some(enabled) = router.fallback_enabled {
        config.router.fallback_enabled = enabled;
    }
    if let Some(enabled) = router.auto_switch {
        config.router.auto_switch = enabled;
    }
    if let Some(ms) = router.max_latency_ms {
        config.router.performance_threshold.max_latency_ms = ms;
    }
    if let Some(rate) = router.max_error_rate {
        config.router.performance_threshold.max_error_rate = rate;
    }
    if let Some(secs) = router.cooldown_secs {
        config.router.switch_policy.cooldown_secs = secs;
    }
    if let Some(rate) = router.healthy_error_rate {
        config.router.switch_policy.healthy_error_rate = rate;
    }
    if let Some(ms) = router.call_timeout_ms {
        config.router.call_timeout_ms = ms;
    }

    // pgvector
    let pg = &toml.pgvector;
    if let Some(ref url) = pg.url {
        config.pgvector.base_url.clone_from(url);
    }
    if pg.api_key.is_some() {
        config.pgvector.api_key.clone_from(&pg.api_key);
    }
    if let Some(ref table) = pg.table {
        config.pgvector.table.clone_from(table);
    }
    if let Some(ref function) = pg.match_function {
        config.pgvector.match_function.clone_from(function);
    }
    if let Some(ref function) = pg.hybrid_function {
        config.pgvector.hybrid_function.clone_from(function);
    }
    if let Some(ms) = pg.timeout_ms {
        config.pgvector.timeout_ms = ms;
    }

    // Pinecone
    let pc = &toml.pinecone;
    if let Some(ref host) = pc.index_host {
        config.pinecone.index_host.clone_from(host);
    }
    if pc.api_key.is_some() {
        config.pinecone.api_key.clone_from(&pc.api_key);
    }
    if let Some(ref namespace) = pc.namespace {
        config.pinecone.namespace.clone_from(namespace);
    }
    if let Some(ref field) = pc.text_field {
        config.pinecone.text_field.clone_from(field);
    }
    if let Some(ref version) = pc.api_version {
        config.pinecone.api_version.clone_from(version);
    }
    if let Some(ms) = pc.timeout_ms {
        config.pinecone.timeout_ms = ms;
    }

    // Embedding
    let emb = &toml.embedding;
    if let Some(ref url) = emb.base_url {
        config.embedding.base_url.clone_from(url);
    }
    if let Some(ref model) = emb.model {
        config.embedding.model.clone_from(model);
    }
    if emb.api_key.is_some() {
        config.embedding.api_key.clone_from(&emb.api_key);
    }
    if emb.dimensions.is_some() {
        config.embedding.dimensions = emb.dimensions;
    }
    if let Some(ms) = emb.timeout_ms {
        config.embedding.timeout_ms = ms;
    }

    Ok(())
}

fn parse_flag(value: &str) -> bool {
    value != "0" && !value.eq_ignore_ascii_case("false") && !value.eq_ignore_ascii_case("off")
}

/// Apply environment variable overrides to the config
///
/// Unparseable values are logged and skipped.
fn apply_env_config<F>(config: &mut RouterSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = false;
    let mut string_var = |key: &str, target: &mut String| {
        if let Some(value) = env(key) {
            *target = value;
            applied = true;
        }
    };

    string_var("VECTOR_ROUTER_PGVECTOR_URL", &mut config.pgvector.base_url);
    string_var("VECTOR_ROUTER_PGVECTOR_TABLE", &mut config.pgvector.table);
    string_var("VECTOR_ROUTER_PINECONE_HOST", &mut config.pinecone.index_host);
    string_var("VECTOR_ROUTER_PINECONE_NAMESPACE", &mut config.pinecone.namespace);
    string_var("VECTOR_ROUTER_EMBEDDING_URL", &mut config.embedding.base_url);
    string_var("VECTOR_ROUTER_EMBEDDING_MODEL", &mut config.embedding.model);

    // Secrets
    for (key, target) in [
        ("VECTOR_ROUTER_PGVECTOR_KEY", &mut config.pgvector.api_key),
        ("PINECONE_API_KEY", &mut config.pinecone.api_key),
        ("OPENAI_API_KEY", &mut config.embedding.api_key),
    ] {
        if let Some(value) = env(key) {
            *target = Some(value);
            applied = true;
        }
    }

    // Routing policy
    if let Some(value) = env("VECTOR_ROUTER_PRIMARY") {
        match value.parse::<BackendId>() {
            Ok(primary) => {
                config.router.primary = primary;
                applied = true;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring VECTOR_ROUTER_PRIMARY"),
        }
    }
    if let Some(value) = env("VECTOR_ROUTER_FALLBACK") {
        config.router.fallback_enabled = parse_flag(&value);
        applied = true;
    }
    if let Some(value) = env("VECTOR_ROUTER_AUTO_SWITCH") {
        config.router.auto_switch = parse_flag(&value);
        applied = true;
    }
    for (key, target) in [
        ("VECTOR_ROUTER_MAX_LATENCY_MS", &mut config.router.performance_threshold.max_latency_ms),
        ("VECTOR_ROUTER_CALL_TIMEOUT_MS", &mut config.router.call_timeout_ms),
        ("VECTOR_ROUTER_COOLDOWN_SECS", &mut config.router.switch_policy.cooldown_secs),
    ] {
        if let Some(value) = env(key) {
            match value.parse::<u64>() {
                Ok(n) => {
                    *target = n;
                    applied = true;
                }
                Err(e) => tracing::warn!(key, error = %e, "Ignoring unparseable environment value"),
            }
        }
    }
    if let Some(value) = env("VECTOR_ROUTER_MAX_ERROR_RATE") {
        match value.parse::<f64>() {
            Ok(rate) => {
                config.router.performance_threshold.max_error_rate = rate;
                applied = true;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring VECTOR_ROUTER_MAX_ERROR_RATE"),
        }
    }

    if applied {
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Primary backend override
    pub primary: Option<BackendId>,
    /// Fallback override
    pub fallback_enabled: Option<bool>,
    /// Per-call timeout override (milliseconds)
    pub call_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set primary override
    #[must_use]
    pub fn with_primary(mut self, primary: BackendId) -> Self {
        self.primary = Some(primary);
        self
    }

    /// Set fallback override
    #[must_use]
    pub fn with_fallback_enabled(mut self, enabled: bool) -> Self {
        self.fallback_enabled = Some(enabled);
        self
    }

    /// Set call timeout override
    #[must_use]
    pub fn with_call_timeout_ms(mut self, ms: u64) -> Self {
        self.call_timeout_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the result is invalid.
    pub fn apply(&self, config: &mut RouterSettings) -> Result<(), ConfigError> {
        if self.primary.is_some() || self.fallback_enabled.is_some() || self.call_timeout_ms.is_some() {
            config.source = ConfigSource::Cli;
        }
        if let Some(primary) = self.primary {
            config.router.primary = primary;
        }
        if let Some(enabled) = self.fallback_enabled {
            config.router.fallback_enabled = enabled;
        }
        if let Some(ms) = self.call_timeout_ms {
            config.router.call_timeout_ms = ms;
        }
        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
