//! Vector Router CLI
//!
//! Operator front end for the dual-backend vector router. Builds both store
//! adapters from the resolved configuration, runs one command through the
//! router, prints the outcome as JSON, and drains background replication
//! before exiting.
//!
//! # Usage
//!
//! ```bash
//! # Store chunks (a JSON array of documents)
//! vector-router add chunks.json --knowledge-base kb-1
//!
//! # Similarity search against the configured primary
//! vector-router search "how do lifetimes work" -k 5 --threshold 0.3
//!
//! # Hybrid search, force Pinecone as primary for this run
//! vector-router --primary pinecone hybrid "borrow checker" --keyword-weight 0.4
//!
//! # Counters and backend statistics
//! RUST_LOG=debug vector-router stats
//! ```
//!
//! # Environment Variables
//!
//! - `VECTOR_ROUTER_CONFIG`: Config file path (default: `~/.config/vector-router/router.toml`)
//! - `VECTOR_ROUTER_*`, `PINECONE_API_KEY`, `OPENAI_API_KEY`: see the core config module
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{debug, info};

use vector_router_core::{
    load_config_from_path, BackendId, ConfigOverrides, Document, DocumentMetadata, HttpEmbedder,
    HybridSearchOptions, PgvectorBackend, PineconeBackend, RouterSettings, SearchOptions, VectorRouter,
};

/// Route vector store operations across pgvector and Pinecone
#[derive(Debug, Parser)]
#[command(name = "vector-router")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file path
    #[arg(long, global = true, env = "VECTOR_ROUTER_CONFIG")]
    config: Option<PathBuf>,

    /// Primary backend for this run (pgvector or pinecone)
    #[arg(long, global = true)]
    primary: Option<BackendId>,

    /// Never fall back to the secondary backend
    #[arg(long, global = true)]
    no_fallback: bool,

    /// Per-call timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// How long to wait for background replication before exiting
    #[arg(long, global = true, default_value_t = 10)]
    drain_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Store documents from a JSON file
    Add(AddArgs),

    /// Similarity search
    Search(SearchArgs),

    /// Keyword plus semantic search
    Hybrid(HybridArgs),

    /// Delete documents by id
    Delete(DeleteArgs),

    /// Router counters and backend statistics
    Stats,

    /// Print the resolved configuration
    Config,
}

#[derive(Debug, Args)]
struct AddArgs {
    /// JSON file holding an array of documents
    file: PathBuf,

    /// Knowledge base applied to documents that do not name one
    #[arg(long)]
    knowledge_base: Option<String>,
}

#[derive(Debug, Args)]
struct SearchArgs {
    /// Query text
    query: String,

    /// Maximum number of results
    #[arg(short, default_value_t = 10)]
    k: usize,

    /// Minimum similarity score
    #[arg(long)]
    threshold: Option<f32>,

    /// Restrict to one knowledge base
    #[arg(long)]
    knowledge_base: Option<String>,
}

#[derive(Debug, Args)]
struct HybridArgs {
    /// Query text
    query: String,

    /// Maximum number of results
    #[arg(short, default_value_t = 10)]
    k: usize,

    /// Keyword share of the score, 0.0 to 1.0
    #[arg(long, default_value_t = 0.3)]
    keyword_weight: f32,

    /// Restrict to one knowledge base
    #[arg(long)]
    knowledge_base: Option<String>,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    /// Ids to delete
    #[arg(required = true)]
    ids: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(primary) = self.primary {
            overrides = overrides.with_primary(primary);
        }
        if self.no_fallback {
            overrides = overrides.with_fallback_enabled(false);
        }
        if let Some(ms) = self.timeout_ms {
            overrides = overrides.with_call_timeout_ms(ms);
        }
        overrides
    }
}

/// Build both adapters and the router from resolved settings
fn build_router(settings: &RouterSettings) -> anyhow::Result<VectorRouter> {
    let embedder = HttpEmbedder::new(settings.embedding.clone()).context("failed to build embedding client")?;
    let pgvector =
        PgvectorBackend::new(settings.pgvector.clone(), Arc::new(embedder)).context("failed to build pgvector client")?;
    let pinecone = PineconeBackend::new(settings.pinecone.clone()).context("failed to build Pinecone client")?;

    Ok(VectorRouter::new(
        settings.router.clone(),
        Arc::new(pgvector),
        Arc::new(pinecone),
    ))
}

/// Resolved configuration with secrets reduced to whether they are set
fn describe_settings(settings: &RouterSettings) -> Value {
    json!({
        "source": settings.source().to_string(),
        "configFile": settings.config_file_path,
        "router": settings.router,
        "pgvector": {
            "baseUrl": settings.pgvector.base_url,
            "table": settings.pgvector.table,
            "apiKeySet": settings.pgvector.api_key.is_some(),
        },
        "pinecone": {
            "indexHost": settings.pinecone.index_host,
            "namespace": settings.pinecone.namespace,
            "apiKeySet": settings.pinecone.api_key.is_some(),
        },
        "embedding": {
            "baseUrl": settings.embedding.base_url,
            "model": settings.embedding.model,
            "apiKeySet": settings.embedding.api_key.is_some(),
        },
    })
}

async fn read_documents(path: &Path) -> anyhow::Result<Vec<Document>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a JSON array of documents", path.display()))
}

async fn run(command: Commands, settings: &RouterSettings, router: &VectorRouter) -> anyhow::Result<Value> {
    let output = match command {
        Commands::Add(args) => {
            let documents = read_documents(&args.file).await?;
            let shared = args.knowledge_base.map(|id| DocumentMetadata {
                knowledge_id: Some(id),
                ..Default::default()
            });
            let ids = router.add_documents(documents, shared).await?;
            json!({ "ids": ids })
        }
        Commands::Search(args) => {
            let mut options = SearchOptions::top_k(args.k);
            if let Some(threshold) = args.threshold {
                options = options.with_score_threshold(threshold);
            }
            if let Some(id) = args.knowledge_base {
                options = options.with_knowledge_base(id);
            }
            serde_json::to_value(router.search_similar(&args.query, &options).await)?
        }
        Commands::Hybrid(args) => {
            let mut options = HybridSearchOptions::top_k(args.k).with_keyword_weight(args.keyword_weight);
            options.knowledge_base_id = args.knowledge_base;
            serde_json::to_value(router.hybrid_search(&args.query, &options).await)?
        }
        Commands::Delete(args) => {
            router.delete_documents(&args.ids).await;
            json!({ "requested": args.ids.len() })
        }
        Commands::Stats => serde_json::to_value(router.statistics().await)?,
        Commands::Config => describe_settings(settings),
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vector_router=info".parse()?)
                .add_directive("vector_router_core=info".parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = load_config_from_path(cli.config.clone())
        .await
        .context("failed to load configuration")?;
    cli.overrides()
        .apply(&mut settings)
        .context("invalid command-line override")?;
    debug!(source = %settings.source(), primary = %settings.router.primary, "Configuration resolved");

    let router = build_router(&settings)?;
    let result = run(cli.command, &settings, &router).await;

    let report = router.shutdown(Duration::from_secs(cli.drain_secs)).await;
    info!(completed = report.completed, aborted = report.aborted, "Background work drained");

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
