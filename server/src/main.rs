use anyhow::Result;
use axum::Router;
use clap::Parser;
use coursematch_core::RecommenderConfig;
use coursematch_embedder::{OpenAiConfig, OpenAiEmbedder, DEFAULT_BASE_URL, DEFAULT_MODEL};
use server::{build_app, AppState, IndexSource};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Course records: JSON/JSONL file or a directory of them
    #[arg(long)]
    corpus: PathBuf,
    /// Embedding cache directory
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Optional JSON file overriding BM25 and fusion settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// OpenAI-compatible API base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    api_base: String,
    /// Embedding model id
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    /// Per-request timeout for the embedding provider
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => RecommenderConfig::from_path(path)?,
        None => RecommenderConfig::default(),
    };
    let embedder_config = OpenAiConfig {
        base_url: args.api_base.clone(),
        model: args.model.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        ..OpenAiConfig::from_env()
    };

    // The embedding client blocks, so the initial build stays off the async workers.
    let (corpus_path, index) = (args.corpus.clone(), args.index.clone());
    let (source, recommender) = tokio::task::spawn_blocking(move || -> Result<_> {
        let source = IndexSource::new(corpus_path, Some(index), Arc::new(OpenAiEmbedder::new(embedder_config)?), config);
        let recommender = source.build()?;
        Ok((source, recommender))
    })
    .await??;

    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app: Router = build_app(AppState::new(recommender, source, admin_token));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
