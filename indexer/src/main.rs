use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use coursematch_core::cache::EmbeddingCache;
use coursematch_core::{Corpus, Embedder, Filters, Recommender, RecommenderConfig, ScoredResult};
use coursematch_embedder::{OpenAiConfig, OpenAiEmbedder, DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build course indices and run hybrid recommendations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct IndexArgs {
    /// Course records: JSON/JSONL file or a directory of them
    #[arg(long)]
    corpus: String,
    /// Directory holding the embedding cache
    #[arg(long, default_value = "./index")]
    index: String,
    /// Optional JSON file overriding BM25 and fusion settings
    #[arg(long)]
    config: Option<String>,
    /// OpenAI-compatible API base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    api_base: String,
    /// Embedding model id
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    /// Per-request timeout for the embedding provider
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// Retries for transient embedding failures
    #[arg(long, default_value_t = 3)]
    max_retries: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Build both indices and write the embedding cache
    Build {
        #[command(flatten)]
        index: IndexArgs,
        /// Discard an existing cache and embed the corpus again
        #[arg(long, default_value_t = false)]
        refresh_embeddings: bool,
    },
    /// Recommend courses for a free-text interest query
    Recommend {
        #[command(flatten)]
        index: IndexArgs,
        /// What the student is interested in
        #[arg(long)]
        query: String,
        /// Previously taken offerings, e.g. EN.601.220 (repeatable)
        #[arg(long = "previous")]
        previous: Vec<String>,
        /// Exact-match filter FIELD=VALUE, e.g. Level="Graduate" (repeatable)
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { index, refresh_embeddings } => build(&index, refresh_embeddings),
        Commands::Recommend { index, query, previous, filters, top_k, json } => {
            let filters: Filters = filters.into_iter().collect();
            recommend(&index, &query, &previous, &filters, top_k, json)
        }
    }
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    let (field, value) = s.split_once('=').ok_or_else(|| format!("expected FIELD=VALUE, got {s:?}"))?;
    if field.trim().is_empty() {
        return Err(format!("empty field name in {s:?}"));
    }
    Ok((field.trim().to_string(), value.to_string()))
}

fn embedder(args: &IndexArgs) -> Result<Arc<dyn Embedder>> {
    let config = OpenAiConfig {
        base_url: args.api_base.clone(),
        model: args.model.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        max_retries: args.max_retries,
        ..OpenAiConfig::from_env()
    };
    Ok(Arc::new(OpenAiEmbedder::new(config)?))
}

fn load(args: &IndexArgs) -> Result<(Corpus, RecommenderConfig)> {
    let corpus = Corpus::from_path(&args.corpus).with_context(|| format!("loading corpus from {}", args.corpus))?;
    let config = match &args.config {
        Some(path) => RecommenderConfig::from_path(path).with_context(|| format!("reading config {path}"))?,
        None => RecommenderConfig::default(),
    };
    Ok((corpus, config))
}

fn build(args: &IndexArgs, refresh_embeddings: bool) -> Result<()> {
    let start = Instant::now();
    let (corpus, config) = load(args)?;
    let cache = EmbeddingCache::new(&args.index);
    if refresh_embeddings && cache.exists() {
        tracing::info!(index = %args.index, "discarding existing embedding cache");
        cache.clear()?;
    }

    let recommender = Recommender::build(corpus, embedder(args)?, Some(&cache), config)?;
    let meta = cache.load_meta()?;
    tracing::info!(
        num_docs = recommender.corpus().len(),
        num_terms = recommender.lexical().num_terms(),
        dimension = meta.dimension,
        model = %meta.model,
        took_s = start.elapsed().as_secs_f64(),
        "index build complete"
    );
    Ok(())
}

fn recommend(args: &IndexArgs, query: &str, previous: &[String], filters: &Filters, top_k: usize, json: bool) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query is required");
    }
    let (corpus, config) = load(args)?;
    let cache = EmbeddingCache::new(&args.index);
    let recommender = Recommender::build(corpus, embedder(args)?, Some(&cache), config)?;
    let results = recommender.recommend(query, previous, filters, top_k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(query, &results);
    }
    Ok(())
}

fn print_results(query: &str, results: &[ScoredResult]) {
    println!("Interests: {query}");
    println!("Top {} recommendations:\n", results.len());
    for (i, r) in results.iter().enumerate() {
        let d = &r.document;
        println!("{}. {} ({} section {})", i + 1, d.title(), d.offering_id(), d.section_id());
        println!("   Department: {}", d.department());
        println!("   Instructor: {}", d.instructors());
        println!("   Level: {}", d.level());
        println!(
            "   Combined Score: {:.4} (BM25: {:.3}, Embedding: {:.3})",
            r.combined_score, r.bm25_score_norm, r.embedding_score_norm
        );
        let desc: String = d.description().chars().take(200).collect();
        if !desc.is_empty() {
            println!("   Description: {desc}...");
        }
        if let Some(p) = d.prerequisites.iter().find(|p| !p.description.is_empty()) {
            let prereq: String = p.description.chars().take(150).collect();
            println!("   Prerequisites: {prereq}...");
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filters() {
        assert_eq!(parse_filter("Level=Graduate").unwrap(), ("Level".to_string(), "Graduate".to_string()));
        assert_eq!(parse_filter("Department=EN Computer Science").unwrap().1, "EN Computer Science");
        assert!(parse_filter("Level").is_err());
        assert!(parse_filter("=x").is_err());
    }

    #[test]
    fn cli_accepts_repeated_flags() {
        let cli = Cli::try_parse_from([
            "indexer", "recommend", "--corpus", "c.json", "--query", "ml",
            "--previous", "EN.601.220", "--previous", "EN.601.226", "--filter", "Level=Graduate",
        ])
        .unwrap();
        match cli.command {
            Commands::Recommend { previous, filters, top_k, .. } => {
                assert_eq!(previous.len(), 2);
                assert_eq!(filters, vec![("Level".to_string(), "Graduate".to_string())]);
                assert_eq!(top_k, 10);
            }
            _ => panic!("expected recommend"),
        }
    }
}
