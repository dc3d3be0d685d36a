//! Ingestion pipeline binary entry point.
//!
//! Reads summarized papers, merges cluster titles, encodes every summary and
//! writes the corpus artifacts the search binary loads.
//!
//! # Examples
//!
//! Build the corpus with defaults:
//! ```bash
//! ingestion --input data/processed/papers_with_summary.jsonl
//! ```
//!
//! Merge titles from the clustering output:
//! ```bash
//! ingestion --input papers_with_summary.jsonl --clusters papers_clusters.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paper_search::{
    embedding::{fastembed::FastEmbedEncoder, Encoder},
    index::{CorpusPaths, DEFAULT_DATA_DIR},
    ingestion::{CorpusBuilder, DEFAULT_BATCH_SIZE},
    provider::{clusters, jsonl::JsonlPaperProvider, PaperProvider},
    DEFAULT_EMBEDDING_MODEL,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Ingestion pipeline CLI for building the paper search corpus
#[derive(Parser, Debug)]
#[command(
    name = "ingestion",
    version,
    about = "Build the paper search corpus",
    long_about = "Ingestion pipeline for encoding paper summaries and writing the corpus artifacts \
                  (embeddings.npy, metadata.json, manifest.json).

EXAMPLES:
  Build with defaults:
    ingestion --input papers_with_summary.jsonl

  Merge cluster titles:
    ingestion --input papers_with_summary.jsonl --clusters papers_clusters.json

  Custom model, batch size and logging:
    ingestion --input papers.jsonl --model bge-small-en-v1.5 --batch-size 32 --log-level debug"
)]
struct IngestionArgs {
    /// JSON Lines file of summarized papers
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Clusters JSON file supplying paper titles
    #[arg(long, value_name = "FILE")]
    clusters: Option<PathBuf>,

    /// Directory to write the corpus artifacts into
    #[arg(long, value_name = "DIR", default_value = DEFAULT_DATA_DIR)]
    output_dir: PathBuf,

    /// Embedding model name
    #[arg(long, value_name = "MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    model: String,

    /// Number of summaries per embedding batch
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Create the encoder named on the command line
fn create_encoder(args: &IngestionArgs) -> Result<FastEmbedEncoder> {
    let cache_dir = args.cache_dir.clone().unwrap_or_else(|| {
        dirs::cache_dir()
            .map(|p| p.join("fastembed"))
            .unwrap_or_else(|| PathBuf::from(".cache/fastembed"))
    });
    debug!("Using cache directory: {}", cache_dir.display());

    let encoder = FastEmbedEncoder::new(&args.model, Some(cache_dir))
        .context("Failed to initialize FastEmbed encoder")?;

    info!(
        "FastEmbed encoder initialized: model={}, dimension={}",
        encoder.model_name(),
        encoder.dimension()
    );
    Ok(encoder)
}

/// Create a progress bar for tracking encoding
fn create_progress_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} papers encoded")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );
    Ok(pb)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = IngestionArgs::parse();
    init_logging(&args.log_level);

    info!("Starting corpus ingestion");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let provider = JsonlPaperProvider::from_file(&args.input)
        .await
        .with_context(|| format!("Failed to load papers from {}", args.input.display()))?;
    let paper_count = provider.count_papers().await?;
    info!("Found {} papers from {}", paper_count, provider.name());

    let titles = match &args.clusters {
        Some(path) => clusters::load_title_map(path)
            .await
            .with_context(|| format!("Failed to load titles from {}", path.display()))?,
        None => {
            warn!("No clusters file given; papers without a title will use the fallback title");
            clusters::TitleMap::new()
        }
    };
    info!("Loaded {} cluster titles", titles.len());

    let encoder = create_encoder(&args)?;
    let builder = CorpusBuilder::new(encoder, Some(args.batch_size)).with_titles(titles);

    let progress = create_progress_bar(paper_count)?;
    let papers = provider.fetch_papers().await?;

    info!("Encoding summaries with batch_size={}...", args.batch_size);
    let built = builder
        .build_with_progress(papers, |n| progress.inc(n as u64))
        .await
        .context("Failed to build corpus")?;
    progress.finish_and_clear();

    if built.index.is_empty() {
        warn!("No papers were indexed; writing an empty corpus");
    }

    let paths = CorpusPaths::in_dir(&args.output_dir);
    built
        .index
        .save(&paths, &built.manifest)
        .with_context(|| format!("Failed to write corpus to {}", args.output_dir.display()))?;
    info!("Corpus written to {}", args.output_dir.display());

    let stats = &built.stats;
    let elapsed = start_time.elapsed();
    println!("\n╔════════════════════════════════════════╗");
    println!("║      Ingestion Completed               ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Total processed:      {:>16} ║", stats.total_processed);
    println!("║ Inserted:             {:>16} ║", stats.inserted);
    println!("║ Duplicates skipped:   {:>16} ║", stats.duplicates_skipped);
    println!("║ Failed:               {:>16} ║", stats.failed);
    println!("║ Titles merged:        {:>16} ║", stats.titles_merged);
    println!("║ Dimension:            {:>16} ║", built.manifest.dimension);
    println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");

    if stats.failed > 0 {
        warn!("{} papers had no summary and were skipped", stats.failed);
    }

    Ok(())
}
