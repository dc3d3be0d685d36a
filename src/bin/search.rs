//! Search binary entry point.
//!
//! Loads the corpus artifacts once, then answers a single query or runs an
//! interactive REPL. Each answer shows the topic digest followed by the
//! ranked papers.
//!
//! # Examples
//!
//! Single query with default settings:
//! ```bash
//! search --query "neural networks"
//! ```
//!
//! JSON output with a stricter threshold:
//! ```bash
//! search --query "transformers" --format json --threshold 0.35
//! ```
//!
//! Interactive mode:
//! ```bash
//! search --data-dir data/processed --interactive
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use paper_search::{
    embedding::{
        fastembed::{same_model, FastEmbedEncoder},
        Encoder,
    },
    index::{CorpusIndex, CorpusPaths, DEFAULT_DATA_DIR},
    models::{ResultSet, ScoredResult},
    query::{BruteForceSearchEngine, SearchConfig, SearchEngine},
    DEFAULT_EMBEDDING_MODEL,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format for search results
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-friendly digest and table
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Semantic search over the research-paper corpus
#[derive(Parser, Debug)]
#[command(
    name = "search",
    version,
    about = "Search research papers by meaning",
    long_about = "Query the paper corpus using semantic similarity. Supports both single-query \
                  and interactive modes.

EXAMPLES:
  Single query:
    search --query \"neural networks\"

  JSON output:
    search --query \"transformers\" --format json

  Interactive mode:
    search --interactive

  Ten results, any positive similarity:
    search --query \"reinforcement learning\" --top-k 10 --threshold 0.0"
)]
struct Args {
    /// Directory holding embeddings.npy, metadata.json and manifest.json
    #[arg(long, value_name = "DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Embedding matrix file (overrides --data-dir)
    #[arg(long, value_name = "PATH")]
    embeddings: Option<PathBuf>,

    /// Metadata file (overrides --data-dir)
    #[arg(long, value_name = "PATH")]
    metadata: Option<PathBuf>,

    /// Corpus manifest file (overrides --data-dir)
    #[arg(long, value_name = "PATH")]
    manifest: Option<PathBuf>,

    /// Embedding model; must be the model that built the corpus
    #[arg(long, value_name = "NAME", default_value = DEFAULT_EMBEDDING_MODEL)]
    model: String,

    /// Search query (omitted in interactive mode)
    #[arg(long, value_name = "TEXT", conflicts_with = "interactive")]
    query: Option<String>,

    /// Minimum cosine similarity for a result
    #[arg(long, value_name = "SCORE", default_value_t = paper_search::query::DEFAULT_RELEVANCE_THRESHOLD, allow_negative_numbers = true)]
    threshold: f32,

    /// Maximum number of results
    #[arg(long, value_name = "N", default_value_t = paper_search::query::DEFAULT_TOP_K)]
    top_k: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
}

impl Args {
    fn corpus_paths(&self) -> CorpusPaths {
        let defaults = CorpusPaths::in_dir(&self.data_dir);
        CorpusPaths {
            embeddings: self.embeddings.clone().unwrap_or(defaults.embeddings),
            metadata: self.metadata.clone().unwrap_or(defaults.metadata),
            manifest: self.manifest.clone().unwrap_or(defaults.manifest),
        }
    }
}

/// JSON shape of one answer
#[derive(Serialize)]
struct JsonAnswer<'a> {
    query: &'a str,
    digest: String,
    results: &'a ResultSet,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

/// Load the corpus and an encoder matching its manifest
fn create_engine(args: &Args) -> Result<BruteForceSearchEngine<FastEmbedEncoder>> {
    let config = SearchConfig::new(args.threshold, args.top_k).context("Invalid search settings")?;

    let paths = args.corpus_paths();
    let (index, manifest) = CorpusIndex::load(&paths).with_context(|| {
        format!(
            "Failed to load corpus from {} and {}.\n\
             Run the ingestion binary first to build the corpus.",
            paths.embeddings.display(),
            paths.metadata.display()
        )
    })?;

    let encoder = FastEmbedEncoder::new(&args.model, args.cache_dir.clone())
        .context("Failed to create FastEmbed encoder")?;

    if let Some(manifest) = &manifest {
        if !same_model(&manifest.model_name, encoder.model_name()) {
            anyhow::bail!(
                "Model mismatch: corpus was built with '{}' but queries would use '{}'.\n\
                 Pass --model {} to search this corpus.",
                manifest.model_name,
                encoder.model_name(),
                manifest.model_name
            );
        }
    }

    info!(
        "Using embedding model: {} (dimension: {}) over {} papers",
        encoder.model_name(),
        encoder.dimension(),
        index.len()
    );

    BruteForceSearchEngine::new(encoder, index, config).context("Encoder does not match the corpus")
}

/// Execute a search query and return results
async fn execute_search<E: Encoder>(
    engine: &BruteForceSearchEngine<E>,
    query_text: &str,
    config: &SearchConfig,
) -> Result<ResultSet> {
    debug!("Executing search for query: {}", query_text);

    engine
        .search_with(query_text, config)
        .await
        .with_context(|| format!("Failed to execute search for query: '{}'", query_text))
}

/// Format results as a table
fn format_results_table(results: &ResultSet) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("Relevance").add_attribute(Attribute::Bold),
        Cell::new("Summary").add_attribute(Attribute::Bold),
    ]);

    for (idx, result) in results.iter().enumerate() {
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(truncate(&result.title, 60)).fg(Color::Blue),
            Cell::new(&result.paper_id),
            Cell::new(format!("{:.3}", result.score)),
            Cell::new(truncate(&result.summary, 160)),
        ]);
    }

    table.to_string()
}

/// Shorten `text` to at most `max` characters
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Print one answer in the chosen format
fn print_answer<E: Encoder>(
    engine: &BruteForceSearchEngine<E>,
    query: &str,
    results: &ResultSet,
    format: OutputFormat,
    elapsed: std::time::Duration,
) -> Result<()> {
    let digest = engine.digest(results);

    match format {
        OutputFormat::Table => {
            if results.is_empty() {
                println!("\nNo highly relevant papers found. Try simpler keywords.");
                return Ok(());
            }
            if !digest.is_empty() {
                println!("\nTOPIC INSIGHTS");
                println!("{}", "─".repeat(30));
                println!("{}", digest);
                println!("{}", "─".repeat(30));
            }
            println!("\nTop {} Matches:", results.len());
            println!("{}", format_results_table(results));
            println!("\nFound {} results in {:.2}s", results.len(), elapsed.as_secs_f64());
        }
        OutputFormat::Json => {
            let answer = JsonAnswer {
                query,
                digest,
                results,
            };
            let json = serde_json::to_string_pretty(&answer).context("Failed to serialize results to JSON")?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Display detailed view of a single result
fn display_result_detail(result: &ScoredResult, rank: usize) {
    println!("\n{}", "═".repeat(80));
    println!("Rank: {}", rank);
    println!("Title: {}", result.title);
    println!("ID: {}", result.paper_id);
    println!("Relevance: {:.3}", result.score);
    println!("\nSummary:\n{}", result.summary);
    println!("{}", "═".repeat(80));
}

fn print_help() {
    println!("Commands:");
    println!("  <query>          - Search for papers");
    println!("  /top N           - Set number of results to N");
    println!("  /threshold X     - Set the relevance threshold (-1.0 to 1.0)");
    println!("  /format table    - Use table output format");
    println!("  /format json     - Use JSON output format");
    println!("  /detail N        - Show full details for result rank N");
    println!("  /help            - Show this help");
    println!("  exit, quit       - Exit (Ctrl+D or Ctrl+C also work)");
}

/// Run interactive REPL mode
async fn run_interactive<E: Encoder>(
    engine: BruteForceSearchEngine<E>,
    mut format: OutputFormat,
) -> Result<()> {
    let mut config = *engine.config();

    println!("{}", "=".repeat(60));
    println!("      SEMANTIC RESEARCH PAPER SEARCH");
    println!("{}", "=".repeat(60));
    println!(
        "Threshold: {:.2} | Top-k: {} | Dataset: {} papers",
        config.relevance_threshold,
        config.top_k,
        engine.index().len()
    );
    println!("Similarity scores show how well papers match your intent.");
    println!("{}", "=".repeat(60));
    print_help();
    println!();

    let mut rl = DefaultEditor::new().context("Failed to create readline editor")?;
    let mut last_results = ResultSet::empty();

    loop {
        match rl.readline("Search> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                    break;
                }

                rl.add_history_entry(line).ok();

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match parts[0] {
                        "/help" => print_help(),
                        "/top" => match parts.get(1).map(|n| n.parse::<usize>()) {
                            Some(Ok(n)) if n > 0 && parts.len() == 2 => {
                                config.top_k = n;
                                println!("Set top-k to {}", n);
                            }
                            _ => eprintln!("Usage: /top N  (N must be a positive integer)"),
                        },
                        "/threshold" => match parts.get(1).map(|x| x.parse::<f32>()) {
                            Some(Ok(x)) if parts.len() == 2 => {
                                let candidate = SearchConfig {
                                    relevance_threshold: x,
                                    ..config
                                };
                                match candidate.validate() {
                                    Ok(()) => {
                                        config = candidate;
                                        println!("Set threshold to {:.2}", x);
                                    }
                                    Err(e) => eprintln!("{}", e),
                                }
                            }
                            _ => eprintln!("Usage: /threshold X"),
                        },
                        "/format" => match parts.get(1).copied() {
                            Some("table") => {
                                format = OutputFormat::Table;
                                println!("Set output format to table");
                            }
                            Some("json") => {
                                format = OutputFormat::Json;
                                println!("Set output format to JSON");
                            }
                            _ => eprintln!("Usage: /format [table|json]"),
                        },
                        "/detail" => match parts.get(1).map(|n| n.parse::<usize>()) {
                            Some(Ok(rank)) if rank > 0 && rank <= last_results.len() => {
                                if let Some(result) = last_results.get(rank - 1) {
                                    display_result_detail(result, rank);
                                }
                            }
                            Some(Ok(rank)) => eprintln!(
                                "Rank {} out of range (last search had {} results)",
                                rank,
                                last_results.len()
                            ),
                            _ => eprintln!("Usage: /detail N"),
                        },
                        other => eprintln!("Unknown command: {}. Type /help for available commands.", other),
                    }
                    continue;
                }

                println!("\nSearching...");
                let start = Instant::now();
                match execute_search(&engine, line, &config).await {
                    Ok(results) => {
                        if let Err(e) = print_answer(&engine, line, &results, format, start.elapsed()) {
                            eprintln!("Error printing results: {:#}", e);
                        }
                        last_results = results;
                    }
                    Err(e) => eprintln!("\nUnexpected error: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    println!("\nExiting search. Keep exploring!");
    Ok(())
}

/// Run single-query mode
async fn run_single_query<E: Encoder>(
    engine: BruteForceSearchEngine<E>,
    query: &str,
    format: OutputFormat,
) -> Result<()> {
    let start = Instant::now();
    let results = execute_search(&engine, query, engine.config()).await?;
    print_answer(&engine, query, &results, format, start.elapsed())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level);

    let query = match (&args.query, args.interactive) {
        (Some(query), false) => Some(query.clone()),
        (None, true) => None,
        _ => anyhow::bail!(
            "Either --query or --interactive must be specified.\n\
             Use --help for usage information."
        ),
    };

    let engine = create_engine(&args)?;

    match query {
        Some(query) => run_single_query(engine, &query, args.format).await,
        None => run_interactive(engine, args.format).await,
    }
}
