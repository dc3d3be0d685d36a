//! Paper Search - semantic retrieval over a fixed corpus of paper summaries.
//!
//! Given a free-text query, the library returns the most similar papers of a
//! pre-built corpus, filtered by a relevance threshold, plus a short
//! extractive digest of the results.
//!
//! # Architecture
//!
//! - **models**: Core data structures (PaperRecord, ScoredResult, ResultSet, CorpusManifest)
//! - **embedding**: The `Encoder` contract and the local fastembed encoder
//! - **index**: The immutable corpus index and its on-disk artifacts
//! - **query**: Cosine scoring, ranking and the search engine
//! - **digest**: Extractive summary of a result set
//! - **provider**: Source papers for corpus building
//! - **ingestion**: Offline corpus building
//!
//! # Workflow
//!
//! ## Offline corpus building
//!
//! 1. Read summarized papers (JSON Lines)
//! 2. Merge titles from the clustering output
//! 3. Encode every summary with the embedding model
//! 4. Write `embeddings.npy`, `metadata.json` and `manifest.json`
//!
//! ## Online search
//!
//! 1. Load and verify the corpus index once at startup
//! 2. Encode the query with the same model
//! 3. Score every paper by cosine similarity
//! 4. Keep results above the threshold, best first, at most top-k
//! 5. Digest the first sentences of the top results
//!
//! # Example
//!
//! ```ignore
//! use paper_search::{
//!     embedding::fastembed::FastEmbedEncoder,
//!     index::{CorpusIndex, CorpusPaths},
//!     query::{BruteForceSearchEngine, SearchConfig, SearchEngine},
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (index, _manifest) = CorpusIndex::load(&CorpusPaths::default())?;
//!     let encoder = FastEmbedEncoder::new("all-MiniLM-L6-v2", None)?;
//!     let engine = BruteForceSearchEngine::new(encoder, index, SearchConfig::default())?;
//!
//!     let results = engine.search("diffusion models for images").await?;
//!     println!("{}", engine.digest(&results));
//!     for result in &results {
//!         println!("{}: {:.3}", result.title, result.score);
//!     }
//!     Ok(())
//! }
//! ```

pub mod digest;
pub mod embedding;
pub mod index;
pub mod ingestion;
pub mod models;
pub mod provider;
pub mod query;

// Re-export commonly used types at the crate root
pub use embedding::Encoder;
pub use index::{CorpusIndex, CorpusIntegrityError, CorpusPaths};
pub use models::{CorpusManifest, PaperRecord, ResultSet, ScoredResult};
pub use query::{BruteForceSearchEngine, SearchConfig, SearchEngine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model name
pub const DEFAULT_EMBEDDING_MODEL: &str = embedding::fastembed::DEFAULT_MODEL_NAME;
