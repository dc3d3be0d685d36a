//! Corpus building pipeline.
//!
//! Turns summarized source papers into the artifacts the search side loads:
//! an embedding matrix, the aligned metadata records, and a manifest naming
//! the model that produced the vectors.
//!
//! ```ignore
//! use paper_search::embedding::fastembed::FastEmbedEncoder;
//! use paper_search::index::CorpusPaths;
//! use paper_search::ingestion::CorpusBuilder;
//! use paper_search::provider::{jsonl::JsonlPaperProvider, PaperProvider};
//!
//! let encoder = FastEmbedEncoder::new("all-MiniLM-L6-v2", None)?;
//! let provider = JsonlPaperProvider::from_file("papers_with_summary.jsonl").await?;
//! let built = CorpusBuilder::new(encoder, None)
//!     .build(provider.fetch_papers().await?)
//!     .await?;
//! built.index.save(&CorpusPaths::default(), &built.manifest)?;
//! ```
//!
//! Records and rows are appended together, one paper at a time, so the
//! alignment the index requires holds by construction.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::embedding::Encoder;
use crate::index::{CorpusIndex, CorpusIntegrityError, EmbeddingMatrix, IndexError};
use crate::models::{CorpusManifest, PaperRecord};
use crate::provider::clusters::TitleMap;
use crate::provider::{PaperProvider, ProviderError, SourcePaper};

/// Default number of summaries encoded per batch.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Errors that can occur during corpus building.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Encoding failed
    #[error("Encoder error: {0}")]
    EncoderError(String),

    /// Provider operation failed
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    /// Assembling the corpus index failed
    #[error("Index error: {0}")]
    IndexError(#[from] IndexError),

    /// The encoder broke its output contract
    #[error("Invalid encoder output: {0}")]
    InvalidEncoderOutput(String),
}

impl From<CorpusIntegrityError> for IngestionError {
    fn from(err: CorpusIntegrityError) -> Self {
        IngestionError::IndexError(err.into())
    }
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Statistics from a corpus build.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionStats {
    /// Total number of input papers processed
    pub total_processed: usize,

    /// Number of papers added to the corpus
    pub inserted: usize,

    /// Number of papers skipped because their id was already seen
    pub duplicates_skipped: usize,

    /// Number of papers that could not be indexed (blank summary)
    pub failed: usize,

    /// Number of papers whose title came from the clusters file
    pub titles_merged: usize,
}

impl IngestionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_inserted(&mut self) {
        self.total_processed += 1;
        self.inserted += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.total_processed += 1;
        self.duplicates_skipped += 1;
    }

    pub fn record_failed(&mut self) {
        self.total_processed += 1;
        self.failed += 1;
    }
}

/// Output of a corpus build.
#[derive(Debug)]
pub struct BuiltCorpus {
    pub index: CorpusIndex,
    pub manifest: CorpusManifest,
    pub stats: IngestionStats,
}

/// Builds a corpus index from source papers.
pub struct CorpusBuilder<E>
where
    E: Encoder,
{
    /// Encoder for paper summaries (the model later used for queries)
    encoder: E,

    /// Number of summaries per `encode_batch` call
    batch_size: usize,

    /// Titles to attach by paper id
    titles: TitleMap,
}

impl<E> CorpusBuilder<E>
where
    E: Encoder,
{
    /// Create a builder. `batch_size` defaults to 64; zero is treated as 1.
    pub fn new(encoder: E, batch_size: Option<usize>) -> Self {
        Self {
            encoder,
            batch_size: batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
            titles: TitleMap::new(),
        }
    }

    /// Attach titles by paper id. A title here overrides the source title.
    pub fn with_titles(mut self, titles: TitleMap) -> Self {
        self.titles = titles;
        self
    }

    /// Build a corpus from `papers`.
    pub async fn build(&self, papers: Vec<SourcePaper>) -> IngestionResult<BuiltCorpus> {
        self.build_with_progress(papers, |_| {}).await
    }

    /// Build a corpus from everything `provider` returns.
    pub async fn build_from_provider<P>(&self, provider: &P) -> IngestionResult<BuiltCorpus>
    where
        P: PaperProvider,
    {
        let papers = provider.fetch_papers().await?;
        info!(provider = provider.name(), papers = papers.len(), "Fetched source papers");
        self.build(papers).await
    }

    /// Build a corpus, calling `on_batch` with the number of papers each
    /// encoded batch covered.
    pub async fn build_with_progress<F>(
        &self,
        papers: Vec<SourcePaper>,
        mut on_batch: F,
    ) -> IngestionResult<BuiltCorpus>
    where
        F: FnMut(usize) + Send,
    {
        let mut stats = IngestionStats::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut accepted: Vec<PaperRecord> = Vec::with_capacity(papers.len());

        for paper in papers {
            // A failed entry does not claim its id
            if paper.paper_id.trim().is_empty() || paper.summary.trim().is_empty() {
                warn!(paper_id = %paper.paper_id, "Skipping paper without id or summary");
                stats.record_failed();
                continue;
            }
            if !seen.insert(paper.paper_id.clone()) {
                debug!(paper_id = %paper.paper_id, "Skipping duplicate paper id");
                stats.record_duplicate();
                continue;
            }

            let mut record = PaperRecord {
                paper_id: paper.paper_id,
                title: paper.title,
                summary: paper.summary,
                topic: paper.topic,
            };
            if let Some(title) = self.titles.get(&record.paper_id) {
                record.title = Some(title.clone());
                stats.titles_merged += 1;
            }
            accepted.push(record);
        }

        let dimension = self.encoder.dimension();
        let mut rows: Vec<Vec<f32>> = Vec::with_capacity(accepted.len());

        for chunk in accepted.chunks(self.batch_size) {
            let texts: Vec<&str> = chunk.iter().map(|r| r.summary.as_str()).collect();
            let vectors = self
                .encoder
                .encode_batch(&texts)
                .await
                .map_err(|e| IngestionError::EncoderError(e.to_string()))?;

            if vectors.len() != chunk.len() {
                return Err(IngestionError::InvalidEncoderOutput(format!(
                    "{} vectors returned for {} texts",
                    vectors.len(),
                    chunk.len()
                )));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
                return Err(IngestionError::InvalidEncoderOutput(format!(
                    "vector of dimension {} from an encoder declaring {}",
                    bad.len(),
                    dimension
                )));
            }

            rows.extend(vectors);
            for _ in chunk {
                stats.record_inserted();
            }
            on_batch(chunk.len());
        }

        let matrix = if rows.is_empty() {
            EmbeddingMatrix::new(0, dimension, Vec::new())?
        } else {
            EmbeddingMatrix::from_rows(rows)?
        };
        let index = CorpusIndex::new(matrix, accepted)?;
        let manifest = CorpusManifest {
            model_name: self.encoder.model_name().to_string(),
            dimension,
            count: index.len(),
        };

        info!(
            inserted = stats.inserted,
            duplicates = stats.duplicates_skipped,
            failed = stats.failed,
            "Corpus build complete"
        );
        Ok(BuiltCorpus {
            index,
            manifest,
            stats,
        })
    }
}
