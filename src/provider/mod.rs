//! Paper provider module.
//!
//! Sources the raw paper records the corpus builder turns into an index.
//! Providers return papers without embeddings; encoding, deduplication and
//! alignment are the corpus builder's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod clusters;
pub mod jsonl;

/// Errors that can occur when fetching papers from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the data format
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A paper as produced by the summarization stage, before encoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourcePaper {
    /// Stable identifier of the paper
    pub paper_id: String,

    /// Summary text to embed; a blank summary cannot be indexed
    #[serde(default)]
    pub summary: String,

    /// Topic label from curation
    #[serde(default)]
    pub topic: Option<String>,

    /// Title, when the source already carries one
    #[serde(default)]
    pub title: Option<String>,
}

/// Trait for sourcing papers.
#[async_trait]
pub trait PaperProvider: Send + Sync {
    /// Fetch all available papers, in source order.
    async fn fetch_papers(&self) -> ProviderResult<Vec<SourcePaper>>;

    /// Number of papers available.
    async fn count_papers(&self) -> ProviderResult<usize> {
        self.fetch_papers().await.map(|papers| papers.len())
    }

    /// Human-readable name of this provider, for logging.
    fn name(&self) -> &str;
}
