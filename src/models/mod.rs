//! Core data models for the paper search system.
//!
//! This module contains the fundamental data structures shared across the
//! application: the per-paper metadata record loaded with the corpus, the
//! scored results produced per query, and the manifest that pins the
//! embedding model a corpus was built with.

use serde::{Deserialize, Serialize};

/// Prefix of the label used when a paper carries no title.
pub const FALLBACK_TITLE_PREFIX: &str = "Research Paper";

/// Metadata for one paper in the corpus.
///
/// Records are produced by the corpus pipeline and are immutable once loaded.
/// Position `i` of the metadata sequence always describes row `i` of the
/// embedding matrix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaperRecord {
    /// Stable identifier of the paper
    pub paper_id: String,

    /// Paper title, when the corpus pipeline could attach one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Extractive summary of the paper (the text that was embedded)
    pub summary: String,

    /// Topic label assigned during corpus curation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl PaperRecord {
    /// Create a record without title or topic.
    pub fn new(paper_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            title: None,
            summary: summary.into(),
            topic: None,
        }
    }

    /// Attach a title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The title to show for this paper.
    ///
    /// Falls back to `Research Paper {paper_id}` when the title is absent or
    /// blank.
    pub fn display_title(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("{} {}", FALLBACK_TITLE_PREFIX, self.paper_id),
        }
    }
}

/// A single search hit.
///
/// Built fresh for every query and never mutated afterwards. Only hits whose
/// score reached the relevance threshold are ever materialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredResult {
    /// Identifier of the matched paper
    pub paper_id: String,

    /// Title, or the fallback label when the record has none
    pub title: String,

    /// Summary text of the matched paper
    pub summary: String,

    /// Cosine similarity between the query and the paper (-1.0 to 1.0)
    pub score: f32,
}

impl ScoredResult {
    /// Create a result for `record` with the given similarity score.
    pub fn from_record(record: &PaperRecord, score: f32) -> Self {
        Self {
            paper_id: record.paper_id.clone(),
            title: record.display_title(),
            summary: record.summary.clone(),
            score,
        }
    }
}

/// Ranked hits for one query, highest score first, at most `top_k` long.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ResultSet {
    results: Vec<ScoredResult>,
}

impl ResultSet {
    /// An empty result set.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_ranked(results: Vec<ScoredResult>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, rank: usize) -> Option<&ScoredResult> {
        self.results.get(rank)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredResult> {
        self.results.iter()
    }

    pub fn as_slice(&self) -> &[ScoredResult] {
        &self.results
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ScoredResult;
    type IntoIter = std::slice::Iter<'a, ScoredResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Identity of the embedding model a corpus was built with.
///
/// Written next to the corpus artifacts so query-time encoding can be
/// checked against build-time encoding. Scores between vectors from two
/// different models are meaningless.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusManifest {
    /// Name/identifier of the embedding model (e.g., "all-MiniLM-L6-v2")
    pub model_name: String,

    /// Dimension of the embedding vectors
    pub dimension: usize,

    /// Number of papers in the corpus
    pub count: usize,
}
