//! Query processing and ranking module.
//!
//! Scores every paper of the corpus index against a query vector, orders the
//! scores, applies the relevance threshold and keeps the top-k.
//!
//! # Usage
//!
//! ```rust,no_run
//! use paper_search::embedding::fastembed::FastEmbedEncoder;
//! use paper_search::index::{CorpusIndex, CorpusPaths};
//! use paper_search::query::{BruteForceSearchEngine, SearchConfig, SearchEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (index, _manifest) = CorpusIndex::load(&CorpusPaths::default())?;
//! let encoder = FastEmbedEncoder::new("all-MiniLM-L6-v2", None)?;
//! let engine = BruteForceSearchEngine::new(encoder, index, SearchConfig::default())?;
//!
//! let results = engine.search("graph neural networks").await?;
//! for result in &results {
//!     println!("{} - Score: {:.3}", result.title, result.score);
//! }
//! println!("{}", engine.digest(&results));
//! # Ok(())
//! # }
//! ```
//!
//! Scoring is a full linear scan followed by a full sort. Ties are broken by
//! ascending corpus position, so the ordering is reproducible.

use std::cmp::Ordering;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::digest;
use crate::embedding::Encoder;
use crate::index::CorpusIndex;
use crate::models::{ResultSet, ScoredResult};

/// Default minimum similarity for a paper to be returned.
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.20;

/// Default maximum number of papers returned per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Errors that can occur during query processing.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Query encoding failed
    #[error("Encoder error: {0}")]
    EncoderError(String),

    /// Query vector and corpus vectors have different dimensions
    #[error("Dimension mismatch: corpus vectors have {expected} dimensions, query vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid search configuration
    #[error("Invalid search configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Selection parameters applied to every query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    /// Minimum cosine similarity for a result, in [-1, 1]
    pub relevance_threshold: f32,

    /// Maximum number of results, at least 1
    pub top_k: usize,
}

impl SearchConfig {
    /// Create a validated configuration.
    pub fn new(relevance_threshold: f32, top_k: usize) -> QueryResult<Self> {
        let config = Self {
            relevance_threshold,
            top_k,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the parameter ranges.
    pub fn validate(&self) -> QueryResult<()> {
        if !self.relevance_threshold.is_finite() || !(-1.0..=1.0).contains(&self.relevance_threshold) {
            return Err(QueryError::InvalidConfig(format!(
                "relevance threshold must be within [-1, 1], got {}",
                self.relevance_threshold
            )));
        }
        if self.top_k == 0 {
            return Err(QueryError::InvalidConfig("top_k must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Trait for search engines over a corpus.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Run `query` with the engine's own configuration.
    async fn search(&self, query: &str) -> QueryResult<ResultSet> {
        let config = *self.config();
        self.search_with(query, &config).await
    }

    /// Run `query` with an explicit configuration.
    ///
    /// A blank query, a zero query vector, or a query with nothing above the
    /// threshold yields an empty result set rather than an error.
    async fn search_with(&self, query: &str, config: &SearchConfig) -> QueryResult<ResultSet>;

    /// The configuration used by [`SearchEngine::search`].
    fn config(&self) -> &SearchConfig;

    /// Extractive digest of a result set.
    fn digest(&self, results: &ResultSet) -> String {
        digest::digest(results)
    }
}

/// Cosine similarity between two vectors of equal length.
///
/// Returns 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have the same length");

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_product / (norm_a * norm_b)
}

/// Rank every paper of `index` against `query_vector`.
///
/// # Errors
/// Returns `QueryError::DimensionMismatch` if the index is non-empty and the
/// query vector's length differs from the index dimension.
pub fn rank(index: &CorpusIndex, query_vector: &[f32], config: &SearchConfig) -> QueryResult<ResultSet> {
    if index.is_empty() {
        return Ok(ResultSet::empty());
    }
    if query_vector.len() != index.dimension() {
        return Err(QueryError::DimensionMismatch {
            expected: index.dimension(),
            actual: query_vector.len(),
        });
    }
    if query_vector.iter().all(|&x| x == 0.0) {
        debug!("Zero query vector, nothing can match");
        return Ok(ResultSet::empty());
    }

    let mut scored: Vec<(usize, f32)> = (0..index.len())
        .map(|i| {
            let score = cosine_similarity(query_vector, index.vector_row(i));
            // NaN sorts last and never passes the threshold
            (i, if score.is_nan() { f32::NEG_INFINITY } else { score })
        })
        .collect();

    scored.sort_unstable_by(|(pos_a, score_a), (pos_b, score_b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| pos_a.cmp(pos_b))
    });

    let results: Vec<ScoredResult> = scored
        .into_iter()
        .filter(|&(_, score)| score.is_finite() && score >= config.relevance_threshold)
        .take(config.top_k)
        .map(|(i, score)| ScoredResult::from_record(index.record_at(i), score))
        .collect();

    debug!(
        scanned = index.len(),
        returned = results.len(),
        threshold = config.relevance_threshold,
        "Ranking complete"
    );
    Ok(ResultSet::from_ranked(results))
}

/// Linear-scan search engine.
///
/// Owns the encoder and the corpus index for the lifetime of the process;
/// every query borrows both read-only.
pub struct BruteForceSearchEngine<E>
where
    E: Encoder,
{
    /// Encoder for query text (must be the model that built the index)
    encoder: E,

    /// The corpus being searched
    index: CorpusIndex,

    /// Default selection parameters
    config: SearchConfig,
}

impl<E> BruteForceSearchEngine<E>
where
    E: Encoder,
{
    /// Create a search engine.
    ///
    /// # Errors
    /// Returns `QueryError::InvalidConfig` for an invalid configuration and
    /// `QueryError::DimensionMismatch` when the encoder cannot produce vectors
    /// comparable with a non-empty index.
    pub fn new(encoder: E, index: CorpusIndex, config: SearchConfig) -> QueryResult<Self> {
        config.validate()?;
        if !index.is_empty() && encoder.dimension() != index.dimension() {
            return Err(QueryError::DimensionMismatch {
                expected: index.dimension(),
                actual: encoder.dimension(),
            });
        }
        Ok(Self {
            encoder,
            index,
            config,
        })
    }

    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }
}

#[async_trait]
impl<E> SearchEngine for BruteForceSearchEngine<E>
where
    E: Encoder,
{
    async fn search_with(&self, query: &str, config: &SearchConfig) -> QueryResult<ResultSet> {
        config.validate()?;
        if query.trim().is_empty() {
            return Ok(ResultSet::empty());
        }
        if self.index.is_empty() {
            return Ok(ResultSet::empty());
        }

        let query_vector = self
            .encoder
            .encode(query)
            .await
            .map_err(|e| QueryError::EncoderError(e.to_string()))?;

        rank(&self.index, &query_vector, config)
    }

    fn config(&self) -> &SearchConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::MockEncoder;
    use crate::index::EmbeddingMatrix;
    use crate::models::PaperRecord;

    fn create_index(vectors: Vec<Vec<f32>>) -> CorpusIndex {
        let records = (0..vectors.len())
            .map(|i| {
                PaperRecord::new(format!("p{}", i), format!("Summary of paper {}.", i))
                    .with_title(format!("Paper {}", i))
            })
            .collect();
        CorpusIndex::new(EmbeddingMatrix::from_rows(vectors).unwrap(), records).unwrap()
    }

    fn config(threshold: f32, top_k: usize) -> SearchConfig {
        SearchConfig::new(threshold, top_k).unwrap()
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]) - 0.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]) + 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[3.0, 4.0], &[6.0, 8.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_reflexivity_for_every_row() {
        let index = create_index(vec![vec![0.3, -1.2, 4.0], vec![1e-3, 2e-3, 0.0], vec![-7.0, 0.5, 0.5]]);
        for i in 0..index.len() {
            let score = cosine_similarity(index.vector_row(i), index.vector_row(i));
            assert!((score - 1.0).abs() < 1e-5, "row {} scored {}", i, score);
        }
    }

    #[test]
    fn test_search_config_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.relevance_threshold, 0.20);
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn test_search_config_validation() {
        assert!(SearchConfig::new(1.5, 5).is_err());
        assert!(SearchConfig::new(f32::NAN, 5).is_err());
        assert!(SearchConfig::new(0.2, 0).is_err());
        assert!(SearchConfig::new(-1.0, 1).is_ok());
    }

    #[test]
    fn test_threshold_scenario() {
        // A identical to the query, B at 0.5, C at 0.1
        let index = create_index(vec![
            vec![1.0, 0.0],
            vec![0.5, 0.75f32.sqrt()],
            vec![0.1, 0.99f32.sqrt()],
        ]);
        let results = rank(&index, &[1.0, 0.0], &config(0.2, 5)).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results.as_slice()[0].paper_id, "p0");
        assert!((results.as_slice()[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results.as_slice()[1].paper_id, "p1");
        assert!((results.as_slice()[1].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_scores_are_never_returned() {
        let index = create_index(vec![
            vec![f32::NAN, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![f32::INFINITY, 0.0],
            vec![-1.0, 0.0],
        ]);
        let results = rank(&index, &[1.0, 0.0], &config(-1.0, 5)).unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.paper_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p4"]);
        assert!(results.iter().all(|r| r.score.is_finite()));
        assert!((results.as_slice()[2].score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ties_break_by_position() {
        let index = create_index(vec![
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![1.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ]);
        let results = rank(&index, &[1.0, 1.0], &config(0.0, 5)).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.paper_id.as_str()).collect();

        // p1, p2, p4 tie at the top; p0 and p3 tie below them
        assert_eq!(ids, vec!["p1", "p2", "p4", "p0", "p3"]);
    }

    #[test]
    fn test_results_sorted_and_above_threshold() {
        let index = create_index(vec![
            vec![0.2, 0.9, 0.1],
            vec![0.9, 0.1, 0.3],
            vec![-0.5, 0.5, 0.0],
            vec![0.7, 0.7, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.6, 0.3, 0.2],
        ]);
        let config = config(0.25, 4);
        let results = rank(&index, &[1.0, 0.2, 0.1], &config).unwrap();

        assert!(results.len() <= 4);
        for pair in results.as_slice().windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(results.iter().all(|r| r.score >= config.relevance_threshold));
    }

    #[test]
    fn test_top_k_truncation() {
        let index = create_index(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![0.8, 0.2, 0.0],
            vec![0.7, 0.3, 0.0],
            vec![0.6, 0.4, 0.0],
        ]);
        let results = rank(&index, &[1.0, 0.0, 0.0], &config(0.2, 2)).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results.as_slice()[0].paper_id, "p0");
        assert_eq!(results.as_slice()[1].paper_id, "p1");
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let index = create_index(vec![vec![0.5, 0.5]; 8]);
        let first = rank(&index, &[0.3, 0.9], &config(0.2, 5)).unwrap();
        let second = rank(&index, &[0.3, 0.9], &config(0.2, 5)).unwrap();

        assert_eq!(first, second);
        let ids: Vec<&str> = first.iter().map(|r| r.paper_id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4"]);
    }

    #[test]
    fn test_zero_rows_and_zero_query() {
        let index = create_index(vec![vec![0.0, 0.0], vec![1.0, 0.0]]);

        let results = rank(&index, &[1.0, 0.0], &config(0.2, 5)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.as_slice()[0].paper_id, "p1");

        let results = rank(&index, &[0.0, 0.0], &config(-1.0, 5)).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_fallback_title() {
        let records = vec![PaperRecord::new("2301.1", "Summary.")];
        let index = CorpusIndex::new(EmbeddingMatrix::from_rows(vec![vec![1.0]]).unwrap(), records).unwrap();
        let results = rank(&index, &[1.0], &config(0.2, 5)).unwrap();

        assert_eq!(results.as_slice()[0].title, "Research Paper 2301.1");
    }

    #[test]
    fn test_rank_dimension_mismatch() {
        let index = create_index(vec![vec![1.0, 0.0]]);
        assert!(matches!(
            rank(&index, &[1.0, 0.0, 0.0], &config(0.2, 5)),
            Err(QueryError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[tokio::test]
    async fn test_search_scenario_through_encoder() {
        let index = create_index(vec![
            vec![1.0, 0.0],
            vec![0.5, 0.75f32.sqrt()],
            vec![0.1, 0.99f32.sqrt()],
        ]);
        let encoder = MockEncoder::new(2).with_vector("transformers", vec![1.0, 0.0]);
        let engine = BruteForceSearchEngine::new(encoder, index, SearchConfig::default()).unwrap();

        let results = engine.search("transformers").await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.paper_id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1"]);

        let again = engine.search("transformers").await.unwrap();
        assert_eq!(results, again);
    }

    #[tokio::test]
    async fn test_search_with_overrides_config() {
        let index = create_index(vec![vec![1.0, 0.0], vec![0.5, 0.75f32.sqrt()], vec![0.0, 1.0]]);
        let encoder = MockEncoder::new(2).with_vector("q", vec![1.0, 0.0]);
        let engine = BruteForceSearchEngine::new(encoder, index, SearchConfig::default()).unwrap();

        let results = engine.search_with("q", &config(0.0, 1)).await.unwrap();
        assert_eq!(results.len(), 1);

        let results = engine.search_with("q", &config(-1.0, 5)).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let engine =
            BruteForceSearchEngine::new(MockEncoder::new(4), CorpusIndex::empty(), SearchConfig::default()).unwrap();

        let results = engine.search("anything at all").await.unwrap();
        assert!(results.is_empty());
        assert_eq!(engine.digest(&results), "");
    }

    #[tokio::test]
    async fn test_blank_query_skips_encoder() {
        let index = create_index(vec![vec![1.0, 0.0]]);
        let engine = BruteForceSearchEngine::new(MockEncoder::new(2), index, SearchConfig::default()).unwrap();

        let results = engine.search("   ").await.unwrap();
        assert!(results.is_empty());
        assert!(engine.encoder().calls().is_empty());
    }

    #[tokio::test]
    async fn test_encoder_error_propagation() {
        let index = create_index(vec![vec![1.0, 0.0]]);
        let engine =
            BruteForceSearchEngine::new(MockEncoder::new(2).with_failure(), index, SearchConfig::default()).unwrap();

        match engine.search("test").await {
            Err(QueryError::EncoderError(_)) => {}
            other => panic!("Expected EncoderError, got {:?}", other),
        }
        // the index is untouched by a failed query
        assert_eq!(engine.index().len(), 1);
    }

    #[test]
    fn test_engine_rejects_encoder_dimension_mismatch() {
        let index = create_index(vec![vec![1.0, 0.0]]);
        assert!(matches!(
            BruteForceSearchEngine::new(MockEncoder::new(3), index, SearchConfig::default()),
            Err(QueryError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }
}
