//! Encoder abstraction.
//!
//! An encoder maps a UTF-8 string to a fixed-dimension float vector using one
//! named embedding model. The rest of the system only relies on the contract
//! below:
//!
//! - the same text always yields the same vector for a given model identity;
//! - every vector has exactly [`Encoder::dimension`] components;
//! - the model used for queries is the model that built the corpus matrix.
//!
//! The last point cannot be verified from vectors alone. It is checked against
//! the corpus manifest when one is present (see [`crate::models::CorpusManifest`]).

pub mod fastembed;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during encoding.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// The model backend failed to produce vectors
    #[error("Encoder backend failed: {0}")]
    BackendError(String),

    /// Invalid input text (e.g., empty)
    #[error("Invalid input text: {0}")]
    InvalidInput(String),

    /// Configuration error (e.g., unknown model name)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Other unexpected errors
    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Trait for text encoders.
///
/// The trait is async so that remote or blocking model backends fit behind
/// the same seam. A call runs to completion; there is no partial result.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Encode one text into a vector of [`Self::dimension`] floats.
    async fn encode(&self, text: &str) -> EncoderResult<Vec<f32>>;

    /// Encode several texts, returning vectors in input order.
    async fn encode_batch(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>>;

    /// Number of components in every vector this encoder produces.
    fn dimension(&self) -> usize;

    /// Identity of the underlying model (e.g., "all-MiniLM-L6-v2").
    fn model_name(&self) -> &str;
}
