//! FastEmbed encoder implementation.
//!
//! Runs sentence-embedding models locally through the fastembed library. The
//! default model is `all-MiniLM-L6-v2`, the model the reference corpus was
//! built with.

use super::{Encoder, EncoderError, EncoderResult};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Model identity used when none is configured.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// A fastembed model resolved from a configured model name.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    /// Canonical short name, recorded in corpus manifests
    pub name: &'static str,

    /// The fastembed model variant
    pub model: EmbeddingModel,

    /// Vector dimension produced by the model
    pub dimension: usize,
}

/// Resolve a configured model name to a fastembed model.
///
/// Accepts the short name (`all-MiniLM-L6-v2`) or the hub name
/// (`sentence-transformers/all-MiniLM-L6-v2`), case-insensitively.
///
/// # Errors
/// Returns `EncoderError::ConfigError` for names with no known model.
pub fn resolve_model(name: &str) -> EncoderResult<ModelSpec> {
    let short = name.trim().rsplit('/').next().unwrap_or_default().to_ascii_lowercase();

    let (name, model, dimension) = match short.as_str() {
        "all-minilm-l6-v2" => ("all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2, 384),
        "all-minilm-l12-v2" => ("all-MiniLM-L12-v2", EmbeddingModel::AllMiniLML12V2, 384),
        "bge-small-en-v1.5" => ("bge-small-en-v1.5", EmbeddingModel::BGESmallENV15, 384),
        "bge-base-en-v1.5" => ("bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15, 768),
        "bge-large-en-v1.5" => ("bge-large-en-v1.5", EmbeddingModel::BGELargeENV15, 1024),
        "nomic-embed-text-v1.5" => ("nomic-embed-text-v1.5", EmbeddingModel::NomicEmbedTextV15, 768),
        "paraphrase-multilingual-minilm-l12-v2" => (
            "paraphrase-multilingual-MiniLM-L12-v2",
            EmbeddingModel::ParaphraseMLMiniLML12V2,
            384,
        ),
        _ => {
            return Err(EncoderError::ConfigError(format!(
                "Unknown embedding model '{}'",
                name
            )))
        }
    };

    Ok(ModelSpec {
        name,
        model,
        dimension,
    })
}

/// Whether two configured names denote the same model.
///
/// Known names compare by their canonical form, so a hub name matches its
/// short name. Unknown names compare case-insensitively after stripping any
/// hub prefix.
pub fn same_model(a: &str, b: &str) -> bool {
    match (resolve_model(a), resolve_model(b)) {
        (Ok(a), Ok(b)) => a.name == b.name,
        _ => {
            let short = |name: &str| name.trim().rsplit('/').next().unwrap_or_default().to_ascii_lowercase();
            short(a) == short(b)
        }
    }
}

/// Local encoder backed by a fastembed `TextEmbedding` model.
#[derive(Clone)]
pub struct FastEmbedEncoder {
    /// The model instance (fastembed needs exclusive access per call)
    model: Arc<Mutex<TextEmbedding>>,

    /// Canonical model identity
    model_name: String,

    /// Expected dimension of the vectors
    embedding_dimension: usize,
}

impl FastEmbedEncoder {
    /// Load the named model, downloading it into `cache_dir` on first use.
    ///
    /// # Arguments
    /// * `model_name` - Short or hub name of the model (see [`resolve_model`])
    /// * `cache_dir` - Optional directory for the downloaded model files
    ///
    /// # Returns
    /// A new `FastEmbedEncoder` reporting the canonical model name
    ///
    /// # Errors
    /// Returns `EncoderError::ConfigError` if the name is unknown or the model
    /// cannot be initialized.
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>) -> EncoderResult<Self> {
        let spec = resolve_model(model_name)?;

        let mut init_options = TextInitOptions::new(spec.model.clone());
        if let Some(dir) = cache_dir {
            debug!(cache_dir = %dir.display(), "Using fastembed cache directory");
            init_options = init_options.with_cache_dir(dir);
        }

        let text_embedding = TextEmbedding::try_new(init_options).map_err(|e| {
            EncoderError::ConfigError(format!("Failed to initialize FastEmbed model: {}", e))
        })?;

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name: spec.name.to_string(),
            embedding_dimension: spec.dimension,
        })
    }
}

#[async_trait]
impl Encoder for FastEmbedEncoder {
    async fn encode(&self, text: &str) -> EncoderResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EncoderError::InvalidInput("Text cannot be empty".to_string()));
        }

        let mut model = self.model.lock().await;
        let embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EncoderError::BackendError(format!("Embedding generation failed: {}", e)))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EncoderError::Other("No embedding generated".to_string()))
    }

    async fn encode_batch(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EncoderError::InvalidInput("All texts must be non-empty".to_string()));
        }

        let mut model = self.model.lock().await;
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        model
            .embed(text_strings, None)
            .map_err(|e| EncoderError::BackendError(format!("Batch embedding generation failed: {}", e)))
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// TextEmbedding does not implement Debug
impl std::fmt::Debug for FastEmbedEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedEncoder")
            .field("model_name", &self.model_name)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}
