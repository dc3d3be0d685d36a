//! JSON Lines paper provider.
//!
//! Reads `papers_with_summary.jsonl`: one [`SourcePaper`] object per line.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::{PaperProvider, ProviderError, ProviderResult, SourcePaper};

/// Provider backed by a JSON Lines file, parsed once at construction.
#[derive(Debug, Clone)]
pub struct JsonlPaperProvider {
    name: String,
    papers: Vec<SourcePaper>,
}

impl JsonlPaperProvider {
    /// Read and parse `path`.
    ///
    /// # Errors
    /// Returns `ProviderError::IoError` if the file cannot be read and
    /// `ProviderError::ParseError` naming the first malformed line.
    pub async fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let papers = parse(&text)?;
        debug!(path = %path.display(), papers = papers.len(), "Parsed JSONL papers");

        Ok(Self {
            name: format!("jsonl:{}", path.display()),
            papers,
        })
    }
}

/// Parse JSON Lines text, skipping blank lines.
pub fn parse(text: &str) -> ProviderResult<Vec<SourcePaper>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line)
                .map_err(|e| ProviderError::ParseError(format!("line {}: {}", number + 1, e)))
        })
        .collect()
}

#[async_trait]
impl PaperProvider for JsonlPaperProvider {
    async fn fetch_papers(&self) -> ProviderResult<Vec<SourcePaper>> {
        Ok(self.papers.clone())
    }

    async fn count_papers(&self) -> ProviderResult<usize> {
        Ok(self.papers.len())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
