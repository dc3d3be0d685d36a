//! Paper titles from the topic-clustering output.
//!
//! `papers_clusters.json` maps each cluster id to the papers in it:
//! `{"0": [{"id": "...", "title": "..."}, ...], ...}`. Only the id/title pairs
//! are used here.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::{ProviderError, ProviderResult};

/// `paper_id -> title`.
pub type TitleMap = HashMap<String, String>;

#[derive(Debug, Deserialize)]
struct ClusterEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Read the title map from a clusters file.
pub async fn load_title_map(path: impl AsRef<Path>) -> ProviderResult<TitleMap> {
    let text = tokio::fs::read_to_string(path.as_ref()).await?;
    let titles = parse_title_map(&text)?;
    debug!(path = %path.as_ref().display(), titles = titles.len(), "Loaded cluster titles");
    Ok(titles)
}

/// Parse clusters JSON into a title map.
///
/// Entries without an id or with a blank title are skipped.
pub fn parse_title_map(text: &str) -> ProviderResult<TitleMap> {
    let clusters: HashMap<String, Vec<ClusterEntry>> = serde_json::from_str(text)
        .map_err(|e| ProviderError::ParseError(format!("clusters file: {}", e)))?;

    Ok(clusters
        .into_values()
        .flatten()
        .filter_map(|entry| match (entry.id, entry.title) {
            (Some(id), Some(title)) if !id.is_empty() && !title.trim().is_empty() => Some((id, title)),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_title_map() {
        let titles = parse_title_map(
            r#"{
                "0": [{"id": "a", "title": "Alpha", "abstract": "..."}, {"id": "b"}],
                "1": [{"title": "Orphan"}, {"id": "c", "title": "Gamma"}]
            }"#,
        )
        .unwrap();

        assert_eq!(titles.len(), 2);
        assert_eq!(titles["a"], "Alpha");
        assert_eq!(titles["c"], "Gamma");
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(
            parse_title_map("[1, 2]"),
            Err(ProviderError::ParseError(_))
        ));
    }
}
