//! The `Result` entity: one discovered page plus scoring and optional content.

use serde::{Deserialize, Serialize};

/// A single search result, as produced by the Search Engine Client and
/// optionally enriched with fetched/compressed content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub title: String,
    pub url: String,
    pub description: String,
    pub score: i64,

    /// The engine's own relevance score, if it provided one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_score: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_time_ms: Option<u64>,
}

impl SearchResultItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            description: description.into(),
            score: 0,
            engine_score: None,
            content: None,
            content_length: None,
            truncated: None,
            original_length: None,
            content_error: None,
            fetch_time_ms: None,
        }
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }
}

/// A `{title, url, snippet}` link, as surfaced in a `Digest`'s top links
/// and the response's deduplicated `links` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Deduplicate a list of results/links by exact URL match, keeping the
/// first occurrence (spec.md §3 invariant: `Result.url` unique per query;
/// §6.3: `links` deduplicated by URL).
pub fn dedupe_by_url<T, F: Fn(&T) -> &str>(items: Vec<T>, url_of: F) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(url_of(item).to_string()))
        .collect()
}
