//! The non-streaming response shape (spec.md §6.3).

use chrono::{DateTime, Utc};
use llm_client::Usage;
use serde::{Deserialize, Serialize};

use super::result::{Link, SearchResultItem};

/// Which branch of the state machine produced this outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Direct,
    Search,
    #[serde(rename = "multi-search")]
    MultiSearch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponseMeta {
    pub model: String,
    pub usage: Option<Usage>,
    #[serde(rename = "processingTime")]
    pub processing_time_ms: u128,
    #[serde(rename = "searchIterations")]
    pub search_iterations: usize,
    #[serde(rename = "totalSearchQueries")]
    pub total_search_queries: usize,
}

/// The full result of one request, as returned by the non-streaming
/// route and carried inside the `complete` event's `result` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub query: String,
    pub answer: String,
    /// `None` (serializes to `null`) for direct-mode answers (spec.md §6.3
    /// scenario 1); `Some` for every search-driven response, possibly empty.
    #[serde(rename = "searchResults")]
    pub search_results: Option<Vec<SearchResultItem>>,
    #[serde(rename = "searchSummaries")]
    pub search_summaries: Vec<String>,
    /// Deduplicated by URL, capped at 10 (spec.md §6.3).
    pub links: Vec<Link>,
    #[serde(rename = "llmResponse")]
    pub llm_response: LlmResponseMeta,
    #[serde(rename = "processingTimeMs")]
    pub processing_time_ms: u128,
    pub timestamp: DateTime<Utc>,
    pub mode: ResponseMode,
}
