//! Typed errors for the research orchestrator.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors from the HTTP fetcher (search page and content fetches).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("dns or connect failure for {url}: {source}")]
    DnsOrConnect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("too many redirects for {url}")]
    TooManyRedirects { url: String },

    #[error("http status {status} for {url}: {reason}")]
    HttpStatus {
        url: String,
        status: u16,
        reason: String,
    },
}

/// Errors from a single search-engine query.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search failed for query {query:?}: {cause}")]
    SearchFailed { query: String, cause: FetchError },

    #[error("no extractable result blocks in search response for {query:?}")]
    NoResults { query: String },
}

/// Errors from the budget governor.
#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("insufficient memory: candidate of {requested} bytes rejected ({available} available)")]
    InsufficientMemory { requested: usize, available: usize },
}

/// Top-level orchestrator error.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Governor(#[from] GovernorError),

    #[error("llm error: {0}")]
    Llm(#[from] llm_client::LlmError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
pub type FetchResult<T> = std::result::Result<T, FetchError>;
pub type SearchResult<T> = std::result::Result<T, SearchError>;
