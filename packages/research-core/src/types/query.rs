//! The inbound research query, normalized from the request body.

use serde::{Deserialize, Serialize};

/// How the orchestrator should decide between answering directly and
/// searching the web.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Let the initial-decision LLM call choose direct vs. search.
    Auto,
    /// Always search; seed the loop with the user's query verbatim.
    Search,
    /// Skip search entirely; answer from model knowledge.
    Direct,
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Auto
    }
}

/// Per-request prompt overrides (§6.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptOverrides {
    pub system_prompt_decision: Option<String>,
    pub system_prompt_direct: Option<String>,
    pub system_prompt_search: Option<String>,
    pub decision_template: Option<String>,
    pub search_template: Option<String>,
    /// Overrides the compact synthesis template used when more than 6
    /// results are in play (spec.md §4.6 item 4). Takes precedence over
    /// the built-in compact template; has no effect on the expanded one.
    pub synthesis_template: Option<String>,
}

/// A normalized, immutable research query.
///
/// Built once from the inbound request and never mutated for the life of
/// that request.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub limit: usize,
    pub fetch_content: bool,
    pub timeout_sec: u64,
    pub model: String,
    pub search_mode: SearchMode,
    pub overrides: PromptOverrides,
}

impl Query {
    /// Build a `Query` from the trimmed request text and defaults.
    ///
    /// `text` must be non-empty after trimming; callers are expected to
    /// have already validated this (see `service`'s request parsing).
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: 5,
            fetch_content: true,
            timeout_sec: 10,
            model: model.into(),
            search_mode: SearchMode::Auto,
            overrides: PromptOverrides::default(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_fetch_content(mut self, fetch_content: bool) -> Self {
        self.fetch_content = fetch_content;
        self
    }

    pub fn with_timeout_sec(mut self, timeout_sec: u64) -> Self {
        self.timeout_sec = timeout_sec;
        self
    }

    pub fn with_search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    pub fn with_overrides(mut self, overrides: PromptOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}
