//! Canned test doubles for [`crate::search::WebSearcher`] and
//! [`crate::llm_calls::ResearchLanguageModel`], for use by `service`'s
//! route tests and any other crate that wants an `Orchestrator` without
//! real network access.
//!
//! Grounded on the teacher's `mockall`/hand-rolled stub style in
//! `extraction/src/traits/searcher.rs`'s test module.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use llm_client::{LlmError, Usage};

use crate::error::SearchError;
use crate::llm_calls::ResearchLanguageModel;
use crate::search::{SearchOutcome, WebSearcher};
use crate::types::budget::BudgetState;
use crate::types::decision::{ContinuationDecision, InitialDecision};
use crate::types::digest::Digest;
use crate::types::query::PromptOverrides;
use crate::types::result::SearchResultItem;

/// A [`WebSearcher`] that returns a fixed, per-query canned result set
/// and records every query it was asked.
pub struct StubSearcher {
    results_by_query: HashMap<String, Vec<SearchResultItem>>,
    calls: Mutex<Vec<String>>,
}

impl StubSearcher {
    pub fn new() -> Self {
        Self {
            results_by_query: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_results(mut self, query: impl Into<String>, results: Vec<SearchResultItem>) -> Self {
        self.results_by_query.insert(query.into(), results);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for StubSearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSearcher for StubSearcher {
    async fn search(&self, query_text: &str, _fetch_content: bool, _timeout_sec: u64) -> std::result::Result<SearchOutcome, SearchError> {
        self.calls.lock().unwrap().push(query_text.to_string());

        match self.results_by_query.get(query_text) {
            Some(results) if !results.is_empty() => Ok(SearchOutcome {
                results: results.clone(),
                total_found: results.len(),
                processing_time_ms: 1,
                memory: BudgetState {
                    total_content_bytes: 0,
                    max_content_bytes: 1,
                    current_tokens: 0,
                    max_tokens: 1,
                    max_per_page_chars: 1,
                },
            }),
            _ => Err(SearchError::NoResults {
                query: query_text.to_string(),
            }),
        }
    }
}

/// A [`ResearchLanguageModel`] that returns a scripted initial decision
/// and mechanical digests/continuations/synthesis, so orchestrator tests
/// need not depend on a real provider.
pub struct StubLlm {
    pub model: String,
    pub initial: InitialDecision,
    pub continue_for_iterations: usize,
}

impl StubLlm {
    pub fn new(initial: InitialDecision) -> Self {
        Self {
            model: "groq:stub-model".to_string(),
            initial,
            continue_for_iterations: 0,
        }
    }

    pub fn continuing_for(mut self, iterations: usize) -> Self {
        self.continue_for_iterations = iterations;
        self
    }
}

#[async_trait]
impl ResearchLanguageModel for StubLlm {
    fn model_name(&self) -> String {
        self.model.clone()
    }

    async fn initial_decision(&self, _query: &str, _overrides: &PromptOverrides) -> InitialDecision {
        self.initial.clone()
    }

    async fn direct_answer(&self, query: &str, _overrides: &PromptOverrides) -> std::result::Result<(String, Option<Usage>), LlmError> {
        Ok((format!("direct answer to {query}"), None))
    }

    async fn digest(&self, search_query: &str, _results: &[SearchResultItem], _original_query: &str, _overrides: &PromptOverrides) -> String {
        format!("digest for {search_query}")
    }

    async fn continuation(&self, _original_query: &str, _digests: &[Digest], iteration: usize) -> ContinuationDecision {
        if iteration < self.continue_for_iterations {
            ContinuationDecision::Continue {
                cont: true,
                reason: "more needed".to_string(),
                next_queries: vec!["follow up".to_string()],
            }
        } else {
            ContinuationDecision::stop("enough gathered")
        }
    }

    async fn synthesize(&self, _original_query: &str, digests: &[Digest], _overrides: &PromptOverrides) -> std::result::Result<(String, Option<Usage>), LlmError> {
        Ok((format!("synthesized from {} digests", digests.len()), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_searcher_returns_configured_results_and_records_calls() {
        let searcher = StubSearcher::new().with_results("rust", vec![SearchResultItem::new("Rust", "https://rust-lang.org", "desc")]);
        let outcome = searcher.search("rust", false, 10).await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(searcher.calls(), vec!["rust"]);
    }

    #[tokio::test]
    async fn stub_searcher_errors_on_unconfigured_query() {
        let searcher = StubSearcher::new();
        let err = searcher.search("unknown", false, 10).await.unwrap_err();
        assert!(matches!(err, SearchError::NoResults { .. }));
    }

    #[tokio::test]
    async fn stub_llm_respects_the_scripted_initial_decision() {
        let llm = StubLlm::new(InitialDecision::Direct {
            response: "42".to_string(),
        });
        let decision = llm.initial_decision("what is 6*7?", &PromptOverrides::default()).await;
        assert_eq!(
            decision,
            InitialDecision::Direct {
                response: "42".to_string()
            }
        );
    }
}
