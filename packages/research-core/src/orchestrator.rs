//! The planning state machine: `DECIDE -> (DIRECT | SEARCH_LOOP) -> FINAL`
//! (spec.md §4.7), single-owner of the digest list and the event channel
//! the transport layer drains.
//!
//! Grounded on the span density of the teacher's
//! `extraction/src/ingestors/http.rs::discover` and the channel-backed
//! streaming pattern in `server/src/server/routes/stream.rs`.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::llm_calls::{fallback_answer, no_results_answer, ResearchLanguageModel};
use crate::search::WebSearcher;
use crate::types::decision::InitialDecision;
use crate::types::digest::Digest;
use crate::types::event::{Event, FinalResponsePayload, InitMetadata, StepType};
use crate::types::outcome::{LlmResponseMeta, ResearchOutcome, ResponseMode};
use crate::types::query::{Query, SearchMode};
use crate::types::result::{dedupe_by_url, Link, SearchResultItem};

/// Iteration cap named in spec.md §3, §4.7.
pub const MAX_ITERATIONS: usize = crate::llm_calls::MAX_ITERATIONS;
/// `links` in the non-streaming response is capped at 10 (spec.md §6.3).
const MAX_RESPONSE_LINKS: usize = 10;

/// Ties the Search Engine Client and the LLM call sites together and
/// emits lifecycle [`Event`]s on an internal channel.
///
/// Lives for the duration of one request; never shared across requests
/// (spec.md §5).
pub struct Orchestrator {
    llm: Arc<dyn ResearchLanguageModel>,
    searcher: Arc<dyn WebSearcher>,
    events: mpsc::Sender<Event>,
    max_iterations: usize,
}

impl Orchestrator {
    /// Construct an orchestrator and the receiving half of its event
    /// channel. The transport layer drains the receiver to build an SSE
    /// stream, or drops it and awaits [`Orchestrator::run`] directly for
    /// the non-streaming route.
    ///
    /// Defaults the iteration cap to [`MAX_ITERATIONS`]; override with
    /// [`Orchestrator::with_max_iterations`] for a per-deployment value
    /// (spec.md §9: this is process configuration, not module-level
    /// mutable state).
    pub fn new(llm: Arc<dyn ResearchLanguageModel>, searcher: Arc<dyn WebSearcher>) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(128);
        (Self { llm, searcher, events: tx, max_iterations: MAX_ITERATIONS }, rx)
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    fn emit(&self, event: Event) {
        // The receiver may already be gone (transport closed the stream);
        // that's the cancellation path from spec.md §4.7, not an error.
        let _ = self.events.try_send(event);
    }

    fn emit_step(&self, step_type: StepType, message: impl Into<String>, iteration: Option<usize>) {
        self.emit(Event::Step {
            step_type,
            message: message.into(),
            iteration,
            timestamp: Utc::now(),
        });
    }

    /// Run one request to completion, emitting events throughout. On
    /// irrecoverable failure, emits a terminal `error` event and returns
    /// the causing error.
    pub async fn run(&self, query: &Query) -> Result<ResearchOutcome> {
        let started = Instant::now();
        self.emit(Event::Log {
            message: format!("starting research for \"{}\"", query.text),
            timestamp: Utc::now(),
        });
        self.emit(Event::Init {
            query: query.text.clone(),
            searches: Vec::new(),
            final_response: None,
            metadata: InitMetadata {
                search_mode: query.search_mode,
                model: self.llm.model_name(),
                iterations: 0,
                max_iterations: self.max_iterations,
                total_search_results: 0,
            },
        });

        let outcome = match self.decide(query).await {
            Decision::Direct(response) => self.direct(query, response, started).await,
            Decision::Search(seed_queries) => self.search_loop(query, seed_queries, started).await,
        };

        match &outcome {
            Ok(result) => self.emit(Event::Complete {
                result: serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
                execution_time_ms: started.elapsed().as_millis(),
                timestamp: Utc::now(),
            }),
            Err(e) => self.emit(Event::Error {
                error: e.to_string(),
                stack: None,
                timestamp: Utc::now(),
            }),
        }

        outcome
    }

    /// `DECIDE`: resolve the search mode into either a direct answer
    /// (already in hand, or to be fetched) or a seed query list.
    async fn decide(&self, query: &Query) -> Decision {
        match query.search_mode {
            SearchMode::Direct => Decision::Direct(None),
            SearchMode::Search => Decision::Search(vec![query.text.clone()]),
            SearchMode::Auto => {
                self.emit_step(StepType::InitialDecision, "deciding whether to search or answer directly", None);
                let decision = self.llm.initial_decision(&query.text, &query.overrides).await;
                self.emit(Event::Decision {
                    decision: decision.clone(),
                    timestamp: Utc::now(),
                });
                match decision {
                    InitialDecision::Direct { response } => Decision::Direct(Some(response)),
                    InitialDecision::Search { search_queries } => Decision::Search(search_queries),
                }
            }
        }
    }

    /// `DIRECT -> FINAL`: use the decision's response verbatim, or call
    /// the direct-answer LLM when no decision call happened at all
    /// (`search_mode == direct`).
    async fn direct(&self, query: &Query, response: Option<String>, started: Instant) -> Result<ResearchOutcome> {
        self.emit_step(StepType::FinalGeneration, "composing the final answer", None);

        let (answer, usage) = match response {
            Some(response) => (response, None),
            None => self.llm.direct_answer(&query.text, &query.overrides).await?,
        };

        self.emit(Event::FinalResponse {
            payload: FinalResponsePayload {
                response: answer.clone(),
                total_results: 0,
                search_iterations: 0,
                search_results: Vec::new(),
                searches: Vec::new(),
            },
            timestamp: Utc::now(),
        });

        Ok(ResearchOutcome {
            query: query.text.clone(),
            answer,
            search_results: None,
            search_summaries: Vec::new(),
            links: Vec::new(),
            llm_response: LlmResponseMeta {
                model: self.llm.model_name(),
                usage,
                processing_time_ms: started.elapsed().as_millis(),
                search_iterations: 0,
                total_search_queries: 0,
            },
            processing_time_ms: started.elapsed().as_millis(),
            timestamp: Utc::now(),
            mode: ResponseMode::Direct,
        })
    }

    /// `SEARCH_LOOP -> FINAL`: the iterative digest-and-decide loop,
    /// followed by final synthesis.
    async fn search_loop(&self, query: &Query, seed_queries: Vec<String>, started: Instant) -> Result<ResearchOutcome> {
        let mut digests: Vec<Digest> = Vec::new();
        let mut searches_performed: Vec<String> = Vec::new();
        let mut current_queries = seed_queries;
        let mut iterations_executed = 0usize;

        'iterations: for iteration in 0..self.max_iterations {
            iterations_executed = iteration + 1;
            self.emit_step(
                StepType::SearchIteration,
                format!("running search iteration {}", iteration + 1),
                Some(iteration),
            );

            let total_searches = current_queries.len();
            let mut queries_with_results = 0usize;

            for (query_index, search_query) in current_queries.clone().into_iter().enumerate() {
                self.emit(Event::Search {
                    term: search_query.clone(),
                    iteration,
                    search_index: query_index,
                    total_searches,
                    timestamp: Utc::now(),
                });

                match self.searcher.search(&search_query, query.fetch_content, query.timeout_sec).await {
                    Ok(outcome) => {
                        self.emit(Event::SearchResults {
                            term: search_query.clone(),
                            results_count: outcome.results.len(),
                            iteration,
                            timestamp: Utc::now(),
                        });

                        let summary = self.llm.digest(&search_query, &outcome.results, &query.text, &query.overrides).await;
                        let links = top_links(&outcome.results, 2);
                        digests.push(Digest::new(iteration, query_index, search_query.clone(), summary, links, outcome.results));
                        searches_performed.push(search_query);
                        queries_with_results += 1;
                    }
                    Err(e) => {
                        warn!(query = %search_query, error = %e, "search failed for this query, continuing");
                        self.emit(Event::Log {
                            message: format!("search failed for \"{search_query}\": {e}"),
                            timestamp: Utc::now(),
                        });
                    }
                }
            }

            if queries_with_results == 0 {
                debug!(iteration, "no query in this iteration yielded results, stopping the loop");
                break 'iterations;
            }

            self.emit_step(StepType::ContinuationCheck, "deciding whether another iteration is warranted", Some(iteration));
            let decision = self.llm.continuation(&query.text, &digests, iteration).await;
            let decision = if iteration == self.max_iterations - 1 {
                decision.force_stop_at_cap()
            } else {
                decision
            };

            self.emit(Event::Continuation {
                should_continue: decision.should_continue(),
                reasoning: decision.reason().to_string(),
                iteration,
                timestamp: Utc::now(),
            });

            if !decision.should_continue() {
                break 'iterations;
            }
            current_queries = decision.next_queries();
        }

        self.emit_step(StepType::SearchComplete, "search phase complete", None);
        self.emit_step(StepType::FinalGeneration, "composing the final answer", None);

        let (answer, usage) = if digests.is_empty() {
            (no_results_answer(), None)
        } else {
            match self.llm.synthesize(&query.text, &digests, &query.overrides).await {
                Ok((answer, usage)) => (answer, usage),
                Err(e) => {
                    warn!(error = %e, "final synthesis failed after retries, using fallback answer");
                    (fallback_answer(&digests), None)
                }
            }
        };

        let all_results = dedupe_by_url(flatten_results(&digests), |r| &r.url);
        let links = dedupe_by_url(flatten_links(&digests), |l| &l.url)
            .into_iter()
            .take(MAX_RESPONSE_LINKS)
            .collect::<Vec<_>>();
        let search_summaries = digests.iter().map(|d| d.summary.clone()).collect::<Vec<_>>();

        self.emit(Event::FinalResponse {
            payload: FinalResponsePayload {
                response: answer.clone(),
                total_results: all_results.len(),
                search_iterations: iterations_executed,
                search_results: all_results.clone(),
                searches: searches_performed.clone(),
            },
            timestamp: Utc::now(),
        });

        let mode = if iterations_executed > 1 || searches_performed.len() > 1 {
            ResponseMode::MultiSearch
        } else {
            ResponseMode::Search
        };

        Ok(ResearchOutcome {
            query: query.text.clone(),
            answer,
            search_results: Some(all_results),
            search_summaries,
            links,
            llm_response: LlmResponseMeta {
                model: self.llm.model_name(),
                usage,
                processing_time_ms: started.elapsed().as_millis(),
                search_iterations: iterations_executed,
                total_search_queries: searches_performed.len(),
            },
            processing_time_ms: started.elapsed().as_millis(),
            timestamp: Utc::now(),
            mode,
        })
    }
}

enum Decision {
    Direct(Option<String>),
    Search(Vec<String>),
}

fn flatten_results(digests: &[Digest]) -> Vec<SearchResultItem> {
    let mut ordered = digests.to_vec();
    ordered.sort_by_key(|d| d.order_key());
    ordered.into_iter().flat_map(|d| d.raw_results).collect()
}

fn flatten_links(digests: &[Digest]) -> Vec<Link> {
    let mut ordered = digests.to_vec();
    ordered.sort_by_key(|d| d.order_key());
    ordered.into_iter().flat_map(|d| d.links).collect()
}

fn top_links(results: &[SearchResultItem], n: usize) -> Vec<Link> {
    results
        .iter()
        .take(n)
        .map(|r| Link {
            title: r.title.clone(),
            url: r.url.clone(),
            snippet: r.description.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, SearchError};
    use crate::search::SearchOutcome;
    use crate::types::budget::BudgetState;
    use crate::types::decision::{ContinuationDecision, InitialDecision};
    use crate::types::query::PromptOverrides;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubLlm {
        initial: InitialDecision,
        continuation_calls: AtomicUsize,
        max_continuations: usize,
        synth_fails: bool,
    }

    #[async_trait]
    impl ResearchLanguageModel for StubLlm {
        fn model_name(&self) -> String {
            "groq:stub-model".to_string()
        }

        async fn initial_decision(&self, _query: &str, _overrides: &PromptOverrides) -> InitialDecision {
            self.initial.clone()
        }

        async fn direct_answer(&self, query: &str, _overrides: &PromptOverrides) -> std::result::Result<(String, Option<llm_client::Usage>), llm_client::LlmError> {
            Ok((format!("direct answer to {query}"), None))
        }

        async fn digest(&self, search_query: &str, _results: &[SearchResultItem], _original_query: &str, _overrides: &PromptOverrides) -> String {
            format!("digest for {search_query}")
        }

        async fn continuation(&self, _original_query: &str, _digests: &[Digest], _iteration: usize) -> ContinuationDecision {
            let call = self.continuation_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.max_continuations {
                ContinuationDecision::Continue {
                    cont: true,
                    reason: "need more".to_string(),
                    next_queries: vec!["follow up".to_string()],
                }
            } else {
                ContinuationDecision::stop("enough")
            }
        }

        async fn synthesize(&self, _original_query: &str, digests: &[Digest], _overrides: &PromptOverrides) -> std::result::Result<(String, Option<llm_client::Usage>), llm_client::LlmError> {
            if self.synth_fails {
                Err(llm_client::LlmError::ServiceUnavailable { status: 503 })
            } else {
                Ok((format!("synthesized from {} digests", digests.len()), None))
            }
        }
    }

    struct StubSearcher {
        fail_queries: Vec<String>,
        empty_queries: Vec<String>,
    }

    #[async_trait]
    impl WebSearcher for StubSearcher {
        async fn search(&self, query_text: &str, _fetch_content: bool, _timeout_sec: u64) -> std::result::Result<SearchOutcome, SearchError> {
            if self.fail_queries.iter().any(|q| q == query_text) {
                return Err(SearchError::SearchFailed {
                    query: query_text.to_string(),
                    cause: FetchError::Timeout { url: "https://html.duckduckgo.com/html/".to_string() },
                });
            }
            if self.empty_queries.iter().any(|q| q == query_text) {
                return Err(SearchError::NoResults { query: query_text.to_string() });
            }
            Ok(SearchOutcome {
                results: vec![SearchResultItem::new(format!("result for {query_text}"), format!("https://example.com/{query_text}"), "desc")],
                total_found: 1,
                processing_time_ms: 5,
                memory: BudgetState {
                    total_content_bytes: 0,
                    max_content_bytes: 1,
                    current_tokens: 0,
                    max_tokens: 1,
                    max_per_page_chars: 1,
                },
            })
        }
    }

    fn query(mode: SearchMode) -> Query {
        Query::new("what is rust?", "groq:llama-3.1-8b-instant").with_search_mode(mode)
    }

    #[tokio::test]
    async fn direct_mode_never_calls_the_searcher() {
        let llm = Arc::new(StubLlm {
            initial: InitialDecision::Direct { response: "unused".to_string() },
            continuation_calls: AtomicUsize::new(0),
            max_continuations: 0,
            synth_fails: false,
        });
        let searcher = Arc::new(StubSearcher { fail_queries: vec![], empty_queries: vec![] });
        let (orchestrator, _rx) = Orchestrator::new(llm, searcher);

        let outcome = orchestrator.run(&query(SearchMode::Direct)).await.unwrap();
        assert_eq!(outcome.mode, ResponseMode::Direct);
        assert!(outcome.answer.contains("direct answer"));
        assert!(outcome.search_results.is_none());
    }

    #[tokio::test]
    async fn auto_mode_direct_response_skips_search() {
        let llm = Arc::new(StubLlm {
            initial: InitialDecision::Direct { response: "4".to_string() },
            continuation_calls: AtomicUsize::new(0),
            max_continuations: 0,
            synth_fails: false,
        });
        let searcher = Arc::new(StubSearcher { fail_queries: vec![], empty_queries: vec![] });
        let (orchestrator, _rx) = Orchestrator::new(llm, searcher);

        let outcome = orchestrator.run(&query(SearchMode::Auto)).await.unwrap();
        assert_eq!(outcome.answer, "4");
        assert_eq!(outcome.mode, ResponseMode::Direct);
    }

    #[tokio::test]
    async fn search_mode_runs_until_continuation_says_stop() {
        let llm = Arc::new(StubLlm {
            initial: InitialDecision::Search { search_queries: vec!["what is rust?".to_string()] },
            continuation_calls: AtomicUsize::new(0),
            max_continuations: 1,
            synth_fails: false,
        });
        let searcher = Arc::new(StubSearcher { fail_queries: vec![], empty_queries: vec![] });
        let (orchestrator, _rx) = Orchestrator::new(llm, searcher);

        let outcome = orchestrator.run(&query(SearchMode::Search)).await.unwrap();
        assert_eq!(outcome.llm_response.search_iterations, 2);
        assert_eq!(outcome.mode, ResponseMode::MultiSearch);
        assert!(outcome.answer.contains("synthesized from"));
    }

    #[tokio::test]
    async fn continuation_is_force_stopped_at_the_iteration_cap() {
        let llm = Arc::new(StubLlm {
            initial: InitialDecision::Search { search_queries: vec!["q".to_string()] },
            continuation_calls: AtomicUsize::new(0),
            max_continuations: 100,
            synth_fails: false,
        });
        let searcher = Arc::new(StubSearcher { fail_queries: vec![], empty_queries: vec![] });
        let (orchestrator, _rx) = Orchestrator::new(llm, searcher);

        let outcome = orchestrator.run(&query(SearchMode::Search)).await.unwrap();
        assert_eq!(outcome.llm_response.search_iterations, MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn no_results_in_an_iteration_stops_the_loop_without_crashing() {
        let llm = Arc::new(StubLlm {
            initial: InitialDecision::Search { search_queries: vec!["bad query".to_string()] },
            continuation_calls: AtomicUsize::new(0),
            max_continuations: 0,
            synth_fails: false,
        });
        let searcher = Arc::new(StubSearcher { fail_queries: vec![], empty_queries: vec!["bad query".to_string()] });
        let (orchestrator, _rx) = Orchestrator::new(llm, searcher);

        let outcome = orchestrator.run(&query(SearchMode::Search)).await.unwrap();
        assert_eq!(outcome.answer, no_results_answer());
    }

    #[tokio::test]
    async fn synthesis_failure_falls_back_to_top_results() {
        let llm = Arc::new(StubLlm {
            initial: InitialDecision::Search { search_queries: vec!["q".to_string()] },
            continuation_calls: AtomicUsize::new(0),
            max_continuations: 0,
            synth_fails: true,
        });
        let searcher = Arc::new(StubSearcher { fail_queries: vec![], empty_queries: vec![] });
        let (orchestrator, _rx) = Orchestrator::new(llm, searcher);

        let outcome = orchestrator.run(&query(SearchMode::Search)).await.unwrap();
        assert!(outcome.answer.starts_with("AI processing failed"));
    }

    #[tokio::test]
    async fn a_failing_query_among_several_is_skipped_not_fatal() {
        let llm = Arc::new(StubLlm {
            initial: InitialDecision::Search { search_queries: vec!["good".to_string(), "bad".to_string()] },
            continuation_calls: AtomicUsize::new(0),
            max_continuations: 0,
            synth_fails: false,
        });
        let searcher = Arc::new(StubSearcher { fail_queries: vec!["bad".to_string()], empty_queries: vec![] });
        let (orchestrator, _rx) = Orchestrator::new(llm, searcher);

        let outcome = orchestrator.run(&query(SearchMode::Auto)).await.unwrap();
        assert_eq!(outcome.llm_response.total_search_queries, 1);
    }

    #[tokio::test]
    async fn events_are_emitted_in_the_documented_order_for_a_search_run() {
        let llm = Arc::new(StubLlm {
            initial: InitialDecision::Search { search_queries: vec!["q".to_string()] },
            continuation_calls: AtomicUsize::new(0),
            max_continuations: 0,
            synth_fails: false,
        });
        let searcher = Arc::new(StubSearcher { fail_queries: vec![], empty_queries: vec![] });
        let (orchestrator, mut rx) = Orchestrator::new(llm, searcher);

        let run = tokio::spawn(async move { orchestrator.run(&query(SearchMode::Search)).await });

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.kind());
        }
        run.await.unwrap().unwrap();

        assert_eq!(
            kinds,
            vec!["log", "init", "step", "search", "search_results", "step", "continuation", "step", "step", "final_response", "complete"]
        );
    }
}
