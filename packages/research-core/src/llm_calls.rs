//! The four LLM call sites named in spec.md §4.6: initial decision,
//! per-query digest, continuation decision, and final synthesis.
//!
//! Grounded on the teacher's `OpenAIClient` chat-completion wiring,
//! generalized onto [`llm_client::LlmClient`]'s provider-routed client
//! and retried with [`llm_client::RetryManager`].

use async_trait::async_trait;
use llm_client::{ChatRequest, LlmClient, LlmError, Message, Provider, RetryManager, Usage};

use crate::search::ContentSummarizer;
use crate::types::decision::{ContinuationDecision, InitialDecision};
use crate::types::digest::Digest;
use crate::types::query::PromptOverrides;
use crate::types::result::SearchResultItem;

const DEFAULT_DECISION_SYSTEM_PROMPT: &str = "You decide whether a question can be answered from memory or needs a \
web search. Search whenever freshness, location, time, or current events are implicated. \
Respond with exactly one JSON object: either {\"response\": \"...\"} to answer directly, or \
{\"search_queries\": [\"q1\", \"q2\", \"q3\"]} with 1 to 3 search queries. No other text.";

const DEFAULT_DIRECT_SYSTEM_PROMPT: &str = "Answer the user's question directly and concisely from your own knowledge.";

const DEFAULT_SEARCH_SYSTEM_PROMPT: &str = "Summarize the search results relevant to the original question in 2 to 4 \
sentences. Be factual and specific.";

const DEFAULT_CONTINUATION_SYSTEM_PROMPT: &str = "Decide whether another round of web search is needed to answer the \
original question. Respond with exactly one JSON object: {\"continue\": false, \"reason\": \"...\"} or \
{\"continue\": true, \"reason\": \"...\", \"next_queries\": [\"...\"]} with at most 2 next queries.";

const DEFAULT_SYNTHESIS_SYSTEM_PROMPT: &str = "Synthesize a final answer to the original question using the provided \
search digests. Cite sources inline as URLs for every factual claim.";

/// Iteration cap named in spec.md §3, §4.7.
pub const MAX_ITERATIONS: usize = 3;
/// Response token reserve subtracted from `maxTokens` when composing the
/// final synthesis prompt (spec.md §4.6, §8).
const RESPONSE_TOKEN_RESERVE: usize = 7_000;
/// Rough overall token budget for the composed prompt, matching the "≈25
/// 000 tokens" figure in spec.md §4.6.
const PROMPT_TOKEN_BUDGET: usize = 25_000;
const MAX_DIGESTED_RESULTS_IN_PROMPT: usize = 8;
/// Above this many total results, synthesis switches from the expanded
/// per-source template to the compact, digest-only one (spec.md §4.6
/// item 4).
const COMPACT_SYNTHESIS_RESULT_THRESHOLD: usize = 6;

const DEFAULT_COMPACT_SYNTHESIS_TEMPLATE: &str = "Original question: {{QUERY}}\n\n\
Digest summaries:\n{{SEARCH_CONTEXT}}\n\n\
Synthesize a concise final answer from the digests above. Cite sources inline as URLs.";

pub struct ResearchLlm {
    client: LlmClient,
    model: String,
    retry: RetryManager,
}

impl ResearchLlm {
    pub fn new(model_spec: &str, api_key: impl Into<String>) -> Self {
        let (client, model) = LlmClient::from_model_spec(model_spec, api_key);
        Self {
            client,
            model,
            retry: RetryManager::new(),
        }
    }

    /// Points the underlying provider client at a different endpoint;
    /// used by integration tests to stub the upstream with a local mock
    /// server.
    pub fn with_endpoint_override(mut self, endpoint: impl Into<String>) -> Self {
        self.client = self.client.with_endpoint_override(endpoint);
        self
    }

    pub fn provider(&self) -> Provider {
        self.client.provider()
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Auto-mode only: decide direct-answer vs. search (spec.md §4.6.1).
    pub async fn initial_decision(&self, query: &str, overrides: &PromptOverrides) -> InitialDecision {
        let system = overrides.system_prompt_decision.clone().unwrap_or_else(|| DEFAULT_DECISION_SYSTEM_PROMPT.to_string());
        let user = render_template(
            overrides.decision_template.as_deref(),
            "Question: {{QUERY}}",
            query,
            None,
        );

        let request = ChatRequest::new(&self.model).message(Message::system(system)).message(Message::user(user)).temperature(0.0);

        match self.client.chat_completion(request).await {
            Ok(response) => InitialDecision::parse(&response.content, query),
            Err(_) => InitialDecision::parse_fallback(query),
        }
    }

    /// Direct-mode answer when no decision call happened, or when the
    /// decision call itself produced `{response}` (spec.md §4.7 DIRECT).
    pub async fn direct_answer(&self, query: &str, overrides: &PromptOverrides) -> Result<(String, Option<Usage>), LlmError> {
        let system = overrides.system_prompt_direct.clone().unwrap_or_else(|| DEFAULT_DIRECT_SYSTEM_PROMPT.to_string());
        let request = ChatRequest::new(&self.model).message(Message::system(system)).message(Message::user(query));
        let response = self.client.chat_completion(request).await?;
        Ok((response.content, response.usage))
    }

    /// Summarize one query's top-5 results into a 2-4 sentence digest
    /// (spec.md §4.6.2).
    pub async fn digest(&self, search_query: &str, results: &[SearchResultItem], original_query: &str, overrides: &PromptOverrides) -> String {
        let system = overrides.system_prompt_search.clone().unwrap_or_else(|| DEFAULT_SEARCH_SYSTEM_PROMPT.to_string());
        let context = results
            .iter()
            .take(5)
            .enumerate()
            .map(|(i, r)| format!("{}. {}\n{}\n{}", i + 1, r.title, r.url, r.description))
            .collect::<Vec<_>>()
            .join("\n\n");

        let default_template = format!("Original question: {{{{QUERY}}}}\nSearch query: {search_query}\n\n{{{{SEARCH_CONTEXT}}}}");
        let user = render_template(overrides.search_template.as_deref(), &default_template, original_query, Some(&context));

        let request = ChatRequest::new(&self.model).message(Message::system(system)).message(Message::user(user)).temperature(0.2);

        match self.client.chat_completion(request).await {
            Ok(response) => response.content,
            Err(_) => format!("(digest unavailable for \"{search_query}\")"),
        }
    }

    /// Decide whether another search iteration is warranted (spec.md
    /// §4.6.3). The iteration cap is enforced by the caller via
    /// [`ContinuationDecision::force_stop_at_cap`].
    pub async fn continuation(&self, original_query: &str, digests: &[Digest], iteration: usize) -> ContinuationDecision {
        let digest_summaries = digests
            .iter()
            .map(|d| format!("[{}] {}: {}", d.iteration, d.search_query, d.summary))
            .collect::<Vec<_>>()
            .join("\n");

        let user = format!(
            "Original question: {original_query}\nIteration: {iteration}\n\nDigests so far:\n{digest_summaries}"
        );
        let request = ChatRequest::new(&self.model)
            .message(Message::system(DEFAULT_CONTINUATION_SYSTEM_PROMPT))
            .message(Message::user(user))
            .temperature(0.0);

        match self.client.chat_completion(request).await {
            Ok(response) => ContinuationDecision::parse(&response.content),
            Err(_) => ContinuationDecision::stop("Parse error - stopping search"),
        }
    }

    /// Final synthesis: retried with exponential backoff per spec.md
    /// §4.6's retry policy.
    pub async fn synthesize(&self, original_query: &str, digests: &[Digest], overrides: &PromptOverrides) -> Result<(String, Option<Usage>), LlmError> {
        let prompt = compose_synthesis_prompt(original_query, digests, overrides);
        let request = ChatRequest::new(&self.model)
            .message(Message::system(DEFAULT_SYNTHESIS_SYSTEM_PROMPT))
            .message(Message::user(prompt))
            .temperature(0.3);

        let response = self.client.chat_completion_with_retry(request, &self.retry).await?;
        Ok((response.content, response.usage))
    }

    /// Cheap pre-summarization of an over-long fetched page, used by the
    /// Search Engine Client for the first 5 processed results (spec.md
    /// §4.4).
    pub async fn presummarize(&self, content: &str) -> Option<String> {
        let request = ChatRequest::new(&self.model)
            .message(Message::system("Summarize the following page content in at most 300 words, preserving facts relevant to a research question."))
            .message(Message::user(content))
            .temperature(0.0);
        self.client.chat_completion(request).await.ok().map(|r| r.content)
    }
}

#[async_trait]
impl ContentSummarizer for ResearchLlm {
    async fn summarize(&self, content: &str) -> Option<String> {
        self.presummarize(content).await
    }
}

/// The seam the Orchestrator depends on for the four call sites named in
/// spec.md §4.6, implemented by [`ResearchLlm`] against a real provider
/// and by a canned stub in [`crate::testing`] for orchestrator tests.
#[async_trait]
pub trait ResearchLanguageModel: Send + Sync {
    fn model_name(&self) -> String;
    async fn initial_decision(&self, query: &str, overrides: &PromptOverrides) -> InitialDecision;
    async fn direct_answer(&self, query: &str, overrides: &PromptOverrides) -> Result<(String, Option<Usage>), LlmError>;
    async fn digest(&self, search_query: &str, results: &[SearchResultItem], original_query: &str, overrides: &PromptOverrides) -> String;
    async fn continuation(&self, original_query: &str, digests: &[Digest], iteration: usize) -> ContinuationDecision;
    async fn synthesize(&self, original_query: &str, digests: &[Digest], overrides: &PromptOverrides) -> Result<(String, Option<Usage>), LlmError>;
}

#[async_trait]
impl ResearchLanguageModel for ResearchLlm {
    fn model_name(&self) -> String {
        self.model.clone()
    }

    async fn initial_decision(&self, query: &str, overrides: &PromptOverrides) -> InitialDecision {
        ResearchLlm::initial_decision(self, query, overrides).await
    }

    async fn direct_answer(&self, query: &str, overrides: &PromptOverrides) -> Result<(String, Option<Usage>), LlmError> {
        ResearchLlm::direct_answer(self, query, overrides).await
    }

    async fn digest(&self, search_query: &str, results: &[SearchResultItem], original_query: &str, overrides: &PromptOverrides) -> String {
        ResearchLlm::digest(self, search_query, results, original_query, overrides).await
    }

    async fn continuation(&self, original_query: &str, digests: &[Digest], iteration: usize) -> ContinuationDecision {
        ResearchLlm::continuation(self, original_query, digests, iteration).await
    }

    async fn synthesize(&self, original_query: &str, digests: &[Digest], overrides: &PromptOverrides) -> Result<(String, Option<Usage>), LlmError> {
        ResearchLlm::synthesize(self, original_query, digests, overrides).await
    }
}

fn render_template(override_template: Option<&str>, default_template: &str, query: &str, search_context: Option<&str>) -> String {
    let template = override_template.unwrap_or(default_template);
    let mut rendered = template.replace("{{QUERY}}", query);
    if let Some(context) = search_context {
        rendered = rendered.replace("{{SEARCH_CONTEXT}}", context);
    }
    rendered
}

/// Build the final-synthesis user prompt (spec.md §4.6 item 4).
///
/// With 6 or fewer total results across all digests, expands into one
/// entry per digested result (top 8, across all digests, in digest
/// order), stopping once the running estimate would exceed the token
/// budget reserved for the prompt. With more than 6, a detailed
/// per-source block would blow the prompt budget, so synthesis falls
/// back to a compact, digest-summaries-only template — overridable via
/// `overrides.synthesis_template`, which has no effect on the expanded
/// path.
fn compose_synthesis_prompt(original_query: &str, digests: &[Digest], overrides: &PromptOverrides) -> String {
    let mut ordered = digests.to_vec();
    ordered.sort_by_key(|d| d.order_key());

    let all_results: Vec<&SearchResultItem> = ordered.iter().flat_map(|d| d.raw_results.iter()).collect();

    let digest_block = ordered
        .iter()
        .map(|d| format!("Search \"{}\": {}", d.search_query, d.summary))
        .collect::<Vec<_>>()
        .join("\n");

    if all_results.len() > COMPACT_SYNTHESIS_RESULT_THRESHOLD {
        return render_template(overrides.synthesis_template.as_deref(), DEFAULT_COMPACT_SYNTHESIS_TEMPLATE, original_query, Some(&digest_block));
    }

    let mut entries = Vec::new();
    let mut running_chars = 0usize;
    let max_chars = (PROMPT_TOKEN_BUDGET - RESPONSE_TOKEN_RESERVE) * 4;

    for (i, result) in all_results.iter().take(MAX_DIGESTED_RESULTS_IN_PROMPT).enumerate() {
        let description: String = result.description.chars().take(300).collect();
        let key_info: String = result.content.as_deref().unwrap_or("").chars().take(800).collect();
        let entry = format!("{}. {}\n{}\n{}\nKey info: {}", i + 1, result.title, result.url, description, key_info);

        if running_chars + entry.len() > max_chars {
            break;
        }
        running_chars += entry.len();
        entries.push(entry);
    }

    format!(
        "Original question: {original_query}\n\nDigest summaries:\n{digest_block}\n\nSource details:\n{}",
        entries.join("\n\n")
    )
}

/// The fallback answer composed when final synthesis fails after all
/// retries (spec.md §4.7, §7): the top-5 results' titles/URLs/
/// descriptions, prefixed with a failure notice.
pub fn fallback_answer(digests: &[Digest]) -> String {
    let mut ordered = digests.to_vec();
    ordered.sort_by_key(|d| d.order_key());

    let top_five: Vec<String> = ordered
        .iter()
        .flat_map(|d| d.raw_results.iter())
        .take(5)
        .map(|r| format!("- {} ({})\n  {}", r.title, r.url, r.description))
        .collect();

    format!(
        "AI processing failed; returning the most relevant sources found instead.\n\n{}",
        top_five.join("\n")
    )
}

/// The canned answer produced when no query in any iteration yielded
/// results (spec.md §4.7).
pub fn no_results_answer() -> String {
    "No search results found for this query.".to_string()
}
