//! The inbound request body shape (spec.md §6.1) and its parsing.

use base64::Engine;
use research_core::{PromptOverrides, Query, SearchMode};
use serde::Deserialize;

/// Raw JSON body, snake_case at the boundary (spec.md §6.1).
///
/// Both `search_terms` (legacy) and `search_queries` are accepted for
/// any field that names search terms, per spec.md §9's compatibility
/// note; this type itself only carries the single-query request shape,
/// the dual-key concern lives in the orchestrator's own decision parsing.
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    pub api_key: String,
    #[serde(default)]
    pub access_secret: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub search_mode: Option<SearchMode>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub content: Option<bool>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub system_prompt_decision: Option<String>,
    #[serde(default)]
    pub system_prompt_direct: Option<String>,
    #[serde(default)]
    pub system_prompt_search: Option<String>,
    #[serde(default)]
    pub decision_template: Option<String>,
    #[serde(default)]
    pub search_template: Option<String>,
    #[serde(default)]
    pub synthesis_template: Option<String>,
    /// Deployment-dependent identity token; checked by the edge-auth
    /// middleware before the orchestrator ever sees the request.
    #[serde(default)]
    pub google_token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestParseError {
    #[error("request body is not valid JSON")]
    MalformedJson,
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("api_key is required")]
    MissingApiKey,
}

impl ResearchRequest {
    /// Parse the raw body bytes into a request.
    ///
    /// Per spec.md §6.1, the body "may be base64-encoded by the
    /// enclosing runtime": if the bytes don't parse as JSON directly,
    /// try base64-decoding them first.
    pub fn parse(body: &[u8]) -> Result<Self, RequestParseError> {
        let req: Self = serde_json::from_slice(body).or_else(|_| {
            let decoded = base64::engine::general_purpose::STANDARD.decode(body).map_err(|_| RequestParseError::MalformedJson)?;
            serde_json::from_slice(&decoded).map_err(|_| RequestParseError::MalformedJson)
        })?;

        if req.query.trim().is_empty() {
            return Err(RequestParseError::EmptyQuery);
        }
        if req.api_key.trim().is_empty() {
            return Err(RequestParseError::MissingApiKey);
        }
        Ok(req)
    }

    /// Build the orchestrator's normalized [`Query`], applying configured
    /// defaults for anything the request left unset.
    pub fn to_query(&self, default_model: &str) -> Query {
        let mut query = Query::new(self.query.trim().to_string(), self.model.clone().unwrap_or_else(|| default_model.to_string()))
            .with_search_mode(self.search_mode.unwrap_or(SearchMode::Auto));

        if let Some(limit) = self.limit {
            query = query.with_limit(limit);
        }
        if let Some(content) = self.content {
            query = query.with_fetch_content(content);
        }
        if let Some(timeout) = self.timeout {
            query = query.with_timeout_sec(timeout);
        }

        query.with_overrides(PromptOverrides {
            system_prompt_decision: self.system_prompt_decision.clone(),
            system_prompt_direct: self.system_prompt_direct.clone(),
            system_prompt_search: self.system_prompt_search.clone(),
            decision_template: self.decision_template.clone(),
            search_template: self.search_template.clone(),
            synthesis_template: self.synthesis_template.clone(),
        })
    }
}
