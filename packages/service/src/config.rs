use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Process-level configuration loaded from environment variables.
///
/// Per-request credentials (`api_key`, `access_secret`, `google_token`)
/// travel in the request body (spec.md §6.1), not here; this only holds
/// what the edge process needs to bind a socket, enforce a shared
/// secret, and pick defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// When set, inbound requests must carry a matching `access_secret`.
    pub access_secret: Option<String>,
    pub default_model: String,
    pub max_iterations: usize,
    /// Gates whether raw error text is attached to a failure response
    /// (spec.md §7).
    pub debug_errors: bool,
    /// Test-only: points the LLM provider client at a local mock server
    /// instead of the real upstream. Never set outside integration tests.
    pub llm_endpoint_override: Option<String>,
    /// Test-only: points the search engine client at a local mock server
    /// instead of the real upstream. Never set outside integration tests.
    pub search_endpoint_override: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            port: env::var("PORT").unwrap_or_else(|_| "8080".to_string()).parse().context("PORT must be a valid number")?,
            access_secret: env::var("ACCESS_SECRET").ok().filter(|s| !s.is_empty()),
            default_model: env::var("DEFAULT_MODEL").unwrap_or_else(|_| "groq:llama-3.1-8b-instant".to_string()),
            max_iterations: env::var("MAX_ITERATIONS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("MAX_ITERATIONS must be a positive integer")?,
            debug_errors: env::var("DEBUG_ERRORS").map(|v| v == "true" || v == "1").unwrap_or(false),
            llm_endpoint_override: env::var("LLM_ENDPOINT_OVERRIDE").ok(),
            search_endpoint_override: env::var("SEARCH_ENDPOINT_OVERRIDE").ok(),
        })
    }
}
