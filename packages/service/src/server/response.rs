//! Response envelopes and error-to-HTTP-status mapping (spec.md §7).

use axum::http::StatusCode;
use llm_client::LlmError;
use research_core::OrchestratorError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
    #[serde(rename = "errorType")]
    pub error_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, error_type: &'static str, raw: Option<String>) -> Self {
        Self { success: false, error: message.into(), error_type, raw }
    }
}

/// Maps an [`OrchestratorError`] to the HTTP status and stable
/// `errorType` token named in spec.md §7's taxonomy table.
///
/// Only [`OrchestratorError::Llm`] and [`OrchestratorError::InvalidInput`]
/// can ever reach here in practice: the orchestrator swallows and falls
/// back on every other failure mode internally (search failures, digest
/// parse failures, continuation parse failures). `Fetch`/`Search`/
/// `Governor` are matched defensively in case that changes.
pub fn map_error(err: &OrchestratorError, debug_errors: bool) -> (StatusCode, ErrorEnvelope) {
    let raw = debug_errors.then(|| err.to_string());

    match err {
        OrchestratorError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, ErrorEnvelope::new(msg.clone(), "INVALID_INPUT", raw)),
        OrchestratorError::Llm(llm_err) => map_llm_error(llm_err, raw),
        OrchestratorError::Fetch(_) | OrchestratorError::Search(_) | OrchestratorError::Governor(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorEnvelope::new("internal error", "INTERNAL_ERROR", raw))
        }
    }
}

fn map_llm_error(err: &LlmError, raw: Option<String>) -> (StatusCode, ErrorEnvelope) {
    match err {
        LlmError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, ErrorEnvelope::new("rate limited by the upstream provider", "RATE_LIMITED", raw)),
        LlmError::QuotaExceeded(_) => (StatusCode::PAYMENT_REQUIRED, ErrorEnvelope::new("provider quota exceeded", "QUOTA_EXCEEDED", raw)),
        LlmError::ServiceUnavailable { .. } | LlmError::Timeout | LlmError::Network(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, ErrorEnvelope::new("upstream service unavailable", "SERVICE_UNAVAILABLE", raw))
        }
        LlmError::Config(_) | LlmError::Api(_) | LlmError::Parse(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorEnvelope::new("internal error", "INTERNAL_ERROR", raw))
        }
    }
}
