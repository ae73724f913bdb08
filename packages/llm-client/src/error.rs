//! Errors for the chat-completions client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors from a chat-completion call, already classified for retry
/// purposes (spec.md §4.6's retryable-conditions table).
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited")]
    RateLimited,

    #[error("upstream service unavailable (status {status})")]
    ServiceUnavailable { status: u16 },

    #[error("api error: {0}")]
    Api(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl LlmError {
    /// Whether this error is one of the retryable conditions named in
    /// spec.md §4.6: connection errors, HTTP 429, HTTP 5xx, or a timeout.
    pub fn is_retriable(&self) -> bool {
        match self {
            LlmError::Timeout | LlmError::RateLimited | LlmError::ServiceUnavailable { .. } => true,
            LlmError::Network(msg) => {
                let lower = msg.to_lowercase();
                ["enotfound", "econnrefused", "etimedout", "econnreset", "epipe", "timeout"]
                    .iter()
                    .any(|needle| lower.contains(needle))
            }
            LlmError::Config(_) | LlmError::Api(_) | LlmError::QuotaExceeded(_) | LlmError::Parse(_) => false,
        }
    }
}
