//! Pure chat-completions REST client.
//!
//! No domain-specific logic: given messages and a model spec, returns
//! assistant content and token usage. Provider routing (OpenAI vs Groq)
//! is a closed sum type (see [`provider::Provider`]) rather than open
//! dynamic dispatch, and transient failures are retried with exponential
//! backoff via [`retry::RetryManager`].

pub mod error;
pub mod provider;
pub mod retry;
pub mod types;

pub use error::{LlmError, Result};
pub use provider::Provider;
pub use retry::{RetryConfig, RetryManager};
pub use types::*;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretBox};
use tracing::{debug, warn};

/// A chat-completions client bound to one provider and API key.
///
/// Construct with [`LlmClient::from_model_spec`] to route by a
/// `provider:model` string (spec.md §6.4), or [`LlmClient::new`] for an
/// explicit provider.
pub struct LlmClient {
    http_client: Client,
    api_key: SecretBox<str>,
    provider: Provider,
    endpoint_override: Option<String>,
}

impl LlmClient {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: SecretBox::new(api_key.into().into_boxed_str()),
            provider,
            endpoint_override: None,
        }
    }

    /// Route by a `provider:model` spec, returning the client and the
    /// bare model name to send in requests.
    pub fn from_model_spec(spec: &str, api_key: impl Into<String>) -> (Self, String) {
        let (provider, model) = Provider::parse_model_spec(spec);
        (Self::new(provider, api_key), model)
    }

    /// Overrides the provider's real endpoint; used by tests to point at
    /// a local mock server.
    pub fn with_endpoint_override(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Chat completion, no retry. Callers that want spec.md §4.6's
    /// backoff (the final-synthesis call, at minimum) should wrap this
    /// with [`RetryManager::retry`].
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        let endpoint = self.endpoint_override.clone().unwrap_or_else(|| self.provider.endpoint());

        let response = self
            .http_client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, provider = ?self.provider, "chat completion API error");
            return Err(classify_status_error(status.as_u16(), &error_text));
        }

        let raw: types::ChatResponseRaw = response.json().await.map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Api("no choices in response".into()))?;

        debug!(model = %request.model, provider = ?self.provider, "chat completion succeeded");

        Ok(ChatResponse {
            content,
            usage: raw.usage,
            model: if raw.model.is_empty() { request.model } else { raw.model },
        })
    }

    /// Chat completion with exponential-backoff retry on the transient
    /// conditions named in spec.md §4.6.
    pub async fn chat_completion_with_retry(&self, request: ChatRequest, retry: &RetryManager) -> Result<ChatResponse> {
        retry.retry("chat_completion", || self.chat_completion(request.clone())).await
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Network(e.to_string())
    }
}

fn classify_status_error(status: u16, body: &str) -> LlmError {
    match status {
        429 => LlmError::RateLimited,
        500 | 502 | 503 | 504 => LlmError::ServiceUnavailable { status },
        402 => LlmError::QuotaExceeded(body.to_string()),
        _ if body.to_lowercase().contains("quota") || body.to_lowercase().contains("billing") => {
            LlmError::QuotaExceeded(body.to_string())
        }
        _ => LlmError::Api(format!("status {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn success_body() -> serde_json::Value {
        serde_json::json!({
            "model": "llama-3.1-8b-instant",
            "choices": [{"message": {"content": "hello back"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
    }

    #[tokio::test]
    async fn chat_completion_parses_content_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mock/chat"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .mount(&server)
            .await;

        let client = LlmClient::new(Provider::Groq, "test-key")
            .with_endpoint_override(format!("{}/mock/chat", server.uri()));

        let response = client
            .chat_completion(ChatRequest::new("llama-3.1-8b-instant").message(Message::user("hi")))
            .await
            .unwrap();

        assert_eq!(response.content, "hello back");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[tokio::test]
    async fn a_503_then_success_is_retried_transparently() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mock/chat"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/mock/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .mount(&server)
            .await;

        let client = LlmClient::new(Provider::Groq, "test-key")
            .with_endpoint_override(format!("{}/mock/chat", server.uri()));
        let retry = RetryManager::with_config(RetryConfig {
            max_retries: 3,
            initial_delay: std::time::Duration::from_millis(1),
            backoff_multiplier: 1.0,
            max_delay: std::time::Duration::from_millis(5),
        });

        let response = client
            .chat_completion_with_retry(ChatRequest::new("llama-3.1-8b-instant").message(Message::user("hi")), &retry)
            .await
            .unwrap();
        assert_eq!(response.content, "hello back");
    }

    #[tokio::test]
    async fn four_consecutive_503s_exhaust_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mock/chat"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = LlmClient::new(Provider::Groq, "test-key")
            .with_endpoint_override(format!("{}/mock/chat", server.uri()));
        let retry = RetryManager::with_config(RetryConfig {
            max_retries: 3,
            initial_delay: std::time::Duration::from_millis(1),
            backoff_multiplier: 1.0,
            max_delay: std::time::Duration::from_millis(5),
        });

        let err = client
            .chat_completion_with_retry(ChatRequest::new("llama-3.1-8b-instant").message(Message::user("hi")), &retry)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ServiceUnavailable { status: 503 }));
    }

    #[test]
    fn status_429_classifies_as_rate_limited() {
        assert!(matches!(classify_status_error(429, ""), LlmError::RateLimited));
    }

    #[test]
    fn status_503_classifies_as_service_unavailable() {
        assert!(matches!(classify_status_error(503, ""), LlmError::ServiceUnavailable { status: 503 }));
    }

    #[test]
    fn status_402_classifies_as_quota_exceeded() {
        assert!(matches!(classify_status_error(402, "over limit"), LlmError::QuotaExceeded(_)));
    }

    #[test]
    fn model_spec_routing_produces_the_right_provider_and_model() {
        let (client, model) = LlmClient::from_model_spec("openai:gpt-4o", "key");
        assert_eq!(client.provider(), Provider::OpenAi);
        assert_eq!(model, "gpt-4o");
    }
}
