//! The chat-completions provider: a sum type rather than open-ended
//! dynamic dispatch (spec.md §9), each variant carrying its hostname,
//! path, and credential-environment identifier.

use crate::error::{LlmError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Groq,
}

impl Provider {
    pub fn hostname(&self) -> &'static str {
        match self {
            Provider::OpenAi => "api.openai.com",
            Provider::Groq => "api.groq.com",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Provider::OpenAi => "/v1/chat/completions",
            Provider::Groq => "/openai/v1/chat/completions",
        }
    }

    pub fn endpoint(&self) -> String {
        format!("https://{}{}", self.hostname(), self.path())
    }

    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }

    /// Split a `provider:modelName` spec into its provider and bare model
    /// name. A spec with no `provider:` prefix defaults to Groq
    /// (spec.md §6.4).
    pub fn parse_model_spec(spec: &str) -> (Provider, String) {
        match spec.split_once(':') {
            Some(("openai", model)) => (Provider::OpenAi, model.to_string()),
            Some(("groq", model)) => (Provider::Groq, model.to_string()),
            Some((_, _)) | None => (Provider::Groq, spec.to_string()),
        }
    }

    pub fn api_key_from_env(&self) -> Result<String> {
        std::env::var(self.api_key_env_var())
            .map_err(|_| LlmError::Config(format!("{} not set", self.api_key_env_var())))
    }
}
