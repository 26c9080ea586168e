// src/llm/mod.rs
//! LLM completion clients.
//!
//! The rest of the crate only needs `complete(prompt) -> text`. Provider
//! selection, credentials and endpoints come from [`LlmSettings`]; nothing
//! here retries, a failed call is returned to the caller as-is.

pub mod gemini;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{LlmProvider, LlmSettings};

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// Max characters of an upstream error body kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no API key configured for LLM provider '{0}'")]
    MissingApiKey(String),

    #[error("LLM authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },

    #[error("LLM API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("LLM request failed: {0}")]
    Transport(String),

    #[error("LLM returned no text: {0}")]
    EmptyResponse(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> &str;

    fn model(&self) -> &str;

    /// Send a single prompt and return the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Build the client for the configured provider.
pub fn build_client(settings: &LlmSettings, http: reqwest::Client) -> Arc<dyn LlmClient> {
    match settings.provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::new(settings, http)),
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(settings, http)),
    }
}

/// Turn a non-2xx response into an error, keeping at most
/// `MAX_ERROR_BODY_CHARS` of the body.
pub(crate) async fn status_error(resp: reqwest::Response) -> LlmError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    match status {
        401 | 403 => LlmError::Auth { status, body },
        _ => LlmError::Status { status, body },
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Transport(format!("timed out: {}", e))
    } else {
        LlmError::Transport(e.to_string())
    }
}
