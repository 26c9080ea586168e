// ---------------------------------------------------------------------------
// llm/openai.rs — OpenAI-compatible chat completions client
// ---------------------------------------------------------------------------

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{status_error, transport_error, LlmClient, LlmError};
use crate::config::LlmSettings;

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(settings: &LlmSettings, http: reqwest::Client) -> Self {
        Self {
            http,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            timeout: settings.timeout,
        }
    }

    async fn send(&self, api_key: &str, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: 0.0,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let chat: ChatResponse = resp.json().await.map_err(transport_error)?;
        first_content(chat)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::MissingApiKey("openai".into()))?;

        self.send(api_key, prompt).await.inspect_err(|e| {
            tracing::error!(model = %self.model, "openai: {}", e);
        })
    }
}

fn first_content(chat: ChatResponse) -> Result<String, LlmError> {
    let Some(choice) = chat.choices.into_iter().next() else {
        return Err(LlmError::EmptyResponse("no choices in response".into()));
    };
    match choice.message.content {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(LlmError::EmptyResponse(format!(
            "empty message content (finish_reason={})",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        ))),
    }
}
