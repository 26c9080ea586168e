// ---------------------------------------------------------------------------
// llm/gemini.rs — Gemini generateContent client
// ---------------------------------------------------------------------------

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{status_error, transport_error, LlmClient, LlmError};
use crate::config::LlmSettings;

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(settings: &LlmSettings, http: reqwest::Client) -> Self {
        Self {
            http,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            timeout: settings.timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn send(&self, api_key: &str, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.0 }
        });

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let j: Value = resp.json().await.map_err(transport_error)?;
        extract_text(&j).ok_or_else(|| LlmError::EmptyResponse(gemini_diagnose(&j)))
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::MissingApiKey("gemini".into()))?;

        self.send(api_key, prompt).await.inspect_err(|e| {
            tracing::error!(model = %self.model, "gemini: {}", e);
        })
    }
}

/// Concatenate the text parts of the first candidate, skipping thought parts.
fn extract_text(j: &Value) -> Option<String> {
    let parts = j
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter(|p| !p.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() { None } else { Some(text) }
}

/// Explain why a generateContent response carried no text.
fn gemini_diagnose(j: &Value) -> String {
    let mut diag = Vec::new();

    if let Some(reason) = j
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(Value::as_str)
    {
        diag.push(format!("promptFeedback.blockReason={}", reason));
    }

    match j.get("candidates").and_then(Value::as_array) {
        Some(c) if c.is_empty() => diag.push("candidates array is empty".to_string()),
        Some(c) => {
            if let Some(reason) = c[0].get("finishReason").and_then(Value::as_str) {
                diag.push(format!("finishReason={}", reason));
            }
            if c[0].get("content").is_none() {
                diag.push("candidate has no 'content' field".to_string());
            }
        }
        None => diag.push("no 'candidates' field in response".to_string()),
    }

    if diag.is_empty() {
        "unknown (response structure unrecognized)".to_string()
    } else {
        diag.join(", ")
    }
}
