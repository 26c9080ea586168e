// src/extraction.rs
//! Request-level orchestration: pick the extraction mode, infer a schema when
//! an instruction is present, run the crawl and map its outcome.
//!
//! Every failure inside a request, including a panic in a collaborator,
//! comes back from [`Extractor::extract`] as an [`ExtractionError`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;

use crate::crawler::{CrawlOutcome, CrawlRequest, Crawler, ExtractionStrategy};
use crate::inference::SchemaInference;
use crate::llm::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode<'a> {
    /// Instruction present and non-blank, as the caller wrote it.
    SchemaGuided(&'a str),
    Generic,
}

impl<'a> ExtractionMode<'a> {
    pub fn select(instruction: Option<&'a str>) -> Self {
        match instruction {
            Some(text) if !text.trim().is_empty() => ExtractionMode::SchemaGuided(text),
            _ => ExtractionMode::Generic,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutput {
    /// JSON Schema used for schema-guided extraction, `None` in generic mode.
    pub schema: Option<Value>,
    pub data: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Reason reported by the crawl service, passed through verbatim.
    #[error("{0}")]
    Crawl(String),

    #[error("{0}")]
    Internal(String),
}

pub struct Extractor {
    inference: SchemaInference,
    crawler: Arc<dyn Crawler>,
    chunk_token_threshold: usize,
}

impl Extractor {
    pub fn new(
        inference: SchemaInference,
        crawler: Arc<dyn Crawler>,
        chunk_token_threshold: usize,
    ) -> Self {
        Self { inference, crawler, chunk_token_threshold }
    }

    pub async fn extract(
        &self,
        url: &str,
        instruction: Option<&str>,
    ) -> Result<ExtractionOutput, ExtractionError> {
        match AssertUnwindSafe(self.run(url, instruction)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(url, "extraction panicked: {}", message);
                Err(ExtractionError::Internal(message))
            }
        }
    }

    async fn run(
        &self,
        url: &str,
        instruction: Option<&str>,
    ) -> Result<ExtractionOutput, ExtractionError> {
        let (strategy, schema) = match ExtractionMode::select(instruction) {
            ExtractionMode::SchemaGuided(text) => {
                let descriptor = self.inference.infer(text).await?;
                let schema = descriptor.to_json_schema();
                let strategy = ExtractionStrategy::Schema {
                    schema: descriptor,
                    instruction: text.to_string(),
                };
                (strategy, Some(schema))
            }
            ExtractionMode::Generic => (ExtractionStrategy::Block, None),
        };

        tracing::info!(url, mode = strategy.mode(), "extraction: starting crawl");
        let request = CrawlRequest {
            url: url.to_string(),
            strategy,
            chunk_token_threshold: self.chunk_token_threshold,
            cache_bypass: true,
        };

        match self.crawler.crawl(request).await {
            CrawlOutcome::Success { content, schema: used } => Ok(ExtractionOutput {
                schema: used.or(schema),
                data: content,
            }),
            CrawlOutcome::Failure { reason } => Err(ExtractionError::Crawl(reason)),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected internal error".to_string()
    }
}
