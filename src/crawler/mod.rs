// src/crawler/mod.rs
//! Crawl + extraction collaborator.
//!
//! Contract: given a URL and an extraction strategy, return the extracted
//! content or a failure reason. [`HttpCrawler`] is the bundled
//! implementation; [`SessionScoped`] wraps any crawler so that per-crawl
//! resources are released on every exit path.

pub mod chunking;
pub mod fetch;
pub mod html;
pub mod http;
pub mod session;

use async_trait::async_trait;
use serde_json::Value;

use crate::schema::SchemaDescriptor;

pub use http::HttpCrawler;
pub use session::{CrawlSession, SessionScoped, SessionTracker};

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionStrategy {
    /// Populate records of `schema`, guided by the user's instruction.
    Schema {
        schema: SchemaDescriptor,
        instruction: String,
    },
    /// Split the page into semantic content blocks.
    Block,
}

impl ExtractionStrategy {
    pub fn mode(&self) -> &'static str {
        match self {
            ExtractionStrategy::Schema { .. } => "schema",
            ExtractionStrategy::Block => "block",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRequest {
    pub url: String,
    pub strategy: ExtractionStrategy,
    pub chunk_token_threshold: usize,
    /// Always fetch fresh content; never reuse an earlier fetch.
    pub cache_bypass: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrawlOutcome {
    Success {
        content: Value,
        /// JSON Schema the content conforms to, when the strategy had one.
        schema: Option<Value>,
    },
    Failure {
        reason: String,
    },
}

impl CrawlOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        CrawlOutcome::Failure { reason: reason.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CrawlOutcome::Success { .. })
    }
}

#[async_trait]
pub trait Crawler: Send + Sync {
    async fn crawl(&self, request: CrawlRequest) -> CrawlOutcome;
}

#[async_trait]
impl<T: Crawler + ?Sized> Crawler for std::sync::Arc<T> {
    async fn crawl(&self, request: CrawlRequest) -> CrawlOutcome {
        (**self).crawl(request).await
    }
}
