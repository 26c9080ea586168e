// SchemaCrawl - Application state

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;

use crate::config::Config;
use crate::crawler::{Crawler, HttpCrawler, SessionScoped, SessionTracker};
use crate::extraction::Extractor;
use crate::inference::SchemaInference;
use crate::llm::{build_client, LlmClient};

/// Central application state. Clone-friendly (all inner fields are Arc-wrapped).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm: Arc<dyn LlmClient>,
    pub extractor: Arc<Extractor>,
    pub sessions: SessionTracker,
    pub start_time: Instant,
    /// `true` once the listener is bound.
    pub ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
        tracing::info!("Backend marked as READY");
    }
}

impl AppState {
    /// Wire the real LLM client and HTTP crawler from configuration.
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .timeout(config.llm.timeout)
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()?;

        let llm = build_client(&config.llm, client);
        let crawler: Arc<dyn Crawler> =
            Arc::new(HttpCrawler::new(llm.clone(), config.allow_private_hosts)?);

        if config.llm.api_key.is_none() {
            tracing::warn!(
                provider = config.llm.provider.as_str(),
                "no LLM API key configured; extraction requests will fail"
            );
        }
        tracing::info!(
            provider = config.llm.provider.as_str(),
            model = %config.llm.model,
            chunk_token_threshold = config.chunk_token_threshold,
            "state: LLM client and crawler ready"
        );

        Ok(Self::from_parts(config, llm, crawler))
    }

    /// Assemble state around explicit collaborators. The crawler is wrapped
    /// so that every crawl holds a tracked session.
    pub fn from_parts(config: Config, llm: Arc<dyn LlmClient>, crawler: Arc<dyn Crawler>) -> Self {
        let sessions = SessionTracker::new();
        let scoped: Arc<dyn Crawler> = Arc::new(SessionScoped::new(crawler, sessions.clone()));
        let extractor = Extractor::new(
            SchemaInference::new(llm.clone()),
            scoped,
            config.chunk_token_threshold,
        );

        Self {
            config: Arc::new(config),
            llm,
            extractor: Arc::new(extractor),
            sessions,
            start_time: Instant::now(),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }
}
