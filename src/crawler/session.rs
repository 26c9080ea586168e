// ---------------------------------------------------------------------------
// crawler/session.rs — Per-crawl session scope with guaranteed release
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::{CrawlOutcome, CrawlRequest, Crawler};

/// Process-wide session accounting. Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    active: Arc<AtomicUsize>,
    opened: Arc<AtomicU64>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, url: &str) -> CrawlSession {
        let id = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(session = id, active, url, "crawl session opened");
        CrawlSession { id, tracker: self.clone(), started: Instant::now() }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn opened_total(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }
}

/// Held for the duration of one crawl. Released in `Drop`, so the release
/// also runs when the crawl errors, panics, or the request future is dropped.
#[derive(Debug)]
pub struct CrawlSession {
    id: u64,
    tracker: SessionTracker,
    started: Instant,
}

impl CrawlSession {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CrawlSession {
    fn drop(&mut self) {
        let active = self.tracker.active.fetch_sub(1, Ordering::AcqRel) - 1;
        tracing::debug!(
            session = self.id,
            active,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "crawl session released"
        );
    }
}

/// Adapter that opens a [`CrawlSession`] around every call to the inner crawler.
pub struct SessionScoped<C> {
    inner: C,
    tracker: SessionTracker,
}

impl<C: Crawler> SessionScoped<C> {
    pub fn new(inner: C, tracker: SessionTracker) -> Self {
        Self { inner, tracker }
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }
}

#[async_trait]
impl<C: Crawler> Crawler for SessionScoped<C> {
    async fn crawl(&self, request: CrawlRequest) -> CrawlOutcome {
        let _session = self.tracker.open(&request.url);
        self.inner.crawl(request).await
    }
}
