use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use schemacrawl_backend::config::Config;
use schemacrawl_backend::crawler::{CrawlOutcome, CrawlRequest, Crawler, ExtractionStrategy, HttpCrawler};
use schemacrawl_backend::llm::{LlmClient, LlmError};
use schemacrawl_backend::state::AppState;

// ═══════════════════════════════════════════════════════════════════════════
//  Test doubles
// ═══════════════════════════════════════════════════════════════════════════

/// Returns queued replies in order and records every prompt.
struct QueuedLlm {
    replies: Mutex<Vec<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl QueuedLlm {
    fn new(mut replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        replies.reverse();
        Arc::new(Self { replies: Mutex::new(replies), prompts: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl LlmClient for QueuedLlm {
    fn provider(&self) -> &str {
        "test"
    }

    fn model(&self) -> &str {
        "test-model"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(LlmError::Transport("no reply queued".into())))
    }
}

struct FixedCrawler {
    outcome: CrawlOutcome,
    requests: Mutex<Vec<CrawlRequest>>,
}

impl FixedCrawler {
    fn new(outcome: CrawlOutcome) -> Arc<Self> {
        Arc::new(Self { outcome, requests: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl Crawler for FixedCrawler {
    async fn crawl(&self, request: CrawlRequest) -> CrawlOutcome {
        self.requests.lock().unwrap().push(request);
        self.outcome.clone()
    }
}

fn test_config() -> Config {
    let static_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/static").to_string();
    Config::from_lookup(|name| match name {
        "STATIC_DIR" => Some(static_dir.clone()),
        _ => None,
    })
    .unwrap()
}

/// Helper: build a router from a test state.
fn app(state: AppState) -> axum::Router {
    schemacrawl_backend::create_router(state)
}

/// Helper: collect a response body into a serde_json::Value.
async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_extract(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/extract")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn blocks() -> CrawlOutcome {
    CrawlOutcome::Success {
        content: json!([{ "index": 0, "tags": ["intro"], "content": ["Hello"] }]),
        schema: None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  POST /extract
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn extract_without_instruction_returns_blocks_and_null_schema() {
    let llm = QueuedLlm::new(Vec::new());
    let crawler = FixedCrawler::new(blocks());
    let state = AppState::from_parts(test_config(), llm.clone(), crawler.clone());

    let response = app(state)
        .oneshot(post_extract(json!({ "url": "https://example.com" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["schema"], Value::Null);
    assert_eq!(json["data"][0]["tags"], json!(["intro"]));
    assert_eq!(json.as_object().unwrap().len(), 2);

    assert!(llm.prompts.lock().unwrap().is_empty());
    let requests = crawler.requests.lock().unwrap();
    assert_eq!(requests[0].strategy, ExtractionStrategy::Block);
    assert!(requests[0].cache_bypass);
}

#[tokio::test]
async fn extract_with_null_instruction_is_generic() {
    let llm = QueuedLlm::new(Vec::new());
    let crawler = FixedCrawler::new(blocks());
    let state = AppState::from_parts(test_config(), llm.clone(), crawler);

    let response = app(state)
        .oneshot(post_extract(json!({ "url": "https://example.com", "instruction": null })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["schema"], Value::Null);
    assert!(llm.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn extract_with_instruction_infers_schema() {
    let llm = QueuedLlm::new(vec![Ok(
        "Here you go:\n```json\n{\"properties\":{\"name\":{\"type\":\"string\",\"description\":\"Product name\"},\"price\":{\"type\":\"number\"}}}\n```"
            .to_string(),
    )]);
    let crawler = FixedCrawler::new(CrawlOutcome::Success {
        content: json!([{ "name": "Lamp", "price": 19.5 }]),
        schema: None,
    });
    let state = AppState::from_parts(test_config(), llm.clone(), crawler.clone());

    let response = app(state)
        .oneshot(post_extract(json!({
            "url": "https://example.com/shop",
            "instruction": "extract product names and prices"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["schema"]["type"], "object");
    assert_eq!(json["schema"]["required"], json!(["name", "price"]));
    assert_eq!(json["schema"]["properties"]["name"]["description"], "Product name");
    assert_eq!(json["data"], json!([{ "name": "Lamp", "price": 19.5 }]));

    let prompts = llm.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("extract product names and prices"));

    let requests = crawler.requests.lock().unwrap();
    assert_eq!(requests[0].strategy.mode(), "schema");
    assert_eq!(requests[0].url, "https://example.com/shop");
}

#[tokio::test]
async fn extract_with_prose_reply_falls_back_to_content_field() {
    let llm = QueuedLlm::new(vec![Ok("I cannot produce a schema for that.".to_string())]);
    let crawler = FixedCrawler::new(CrawlOutcome::Success { content: json!([]), schema: None });
    let state = AppState::from_parts(test_config(), llm, crawler);

    let response = app(state)
        .oneshot(post_extract(json!({ "url": "https://example.com", "instruction": "anything" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["schema"]["required"], json!(["content"]));
    assert_eq!(json["schema"]["properties"]["content"]["type"], "string");
}

#[tokio::test]
async fn crawl_failure_returns_500_with_reason() {
    let state = AppState::from_parts(
        test_config(),
        QueuedLlm::new(Vec::new()),
        FixedCrawler::new(CrawlOutcome::failure("timeout")),
    );

    let response = app(state)
        .oneshot(post_extract(json!({ "url": "https://example.com" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await, json!({ "detail": "timeout" }));
}

#[tokio::test]
async fn llm_transport_error_returns_500_without_crawling() {
    let crawler = FixedCrawler::new(blocks());
    let state = AppState::from_parts(
        test_config(),
        QueuedLlm::new(vec![Err(LlmError::Transport("connection refused".into()))]),
        crawler.clone(),
    );

    let response = app(state)
        .oneshot(post_extract(json!({ "url": "https://example.com", "instruction": "prices" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["detail"],
        "LLM request failed: connection refused"
    );
    assert!(crawler.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn http_crawler_blocks_private_targets() {
    let llm = QueuedLlm::new(Vec::new());
    let crawler = Arc::new(HttpCrawler::new(llm.clone(), false).unwrap());
    let state = AppState::from_parts(test_config(), llm.clone(), crawler);

    let response = app(state)
        .oneshot(post_extract(json!({ "url": "http://127.0.0.1:8000/admin" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["detail"], "blocked host: 127.0.0.1");
    assert!(llm.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_url_is_rejected_with_detail() {
    let state = AppState::from_parts(
        test_config(),
        QueuedLlm::new(Vec::new()),
        FixedCrawler::new(blocks()),
    );

    let response = app(state)
        .oneshot(post_extract(json!({ "instruction": "prices" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("url"));
}

#[tokio::test]
async fn sessions_are_released_after_each_request() {
    let state = AppState::from_parts(
        test_config(),
        QueuedLlm::new(Vec::new()),
        FixedCrawler::new(CrawlOutcome::failure("timeout")),
    );
    let sessions = state.sessions.clone();

    let response = app(state)
        .oneshot(post_extract(json!({ "url": "https://example.com" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(sessions.active(), 0);
    assert_eq!(sessions.opened_total(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════
//  Health / static
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn health_reports_provider_and_readiness() {
    let state = AppState::from_parts(
        test_config(),
        QueuedLlm::new(Vec::new()),
        FixedCrawler::new(blocks()),
    );

    let response = app(state.clone())
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "starting");
    assert_eq!(json["app"], "SchemaCrawl");
    assert_eq!(json["provider"], "test");
    assert_eq!(json["model"], "test-model");
    assert_eq!(json["active_crawl_sessions"], 0);

    state.mark_ready();
    let response = app(state)
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn readiness_is_503_until_marked_ready() {
    let state = AppState::from_parts(
        test_config(),
        QueuedLlm::new(Vec::new()),
        FixedCrawler::new(blocks()),
    );

    let response = app(state.clone())
        .oneshot(Request::builder().uri("/api/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    state.mark_ready();
    let response = app(state)
        .oneshot(Request::builder().uri("/api/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ready"], true);
}

#[tokio::test]
async fn index_page_is_served() {
    let state = AppState::from_parts(
        test_config(),
        QueuedLlm::new(Vec::new()),
        FixedCrawler::new(blocks()),
    );

    let response = app(state)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("SchemaCrawl"));
}

#[tokio::test]
async fn openapi_endpoint_serves_document() {
    let state = AppState::from_parts(
        test_config(),
        QueuedLlm::new(Vec::new()),
        FixedCrawler::new(blocks()),
    );

    let response = app(state)
        .oneshot(Request::builder().uri("/api/openapi.json").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/extract"]["post"].is_object());
}
