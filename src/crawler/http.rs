// ---------------------------------------------------------------------------
// crawler/http.rs — Fetch a page over HTTP and run the LLM extraction strategy
// ---------------------------------------------------------------------------

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use serde_json::{json, Value};

use super::chunking::{chunk_by_tokens, estimate_tokens};
use super::fetch::{crawl_client, fetch_page, FetchError, FetchOptions};
use super::html::extract_page_text;
use super::{CrawlOutcome, CrawlRequest, Crawler, ExtractionStrategy};
use crate::inference::parser::{extract_json, JsonShape};
use crate::llm::{LlmClient, LlmError};
use crate::schema::SchemaDescriptor;

/// Chunks extracted concurrently per crawl.
const MAX_CONCURRENT_CHUNKS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("page at '{0}' has no extractable text")]
    EmptyPage(String),

    #[error("extraction failed: {0}")]
    Llm(#[from] LlmError),
}

pub struct HttpCrawler {
    http: reqwest::Client,
    llm: Arc<dyn LlmClient>,
    allow_private_hosts: bool,
}

impl HttpCrawler {
    /// Builds its own HTTP client so redirects are vetted like the first URL.
    pub fn new(llm: Arc<dyn LlmClient>, allow_private_hosts: bool) -> Result<Self, reqwest::Error> {
        Ok(Self { http: crawl_client(allow_private_hosts)?, llm, allow_private_hosts })
    }

    async fn run(&self, request: &CrawlRequest) -> Result<(Value, Option<Value>), CrawlError> {
        let opts = FetchOptions {
            cache_bypass: request.cache_bypass,
            allow_private_hosts: self.allow_private_hosts,
        };
        let page = fetch_page(&self.http, &request.url, opts).await?;
        let markdown = extract_page_text(&page.body).to_markdown();
        if markdown.trim().is_empty() {
            return Err(CrawlError::EmptyPage(request.url.clone()));
        }

        let chunks = chunk_by_tokens(&markdown, request.chunk_token_threshold);
        tracing::info!(
            url = %page.final_url,
            status = page.status,
            mode = request.strategy.mode(),
            tokens = estimate_tokens(&markdown),
            chunks = chunks.len(),
            "crawl: page fetched"
        );

        let total = chunks.len();
        let prompts: Vec<String> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| match &request.strategy {
                ExtractionStrategy::Schema { schema, instruction } => {
                    schema_extraction_prompt(schema, instruction, &request.url, chunk, i + 1, total)
                }
                ExtractionStrategy::Block => block_extraction_prompt(&request.url, chunk, i + 1, total),
            })
            .collect();

        let llm = &self.llm;
        let replies: Vec<String> = futures_util::stream::iter(prompts)
            .map(|prompt| async move { llm.complete(&prompt).await })
            .buffered(MAX_CONCURRENT_CHUNKS)
            .try_collect::<Vec<String>>()
            .await?;

        Ok(match &request.strategy {
            ExtractionStrategy::Schema { schema, .. } => {
                (collect_records(schema, &replies), Some(schema.to_json_schema()))
            }
            ExtractionStrategy::Block => (collect_blocks(&replies), None),
        })
    }
}

#[async_trait]
impl Crawler for HttpCrawler {
    async fn crawl(&self, request: CrawlRequest) -> CrawlOutcome {
        match self.run(&request).await {
            Ok((content, schema)) => CrawlOutcome::Success { content, schema },
            Err(e) => {
                tracing::warn!(url = %request.url, mode = request.strategy.mode(), "crawl failed: {}", e);
                CrawlOutcome::failure(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

fn schema_extraction_prompt(
    schema: &SchemaDescriptor,
    instruction: &str,
    url: &str,
    chunk: &str,
    part: usize,
    total: usize,
) -> String {
    let schema_json = serde_json::to_string_pretty(&schema.to_json_schema()).unwrap_or_default();
    format!(
        "Extract structured data from part {part} of {total} of the web page at {url}.\n\n\
         Instruction: {instruction}\n\n\
         Every extracted item must be a JSON object matching this JSON Schema; all properties are required:\n\
         ```json\n{schema_json}\n```\n\n\
         Reply with a JSON array of such objects inside a ```json code block. \
         Reply with [] when the content holds no matching data.\n\n\
         <content>\n{chunk}\n</content>"
    )
}

fn block_extraction_prompt(url: &str, chunk: &str, part: usize, total: usize) -> String {
    format!(
        "Split part {part} of {total} of the web page at {url} into semantically coherent blocks.\n\n\
         For each block return an object with:\n\
         - \"index\": position of the block in this part, starting at 0\n\
         - \"tags\": a few short labels describing the block\n\
         - \"content\": a list of strings with the block's text, lightly cleaned\n\n\
         Reply with a JSON array of these objects inside a ```json code block.\n\n\
         <content>\n{chunk}\n</content>"
    )
}

// ---------------------------------------------------------------------------
// Reply handling
// ---------------------------------------------------------------------------

fn json_items(reply: &str) -> Option<Vec<Value>> {
    match extract_json(reply, JsonShape::ObjectOrArray)?.0 {
        Value::Array(items) => Some(items),
        obj @ Value::Object(_) => Some(vec![obj]),
        _ => None,
    }
}

/// Keep the records that validate against `schema`, in chunk order.
fn collect_records(schema: &SchemaDescriptor, replies: &[String]) -> Value {
    let mut records = Vec::new();
    for (chunk, reply) in replies.iter().enumerate() {
        let Some(items) = json_items(reply) else {
            tracing::warn!(chunk, "extraction: no JSON in chunk reply, skipping");
            continue;
        };
        for item in items {
            match schema.validate(&item) {
                Ok(()) => records.push(item),
                Err(issues) => {
                    let issues: Vec<String> = issues.iter().map(ToString::to_string).collect();
                    tracing::warn!(chunk, issues = %issues.join("; "), "extraction: dropping invalid record");
                }
            }
        }
    }
    Value::Array(records)
}

/// Merge block lists from every chunk, renumbering `index` across chunks.
fn collect_blocks(replies: &[String]) -> Value {
    let mut blocks = Vec::new();
    for reply in replies {
        let items = json_items(reply).unwrap_or_else(|| {
            tracing::warn!("extraction: block reply had no JSON, keeping raw text");
            vec![json!({ "tags": ["unparsed"], "content": [reply.trim()] })]
        });
        for item in items {
            let mut block = match item {
                Value::Object(map) => map,
                other => {
                    let mut map = serde_json::Map::new();
                    map.insert("tags".into(), json!([]));
                    map.insert("content".into(), json!([other]));
                    map
                }
            };
            block.insert("index".into(), json!(blocks.len()));
            blocks.push(Value::Object(block));
        }
    }
    Value::Array(blocks)
}
