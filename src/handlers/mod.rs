// ---------------------------------------------------------------------------
// handlers/ — HTTP handlers and the shared API error type
// mod.rs re-exports the handler functions and their utoipa __path_* types so
// lib.rs can route and document them via `crate::handlers::*`.
// ---------------------------------------------------------------------------

// Sub-modules are pub(crate) so utoipa __path_* types are accessible from lib.rs OpenApi derive.
pub(crate) mod extract;
pub(crate) mod system;

pub use extract::extract;
pub use system::{health, openapi_json, readiness};

pub use extract::__path_extract;
pub use system::{__path_health, __path_readiness};

use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::extraction::ExtractionError;
use crate::models::ErrorDetail;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// API error for all handlers. Logs with a correlation id server-side and
/// returns `{ "detail": <message> }` to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request body could not be decoded.
    #[error("{0}")]
    BadRequest(String),

    /// LLM call failed (transport, auth, empty reply).
    #[error("{0}")]
    Upstream(String),

    /// The crawl reported an unsuccessful outcome.
    #[error("{0}")]
    CrawlFailed(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::CrawlFailed(_) => "CRAWL_FAILED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Every extraction failure is a 500; only undecodable bodies are 422.
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) | ApiError::CrawlFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ExtractionError> for ApiError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::Llm(e) => ApiError::Upstream(e.to_string()),
            ExtractionError::Crawl(reason) => ApiError::CrawlFailed(reason),
            ExtractionError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let request_id = Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            code = self.error_code(),
            "API error ({}): {}",
            status.as_u16(),
            self
        );

        (status, Json(ErrorDetail { detail: self.to_string() })).into_response()
    }
}
