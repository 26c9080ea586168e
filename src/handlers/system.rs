// ---------------------------------------------------------------------------
// handlers/system.rs — Health, readiness, OpenAPI document
// ---------------------------------------------------------------------------

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use utoipa::OpenApi;

use crate::models::HealthResponse;
use crate::state::AppState;
use crate::ApiDoc;

#[utoipa::path(get, path = "/api/health", tag = "health",
    responses((status = 200, description = "Health check with LLM provider info", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.is_ready() { "ok" } else { "starting" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        app: "SchemaCrawl".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        provider: state.llm.provider().to_string(),
        model: state.llm.model().to_string(),
        active_crawl_sessions: state.sessions.active(),
    })
}

/// GET /api/health/ready — lightweight readiness probe.
#[utoipa::path(get, path = "/api/health/ready", tag = "health",
    responses(
        (status = 200, description = "Service ready", body = serde_json::Value),
        (status = 503, description = "Service not ready", body = serde_json::Value)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> axum::response::Response {
    let ready = state.is_ready();
    let uptime = state.start_time.elapsed().as_secs();
    let body = json!({ "ready": ready, "uptime_seconds": uptime });

    if ready {
        (StatusCode::OK, Json(body)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
