// ---------------------------------------------------------------------------
// handlers/extract.rs — POST /extract
// ---------------------------------------------------------------------------

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::models::{ErrorDetail, ExtractionRequest, ExtractionResponse};
use crate::state::AppState;

use super::ApiError;

#[utoipa::path(post, path = "/extract", tag = "extraction",
    request_body = ExtractionRequest,
    responses(
        (status = 200, description = "Extracted data and the schema used", body = ExtractionResponse),
        (status = 422, description = "Malformed request body", body = ErrorDetail),
        (status = 500, description = "LLM or crawl failure", body = ErrorDetail)
    )
)]
pub async fn extract(
    State(state): State<AppState>,
    body: Result<Json<ExtractionRequest>, JsonRejection>,
) -> Result<Json<ExtractionResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let start = std::time::Instant::now();
    let out = state
        .extractor
        .extract(&req.url, req.instruction.as_deref())
        .await?;

    tracing::info!(
        url = %req.url,
        schema_guided = out.schema.is_some(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "extract: completed"
    );

    Ok(Json(ExtractionResponse { schema: out.schema, data: out.data }))
}
