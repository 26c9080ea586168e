pub mod config;
pub mod crawler;
pub mod extraction;
pub mod handlers;
pub mod inference;
pub mod llm;
pub mod models;
pub mod schema;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::services::{ServeDir, ServeFile};
use utoipa::OpenApi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SchemaCrawl API",
        description = "Instruction-driven structured extraction from web pages"
    ),
    paths(handlers::extract, handlers::health, handlers::readiness),
    components(schemas(
        models::ExtractionRequest,
        models::ExtractionResponse,
        models::ErrorDetail,
        models::HealthResponse
    )),
    tags(
        (name = "extraction", description = "Schema inference and page extraction"),
        (name = "health", description = "Liveness and readiness")
    )
)]
pub struct ApiDoc;

/// Build the application router with the given state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        // Extraction
        .route("/extract", post(handlers::extract))
        // Health
        .route("/api/health", get(handlers::health))
        .route("/api/health/ready", get(handlers::readiness))
        .route("/api/openapi.json", get(handlers::openapi_json))
        // Landing page + assets
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        // Shared state
        .with_state(state)
}
