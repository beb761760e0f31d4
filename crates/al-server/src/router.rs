//! Axum router construction.
//!
//! Builds the application router with all API routes, the OpenAPI document,
//! middleware layers, and optional static file serving.

use std::path::PathBuf;

use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::context::AppContext;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    info(title = "acelive", description = "Live HLS packaging for AceStream content"),
    paths(
        routes::convert::convert,
        routes::stream::manifest,
        routes::stream::segment,
        routes::sessions::list_sessions,
        routes::sessions::get_session,
        routes::sessions::stop_session,
        routes::health::health_check,
        routes::health::info,
        routes::health::tools,
    ),
    components(schemas(
        routes::convert::ConvertRequest,
        routes::convert::ConvertResponse,
        routes::health::HealthResponse,
        routes::health::InfoResponse,
        crate::session::SessionSnapshot,
        crate::session::SessionState,
        crate::session::FailureReason,
        al_av::ToolInfo,
    ))
)]
pub struct ApiDoc;

/// GET /api-docs/openapi.json
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    // Players are commonly served from other origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/convert", post(routes::convert::convert))
        .route(
            "/stream/{fingerprint}/index.m3u8",
            get(routes::stream::manifest),
        )
        .route(
            "/stream/{fingerprint}/{segment}",
            get(routes::stream::segment),
        )
        .route("/sessions", get(routes::sessions::list_sessions))
        .route(
            "/sessions/{fingerprint}",
            get(routes::sessions::get_session).delete(routes::sessions::stop_session),
        )
        .route("/info", get(routes::health::info))
        .route("/tools", get(routes::health::tools));

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Static file serving for the web UI.
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                tower_http::services::ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(tower_http::services::ServeFile::new(index_path)),
            );
        } else {
            tracing::warn!("Static directory {:?} does not exist; not serving UI", dir);
        }
    }

    app
}
