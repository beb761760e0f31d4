//! Health, service info and tool availability.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use al_core::config::ManifestLinks;

use crate::context::AppContext;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    /// Upstream engine host as configured on this server.
    pub proxy_host: String,
    pub proxy_port: u16,
    pub proxy_url: String,
    pub web_port: u16,
    #[schema(value_type = String)]
    pub manifest_links: ManifestLinks,
    pub active_sessions: usize,
}

/// GET /api/info
#[utoipa::path(
    get,
    path = "/api/info",
    responses((status = 200, description = "Service configuration summary", body = InfoResponse))
)]
pub async fn info(State(ctx): State<AppContext>) -> Json<InfoResponse> {
    let upstream = &ctx.config.upstream;
    Json(InfoResponse {
        name: "acelive".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        proxy_host: upstream.host.clone(),
        proxy_port: upstream.port,
        proxy_url: upstream.base_url(),
        web_port: ctx.config.server.port,
        manifest_links: ctx.config.server.manifest_links,
        active_sessions: ctx.registry.len(),
    })
}

/// GET /api/tools
#[utoipa::path(
    get,
    path = "/api/tools",
    responses(
        (status = 200, description = "External tool availability", body = Vec<al_av::ToolInfo>)
    )
)]
pub async fn tools(State(ctx): State<AppContext>) -> Json<Vec<al_av::ToolInfo>> {
    Json(ctx.tools.check_all().await)
}
