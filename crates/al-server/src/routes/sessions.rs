//! Session diagnostics.

use axum::extract::{Path, State};
use axum::Json;

use al_core::{Error, Fingerprint};

use crate::context::AppContext;
use crate::error::AppError;
use crate::session::SessionSnapshot;

/// GET /api/sessions
#[utoipa::path(
    get,
    path = "/api/sessions",
    responses(
        (status = 200, description = "Live sessions", body = Vec<SessionSnapshot>)
    )
)]
pub async fn list_sessions(State(ctx): State<AppContext>) -> Json<Vec<SessionSnapshot>> {
    Json(ctx.registry.list())
}

/// GET /api/sessions/{fingerprint}
///
/// Returns the live session, or the last one that ended with its captured
/// diagnostics.
#[utoipa::path(
    get,
    path = "/api/sessions/{fingerprint}",
    params(("fingerprint" = String, Path, description = "40-character content fingerprint")),
    responses(
        (status = 200, description = "Live or most recently ended session", body = SessionSnapshot),
        (status = 400, description = "Malformed fingerprint"),
        (status = 404, description = "No session known for this fingerprint")
    )
)]
pub async fn get_session(
    State(ctx): State<AppContext>,
    Path(fingerprint): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let fp = Fingerprint::parse(&fingerprint)?;
    ctx.registry
        .snapshot(&fp)
        .map(Json)
        .ok_or_else(|| Error::not_found("session", &fp).into())
}

/// DELETE /api/sessions/{fingerprint}
#[utoipa::path(
    delete,
    path = "/api/sessions/{fingerprint}",
    params(("fingerprint" = String, Path, description = "40-character content fingerprint")),
    responses(
        (status = 200, description = "Session stopped", body = SessionSnapshot),
        (status = 404, description = "No live session for this fingerprint")
    )
)]
pub async fn stop_session(
    State(ctx): State<AppContext>,
    Path(fingerprint): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let fp = Fingerprint::parse(&fingerprint)?;
    let snapshot = ctx.registry.stop(&fp).await?;
    Ok(Json(snapshot))
}
