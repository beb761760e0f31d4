//! `POST /api/convert`: turn a link into a running live session.

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::{Deserialize, Serialize};

use al_core::{Error, Fingerprint};

use crate::context::AppContext;
use crate::error::AppError;
use crate::session::{FailureReason, SessionSnapshot, SessionState};

/// Host assumed when the request carries no `Host` header.
const FALLBACK_HOST: &str = "localhost";

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ConvertRequest {
    /// `acestream://<fingerprint>` or a bare 40-character fingerprint.
    #[serde(default)]
    pub link: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ConvertResponse {
    pub content_id: String,
    /// HLS manifest served by this server.
    pub manifest_url: String,
    /// Raw MPEG-TS stream straight from the upstream engine.
    pub mpegts_url: String,
    /// Upstream engine base URL as seen from the client.
    pub proxy_base: String,
    pub session: SessionSnapshot,
}

/// POST /api/convert
#[utoipa::path(
    post,
    path = "/api/convert",
    request_body = ConvertRequest,
    responses(
        (status = 200, description = "Session started or already running", body = ConvertResponse),
        (status = 400, description = "Missing or malformed link"),
        (status = 502, description = "Transcoder could not be started; retry later"),
        (status = 503, description = "Server is shutting down")
    )
)]
pub async fn convert(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(payload): Json<ConvertRequest>,
) -> Result<Json<ConvertResponse>, AppError> {
    if payload.link.trim().is_empty() {
        return Err(Error::Validation("link is required".into()).into());
    }
    let fp = Fingerprint::extract(&payload.link)?;

    let session = ctx.registry.get_or_start(&fp)?;
    if matches!(
        session.state(),
        SessionState::Failed {
            reason: FailureReason::SpawnFailure
        }
    ) {
        let detail = session
            .diagnostics()
            .pop()
            .unwrap_or_else(|| "transcoder could not be started".into());
        return Err(Error::tool("ffmpeg", detail).into());
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(FALLBACK_HOST);
    let upstream = &ctx.config.upstream;
    let base = ctx
        .config
        .server
        .public_base_url
        .as_deref()
        .unwrap_or("")
        .trim_end_matches('/');

    tracing::info!(fingerprint = %fp, session_id = %session.id(), "Conversion requested");

    Ok(Json(ConvertResponse {
        content_id: fp.to_string(),
        manifest_url: format!("{base}/api/stream/{fp}/index.m3u8"),
        mpegts_url: upstream.public_stream_url(host, &fp),
        proxy_base: upstream.public_base(host),
        session: session.snapshot(),
    }))
}
