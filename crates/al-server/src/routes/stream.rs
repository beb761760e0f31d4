//! Manifest and segment handlers.
//!
//! Both read the store fresh on every request and never wait for the
//! transcoder: a missing manifest is answered with an empty live playlist so
//! players keep polling, a missing segment is a plain 404.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use al_core::config::ManifestLinks;
use al_core::Fingerprint;
use al_media::{
    generate_media_playlist, parse_segment_file_name, rewrite_segment_uris, MediaPlaylist,
    SegmentSeq,
};

use crate::context::AppContext;
use crate::error::AppError;

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

/// GET /api/stream/{fingerprint}/index.m3u8
#[utoipa::path(
    get,
    path = "/api/stream/{fingerprint}/index.m3u8",
    params(("fingerprint" = String, Path, description = "40-character content fingerprint")),
    responses(
        (status = 200, description = "Current live playlist (empty while not ready)", content_type = "application/vnd.apple.mpegurl", body = String),
        (status = 400, description = "Malformed fingerprint")
    )
)]
pub async fn manifest(
    State(ctx): State<AppContext>,
    Path(fingerprint): Path<String>,
) -> Result<Response, AppError> {
    let fp = Fingerprint::parse(&fingerprint)?;
    ctx.registry.touch(&fp);

    let body = match ctx.store().read_manifest(&fp).await? {
        Some(bytes) => match ctx.config.server.manifest_links {
            ManifestLinks::Relative => bytes,
            ManifestLinks::Absolute => absolutize(&ctx, &fp, bytes),
        },
        None => {
            let target = ctx.config.transcoder.segment_duration_secs;
            Bytes::from(generate_media_playlist(&MediaPlaylist::placeholder(target)))
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

/// Rewrite segment references to full server paths. Every other line of
/// the transcoder's manifest is kept as written. Non-UTF-8 manifests are
/// served unchanged.
fn absolutize(ctx: &AppContext, fp: &Fingerprint, bytes: Bytes) -> Bytes {
    let text = match std::str::from_utf8(&bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(fingerprint = %fp, "Serving manifest verbatim: {e}");
            return bytes;
        }
    };

    let base = ctx
        .config
        .server
        .public_base_url
        .as_deref()
        .unwrap_or("")
        .trim_end_matches('/');
    let rewritten = rewrite_segment_uris(text, |uri| {
        let name = uri.rsplit('/').next().unwrap_or(uri);
        parse_segment_file_name(name).map(|_| format!("{base}/api/stream/{fp}/{name}"))
    });
    Bytes::from(rewritten)
}

/// GET /api/stream/{fingerprint}/{segment}
#[utoipa::path(
    get,
    path = "/api/stream/{fingerprint}/{segment}",
    params(
        ("fingerprint" = String, Path, description = "40-character content fingerprint"),
        ("segment" = String, Path, description = "`seg_00003.ts`, `00003.ts` or `3`")
    ),
    responses(
        (status = 200, description = "MPEG-TS segment", content_type = "video/mp2t", body = Vec<u8>),
        (status = 400, description = "Malformed fingerprint or segment"),
        (status = 404, description = "Segment evicted or not written yet")
    )
)]
pub async fn segment(
    State(ctx): State<AppContext>,
    Path((fingerprint, segment)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let fp = Fingerprint::parse(&fingerprint)?;
    let seq = SegmentSeq::from_request(&segment)?;
    ctx.registry.touch(&fp);

    let bytes = ctx.store().read_segment(&fp, seq).await?;
    Ok(([(header::CONTENT_TYPE, SEGMENT_CONTENT_TYPE)], bytes).into_response())
}
