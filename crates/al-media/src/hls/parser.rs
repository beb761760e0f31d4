//! Lenient parser for live media playlists written by the transcoder.
//!
//! Only the tags needed to reason about the segment window are interpreted;
//! everything else is skipped so that newer transcoder versions emitting
//! extra tags keep working.

use al_core::{Error, Result};

use super::types::{MediaPlaylist, Segment};

/// Parse an M3U8 media playlist.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the `#EXTM3U` header is missing or a
/// numeric tag value cannot be parsed.
pub fn parse_media_playlist(input: &str) -> Result<MediaPlaylist> {
    let mut lines = input.lines().map(str::trim).filter(|l| !l.is_empty());

    match lines.next() {
        Some(first) if first.trim_start_matches('\u{feff}') == "#EXTM3U" => {}
        _ => return Err(Error::Validation("playlist is missing #EXTM3U header".into())),
    }

    let mut playlist = MediaPlaylist::placeholder(1);
    let mut pending: Option<(f64, Option<String>)> = None;

    for line in lines {
        if let Some(value) = line.strip_prefix("#EXT-X-VERSION:") {
            playlist.version = parse_number(value, "EXT-X-VERSION")?;
        } else if let Some(value) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            playlist.target_duration = parse_number(value, "EXT-X-TARGETDURATION")?;
        } else if let Some(value) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            playlist.media_sequence = parse_number(value, "EXT-X-MEDIA-SEQUENCE")?;
        } else if let Some(value) = line.strip_prefix("#EXTINF:") {
            let (duration, title) = match value.split_once(',') {
                Some((d, t)) => (d, (!t.is_empty()).then(|| t.to_string())),
                None => (value, None),
            };
            let duration: f64 = duration
                .trim()
                .parse()
                .map_err(|_| Error::Validation(format!("invalid EXTINF duration: {duration}")))?;
            pending = Some((duration, title));
        } else if line == "#EXT-X-ENDLIST" {
            playlist.ended = true;
        } else if line.starts_with('#') {
            // Unknown tag or comment.
        } else if let Some((duration, title)) = pending.take() {
            playlist.segments.push(Segment {
                duration,
                uri: line.to_string(),
                title,
            });
        }
    }

    Ok(playlist)
}

fn parse_number<T: std::str::FromStr>(value: &str, tag: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("invalid {tag} value: {value}")))
}
