//! HLS playlist generation.

use super::types::MediaPlaylist;
use std::fmt::Write;

/// Generate an HLS media playlist (M3U8) from a [`MediaPlaylist`].
///
/// Output includes:
/// - `#EXTM3U` header
/// - `#EXT-X-VERSION`, `#EXT-X-TARGETDURATION`, `#EXT-X-MEDIA-SEQUENCE`
/// - `#EXTINF` for each segment
/// - Optional `#EXT-X-ENDLIST`
pub fn generate_media_playlist(playlist: &MediaPlaylist) -> String {
    let mut out = String::new();

    writeln!(out, "#EXTM3U").unwrap();
    writeln!(out, "#EXT-X-VERSION:{}", playlist.version).unwrap();
    writeln!(out, "#EXT-X-TARGETDURATION:{}", playlist.target_duration).unwrap();
    writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", playlist.media_sequence).unwrap();

    for segment in &playlist.segments {
        match segment.title {
            Some(ref title) => {
                writeln!(out, "#EXTINF:{:.6},{}", segment.duration, title).unwrap();
            }
            None => {
                writeln!(out, "#EXTINF:{:.6},", segment.duration).unwrap();
            }
        }
        writeln!(out, "{}", segment.uri).unwrap();
    }

    if playlist.ended {
        writeln!(out, "#EXT-X-ENDLIST").unwrap();
    }

    out
}
