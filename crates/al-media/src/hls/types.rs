//! HLS playlist types.

use serde::{Deserialize, Serialize};

use crate::segment::parse_segment_file_name;

/// A single segment in a media playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment duration in seconds.
    pub duration: f64,
    /// URI for this segment.
    pub uri: String,
    /// Optional human-readable title.
    pub title: Option<String>,
}

/// An HLS media playlist describing a window of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPlaylist {
    /// `#EXT-X-VERSION` value.
    pub version: u32,
    /// Maximum segment duration in integer seconds (rounded up).
    pub target_duration: u32,
    /// Sequence number of the first segment.
    pub media_sequence: u64,
    /// Ordered list of segments.
    pub segments: Vec<Segment>,
    /// Whether the playlist is complete. If true, `#EXT-X-ENDLIST` is emitted.
    pub ended: bool,
}

impl MediaPlaylist {
    /// An empty live playlist: valid header, zero segments, no end marker.
    ///
    /// Players treat this as "not ready yet" and keep polling.
    pub fn placeholder(target_duration: u32) -> Self {
        Self {
            version: 3,
            target_duration: target_duration.max(1),
            media_sequence: 0,
            segments: Vec::new(),
            ended: false,
        }
    }

    /// Sequence numbers of the segment files this playlist references.
    ///
    /// URIs that do not name a segment file (foreign URIs) are skipped.
    pub fn segment_sequences(&self) -> Vec<u64> {
        self.segments
            .iter()
            .filter_map(|s| {
                let name = s.uri.rsplit('/').next().unwrap_or(&s.uri);
                parse_segment_file_name(name)
            })
            .collect()
    }
}
