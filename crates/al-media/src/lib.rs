//! al-media: HLS live playlist handling and segment naming.
//!
//! # Modules
//!
//! - [`hls`] - media playlist types, rendering, and parsing of transcoder output
//! - [`segment`] - segment file naming and request validation

pub mod hls;
pub mod segment;

// Re-export commonly used items at the crate root.
pub use hls::{
    generate_media_playlist, parse_media_playlist, rewrite_segment_uris, MediaPlaylist, Segment,
};
pub use segment::{
    parse_segment_file_name, segment_file_name, SegmentSeq, MANIFEST_FILE_NAME,
    MAX_SEGMENT_SEQUENCE, SEGMENT_FILE_PATTERN,
};
