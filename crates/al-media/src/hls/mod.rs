//! HLS media playlists.
//!
//! Live manifests are written by the external transcoder; this module parses
//! them, renders placeholder playlists while a stream is warming up, and
//! rewrites segment references when the server publishes absolute links.

mod generator;
mod parser;
mod rewrite;
mod types;

pub use generator::generate_media_playlist;
pub use parser::parse_media_playlist;
pub use rewrite::rewrite_segment_uris;
pub use types::{MediaPlaylist, Segment};
