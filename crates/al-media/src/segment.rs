//! Segment file naming and request validation.
//!
//! Segment files are named `seg_NNNNN.ts` with a zero-padded sequence number.
//! Requests name segments either by file name or by bare number; both forms
//! are reduced to a [`SegmentSeq`] before any path is built, so only ASCII
//! digits ever reach the filesystem layer.

use std::fmt;

use al_core::{Error, Result};

/// Manifest file name inside a fingerprint's store directory.
pub const MANIFEST_FILE_NAME: &str = "index.m3u8";

/// printf-style pattern handed to the transcoder.
pub const SEGMENT_FILE_PATTERN: &str = "seg_%05d.ts";

/// Largest sequence number the server will serve.
pub const MAX_SEGMENT_SEQUENCE: u64 = 9_999_999;

const SEGMENT_PREFIX: &str = "seg_";
const SEGMENT_SUFFIX: &str = ".ts";
const MAX_DIGITS: usize = 7;

/// File name for segment `seq` (matches [`SEGMENT_FILE_PATTERN`]).
pub fn segment_file_name(seq: u64) -> String {
    format!("{SEGMENT_PREFIX}{seq:05}{SEGMENT_SUFFIX}")
}

/// Parse a segment file name written by the transcoder.
///
/// Returns `None` for anything else, including the transcoder's `.tmp`
/// files and the manifest.
pub fn parse_segment_file_name(name: &str) -> Option<u64> {
    let digits = name.strip_prefix(SEGMENT_PREFIX)?.strip_suffix(SEGMENT_SUFFIX)?;
    parse_digits(digits)
}

fn parse_digits(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Leading zeros are expected (`00042`), so cap the significant digits.
    let significant = digits.trim_start_matches('0');
    if significant.len() > MAX_DIGITS {
        return None;
    }
    let value: u64 = if significant.is_empty() {
        0
    } else {
        significant.parse().ok()?
    };
    (value <= MAX_SEGMENT_SEQUENCE).then_some(value)
}

/// A validated segment sequence number in `0..=MAX_SEGMENT_SEQUENCE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentSeq(u64);

impl SegmentSeq {
    /// Validate a raw sequence number.
    pub fn new(seq: u64) -> Result<Self> {
        if seq > MAX_SEGMENT_SEQUENCE {
            return Err(Error::PathRejected(format!(
                "segment sequence {seq} exceeds {MAX_SEGMENT_SEQUENCE}"
            )));
        }
        Ok(Self(seq))
    }

    /// Parse the segment component of a request path.
    ///
    /// Accepts `seg_00003.ts`, `00003.ts`, or `3`.
    pub fn from_request(raw: &str) -> Result<Self> {
        // A generous length cap keeps pathological input cheap to reject.
        if raw.len() > 32 {
            return Err(Error::PathRejected("segment name too long".into()));
        }
        let without_prefix = raw.strip_prefix(SEGMENT_PREFIX).unwrap_or(raw);
        let digits = without_prefix
            .strip_suffix(SEGMENT_SUFFIX)
            .unwrap_or(without_prefix);
        parse_digits(digits)
            .map(Self)
            .ok_or_else(|| Error::PathRejected(format!("invalid segment name: {raw}")))
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// File name of this segment inside the store.
    pub fn file_name(self) -> String {
        segment_file_name(self.0)
    }
}

impl fmt::Display for SegmentSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
