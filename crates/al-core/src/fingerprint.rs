//! Content fingerprint: the 40-hex-character key for every session and store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Length of a fingerprint in characters.
pub const FINGERPRINT_LEN: usize = 40;

/// Link scheme accepted in front of a fingerprint.
const LINK_SCHEME: &str = "acestream://";

/// A validated content fingerprint (40 lowercase hex characters).
///
/// Construction always goes through [`Fingerprint::parse`], so any value of
/// this type is safe to embed in a filesystem path or URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse a bare fingerprint. Upper-case hex is accepted and normalised.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != FINGERPRINT_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidFingerprint(truncate_for_display(s)));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Extract a fingerprint from user input: either an `acestream://` link or
    /// a bare fingerprint, with surrounding whitespace ignored.
    pub fn extract(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let candidate = trimmed.strip_prefix(LINK_SCHEME).unwrap_or(trimmed);
        Self::parse(candidate)
    }

    /// Borrow the fingerprint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn truncate_for_display(s: &str) -> String {
    const MAX: usize = 64;
    if s.chars().count() <= MAX {
        s.to_string()
    } else {
        let head: String = s.chars().take(MAX).collect();
        format!("{head}...")
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = Error;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FP: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn parses_lowercase_hex() {
        let fp = Fingerprint::parse(FP).unwrap();
        assert_eq!(fp.as_str(), FP);
    }

    #[test]
    fn normalises_uppercase() {
        let fp = Fingerprint::parse("ABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        assert_eq!(fp.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            Fingerprint::parse("abc"),
            Err(Error::InvalidFingerprint(_))
        ));
        assert!(Fingerprint::parse(&format!("{FP}a")).is_err());
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "g".repeat(FINGERPRINT_LEN);
        assert!(Fingerprint::parse(&bad).is_err());
        let traversal = format!("../{}", "a".repeat(FINGERPRINT_LEN - 3));
        assert!(Fingerprint::parse(&traversal).is_err());
    }

    #[test]
    fn extract_from_link() {
        let fp = Fingerprint::extract(&format!("  acestream://{FP}\n")).unwrap();
        assert_eq!(fp.as_str(), FP);
    }

    #[test]
    fn extract_bare() {
        let fp = Fingerprint::extract(FP).unwrap();
        assert_eq!(fp.to_string(), FP);
    }

    #[test]
    fn extract_rejects_bad_link() {
        assert!(Fingerprint::extract("acestream://nothex").is_err());
        assert!(Fingerprint::extract("").is_err());
        assert!(Fingerprint::extract("http://example.com").is_err());
    }

    #[test]
    fn serde_validates() {
        let json = format!("\"{FP}\"");
        let fp: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&fp).unwrap(), json);
        assert!(serde_json::from_str::<Fingerprint>("\"short\"").is_err());
    }

    #[test]
    fn long_input_is_truncated_in_error() {
        let long = "z".repeat(500);
        let err = Fingerprint::parse(&long).unwrap_err();
        assert!(err.to_string().len() < 200);
    }
}
