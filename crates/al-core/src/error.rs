//! Unified error type for acelive.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].

use std::fmt;

/// Unified error type covering all failure modes in acelive.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The content fingerprint is not 40 hexadecimal characters.
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// A segment request carried a malformed or out-of-range sequence number.
    #[error("Rejected segment path: {0}")]
    PathRejected(String),

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "segment", "session").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// An external tool (ffmpeg) could not be started or returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The service is not accepting new work (e.g. during shutdown).
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidFingerprint(_) => 400,
            Error::PathRejected(_) => 400,
            Error::Validation(_) => 400,
            Error::NotFound { .. } => 404,
            Error::Tool { .. } => 502,
            Error::Unavailable(_) => 503,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
