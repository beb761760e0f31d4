//! al-core: shared identifiers, errors, and configuration.
//!
//! This crate is the foundational dependency for the other al-* crates,
//! providing the validated content [`Fingerprint`], a unified error type, and
//! the application configuration.

pub mod config;
pub mod error;
pub mod fingerprint;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
