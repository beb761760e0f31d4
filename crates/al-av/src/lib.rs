//! # al-av
//!
//! External transcoder management for acelive.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the path to ffmpeg.
//! - **Command execution** ([`ToolCommand`]) -- async builder for one-shot runs
//!   with timeout support and for long-running supervised processes.
//! - **Live HLS transcoding** ([`LiveTranscode`]) -- the ffmpeg invocation that
//!   turns an upstream transport stream into a rolling manifest and segments.
//! - **Exit classification** ([`classify_exit`]) -- map a finished transcoder
//!   to success, upstream failure, or crash.

pub mod command;
pub mod live;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use live::{classify_exit, ExitKind, LiveTranscode};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
