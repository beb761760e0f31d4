//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the HTTP server, the upstream media source, the transcoder
//! invocation, and live session housekeeping. Every section defaults sensibly
//! so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::{Error, Fingerprint};

/// Default locations searched when no config path is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./acelive.json",
    "~/.config/acelive/config.json",
    "/etc/acelive/config.json",
];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub transcoder: TranscoderConfig,
    pub live: LiveConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from an explicit path, or from the first default
    /// location that exists, falling back to defaults.
    ///
    /// An explicit path that cannot be read or parsed is an error; a missing
    /// default location is not.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let contents = std::fs::read_to_string(path)?;
            return Self::from_json(&contents);
        }

        for candidate in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(candidate);
            let candidate = Path::new(expanded.as_ref());
            if candidate.exists() {
                tracing::info!("Loading config from {}", candidate.display());
                let contents = std::fs::read_to_string(candidate)?;
                return Self::from_json(&contents);
            }
        }

        tracing::info!("No config file found; using defaults");
        Ok(Self::default())
    }

    /// Apply the environment variable overrides understood by the proxy web
    /// interface (`ACESTREAM_PROXY_HOST`, `ACESTREAM_PROXY_PORT`, `WEB_HOST`,
    /// `WEB_PORT`).
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides using a custom lookup function.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("ACESTREAM_PROXY_HOST") {
            self.upstream.host = host;
        }
        if let Some(port) = lookup("ACESTREAM_PROXY_PORT") {
            match port.parse() {
                Ok(p) => self.upstream.port = p,
                Err(_) => tracing::warn!("Ignoring invalid ACESTREAM_PROXY_PORT={port}"),
            }
        }
        if let Some(host) = lookup("WEB_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("WEB_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("Ignoring invalid WEB_PORT={port}"),
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.server.manifest_links == ManifestLinks::Absolute {
            if let Some(ref base) = self.server.public_base_url {
                if base.ends_with('/') {
                    warnings.push("server.public_base_url should not end with '/'".into());
                }
            }
        }

        if self.upstream.host.is_empty() {
            warnings.push("upstream.host is empty".into());
        }

        if self.transcoder.segment_duration_secs == 0 {
            warnings.push("transcoder.segment_duration_secs is 0".into());
        }

        if self.transcoder.window_size == 0 {
            warnings.push("transcoder.window_size is 0; no segments would be retained".into());
        }

        if self.live.idle_timeout_secs > 0
            && self.live.idle_timeout_secs < u64::from(self.transcoder.segment_duration_secs)
        {
            warnings.push(format!(
                "live.idle_timeout_secs ({}) is shorter than one segment ({}s)",
                self.live.idle_timeout_secs, self.transcoder.segment_duration_secs
            ));
        }

        if self.live.reap_interval_secs == 0 {
            warnings.push("live.reap_interval_secs is 0; idle sessions will not be reaped".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// How segment references are written into served manifests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestLinks {
    /// Serve the transcoder's manifest verbatim; segment names resolve
    /// relative to the manifest URL.
    #[default]
    Relative,
    /// Rewrite every segment reference to a full server path.
    Absolute,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
    pub manifest_links: ManifestLinks,
    /// Prefix for absolute segment links (e.g. `https://tv.example.com`).
    /// When unset, absolute links are root-relative paths.
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            static_dir: None,
            manifest_links: ManifestLinks::Relative,
            public_base_url: None,
        }
    }
}

/// Upstream media source (the AceStream engine HTTP API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub host: String,
    pub port: u16,
    /// Port advertised to browsers for direct MPEG-TS playback.
    pub public_port: u16,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6878,
            public_port: 6878,
        }
    }
}

impl UpstreamConfig {
    /// Base URL of the upstream engine as reachable from this server.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Pull URL the transcoder reads the transport stream from.
    pub fn source_url(&self, fingerprint: &Fingerprint) -> String {
        format!("{}/ace/getstream?id={fingerprint}", self.base_url())
    }

    /// Base URL of the upstream engine as reachable from a browser that
    /// contacted this server via `request_host`.
    pub fn public_base(&self, request_host: &str) -> String {
        let host = strip_port(request_host);
        format!("http://{host}:{}", self.public_port)
    }

    /// Raw MPEG-TS URL for browsers.
    pub fn public_stream_url(&self, request_host: &str, fingerprint: &Fingerprint) -> String {
        format!(
            "{}/ace/getstream?id={fingerprint}",
            self.public_base(request_host)
        )
    }
}

/// Drop a trailing `:port` from a Host header value, keeping IPv6 brackets.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

/// Parameters of the external transcoder invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub segment_duration_secs: u32,
    pub window_size: usize,
    /// Let the transcoder delete segments that fall out of its playlist.
    pub delete_segments: bool,
    pub copy_video: bool,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Pass HTTP reconnect flags so short upstream hiccups do not end the session.
    pub reconnect: bool,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            segment_duration_secs: 2,
            window_size: 10,
            delete_segments: true,
            copy_video: true,
            audio_codec: "aac".into(),
            audio_bitrate: "128k".into(),
            reconnect: true,
        }
    }
}

impl TranscoderConfig {
    pub fn segment_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.segment_duration_secs.max(1)))
    }
}

/// Live session housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Directory holding one sub-directory per fingerprint.
    pub store_root: PathBuf,
    /// Stop sessions that have not been read for this long (0 disables).
    pub idle_timeout_secs: u64,
    pub reap_interval_secs: u64,
    /// Grace period between SIGTERM and SIGKILL when stopping a transcoder.
    pub stop_timeout_secs: u64,
    /// How long a store survives its session for trailing reads.
    pub linger_secs: u64,
    /// Number of transcoder stderr lines kept for failure reports.
    pub diagnostic_lines: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("./data/live"),
            idle_timeout_secs: 60,
            reap_interval_secs: 10,
            stop_timeout_secs: 5,
            linger_secs: 10,
            diagnostic_lines: 64,
        }
    }
}

impl LiveConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_secs(self.linger_secs)
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
}
