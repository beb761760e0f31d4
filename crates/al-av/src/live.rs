//! Live HLS transcoding: one ffmpeg process pulling an upstream transport
//! stream and writing a rolling manifest plus numbered segments.

use std::path::{Path, PathBuf};

use al_core::config::TranscoderConfig;
use al_media::{MANIFEST_FILE_NAME, SEGMENT_FILE_PATTERN};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Upper bound between reconnect attempts when the upstream drops.
const RECONNECT_DELAY_MAX_SECS: u32 = 5;

/// Substrings in transcoder stderr that point at the upstream rather than
/// the transcoder itself.
const UPSTREAM_FAILURE_PATTERNS: &[&str] = &[
    "Connection refused",
    "Connection timed out",
    "Connection reset by peer",
    "Failed to resolve",
    "Name or service not known",
    "Server returned",
    "Input/output error",
    "No route to host",
    "Stream ends prematurely",
];

/// Parameters for one live transcode.
#[derive(Debug, Clone)]
pub struct LiveTranscode {
    source_url: String,
    output_dir: PathBuf,
    config: TranscoderConfig,
}

impl LiveTranscode {
    pub fn new(config: &TranscoderConfig, source_url: impl Into<String>, output_dir: &Path) -> Self {
        Self {
            source_url: source_url.into(),
            output_dir: output_dir.to_path_buf(),
            config: config.clone(),
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(MANIFEST_FILE_NAME)
    }

    /// Build the command using the ffmpeg found in `tools`.
    pub fn command(&self, tools: &ToolRegistry) -> al_core::Result<ToolCommand> {
        let ffmpeg = tools.require("ffmpeg")?;
        Ok(self.command_with(ffmpeg.path.clone()))
    }

    /// Build the command for an explicit ffmpeg binary.
    ///
    /// The segment pattern and manifest name are fixed so the store can
    /// locate files by sequence number alone.
    pub fn command_with(&self, ffmpeg: PathBuf) -> ToolCommand {
        let seg_pattern = self.output_dir.join(SEGMENT_FILE_PATTERN);
        let playlist_path = self.manifest_path();

        let mut flags = vec!["temp_file"];
        if self.config.delete_segments {
            flags.insert(0, "delete_segments");
        }

        let mut cmd = ToolCommand::new(ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "warning"]);
        if self.config.reconnect {
            cmd.args(["-reconnect", "1", "-reconnect_streamed", "1"]);
            cmd.args([
                "-reconnect_delay_max",
                &RECONNECT_DELAY_MAX_SECS.to_string(),
            ]);
        }
        cmd.args(["-i", &self.source_url]);
        cmd.args(["-map", "0:v?", "-map", "0:a?"]);
        if self.config.copy_video {
            cmd.args(["-c:v", "copy"]);
        } else {
            cmd.args(["-c:v", "libx264", "-preset", "veryfast"]);
        }
        cmd.args(["-c:a", &self.config.audio_codec]);
        cmd.args(["-b:a", &self.config.audio_bitrate]);
        cmd.args(["-f", "hls"]);
        cmd.args(["-hls_time", &self.config.segment_duration_secs.max(1).to_string()]);
        cmd.args(["-hls_list_size", &self.config.window_size.to_string()]);
        cmd.args(["-hls_flags", &flags.join("+")]);
        cmd.args(["-hls_segment_filename", &seg_pattern.to_string_lossy()]);
        cmd.arg(playlist_path.to_string_lossy().as_ref());
        cmd
    }
}

/// How a transcoder run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitKind {
    /// Exit status 0 (upstream ended the stream).
    Success,
    /// The transcoder could not read from the upstream; carries the matching
    /// diagnostic line.
    UpstreamUnreachable(String),
    /// Any other non-zero exit or signal death.
    Crashed { code: Option<i32> },
}

/// Classify a finished transcoder from its exit code and recent stderr.
///
/// `code` is `None` when the process was killed by a signal.
pub fn classify_exit<'a>(
    code: Option<i32>,
    diagnostics: impl IntoIterator<Item = &'a str>,
) -> ExitKind {
    if code == Some(0) {
        return ExitKind::Success;
    }

    let upstream_line = diagnostics
        .into_iter()
        .find(|line| UPSTREAM_FAILURE_PATTERNS.iter().any(|p| line.contains(p)));

    match upstream_line {
        Some(line) if code.is_some() => ExitKind::UpstreamUnreachable(line.trim().to_string()),
        _ => ExitKind::Crashed { code },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcode(config: &TranscoderConfig) -> LiveTranscode {
        LiveTranscode::new(
            config,
            "http://localhost:6878/ace/getstream?id=abc",
            Path::new("/data/live/abc"),
        )
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn default_command_line() {
        let cmd = transcode(&TranscoderConfig::default()).command_with(PathBuf::from("/usr/bin/ffmpeg"));
        let args = cmd.get_args();

        assert_eq!(cmd.program(), Path::new("/usr/bin/ffmpeg"));
        assert_eq!(
            value_after(args, "-i"),
            Some("http://localhost:6878/ace/getstream?id=abc")
        );
        assert_eq!(value_after(args, "-c:v"), Some("copy"));
        assert_eq!(value_after(args, "-c:a"), Some("aac"));
        assert_eq!(value_after(args, "-b:a"), Some("128k"));
        assert_eq!(value_after(args, "-f"), Some("hls"));
        assert_eq!(value_after(args, "-hls_time"), Some("2"));
        assert_eq!(value_after(args, "-hls_list_size"), Some("10"));
        assert_eq!(
            value_after(args, "-hls_flags"),
            Some("delete_segments+temp_file")
        );
        assert_eq!(
            value_after(args, "-hls_segment_filename"),
            Some("/data/live/abc/seg_%05d.ts")
        );
        assert_eq!(args.last().map(String::as_str), Some("/data/live/abc/index.m3u8"));
        assert_eq!(value_after(args, "-reconnect"), Some("1"));
    }

    #[test]
    fn input_follows_reconnect_flags() {
        let cmd = transcode(&TranscoderConfig::default()).command_with(PathBuf::from("ffmpeg"));
        let args = cmd.get_args();
        let input = args.iter().position(|a| a == "-i").unwrap();
        let reconnect = args.iter().position(|a| a == "-reconnect").unwrap();
        assert!(reconnect < input);
    }

    #[test]
    fn options_toggle_flags() {
        let config = TranscoderConfig {
            delete_segments: false,
            copy_video: false,
            reconnect: false,
            window_size: 4,
            ..TranscoderConfig::default()
        };
        let cmd = transcode(&config).command_with(PathBuf::from("ffmpeg"));
        let args = cmd.get_args();

        assert_eq!(value_after(args, "-hls_flags"), Some("temp_file"));
        assert_eq!(value_after(args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(args, "-hls_list_size"), Some("4"));
        assert!(!args.iter().any(|a| a == "-reconnect"));
    }

    #[test]
    fn command_requires_ffmpeg() {
        let result = transcode(&TranscoderConfig::default()).command(&ToolRegistry::default());
        assert!(matches!(result, Err(al_core::Error::Tool { .. })));

        let tools = ToolRegistry::default().with_tool("ffmpeg", PathBuf::from("/opt/ffmpeg"));
        let cmd = transcode(&TranscoderConfig::default()).command(&tools).unwrap();
        assert_eq!(cmd.program(), Path::new("/opt/ffmpeg"));
    }

    #[test]
    fn classify_success() {
        assert_eq!(classify_exit(Some(0), ["Connection refused"]), ExitKind::Success);
    }

    #[test]
    fn classify_upstream_failure() {
        let lines = [
            "[tcp @ 0x55] Starting connection attempt",
            "[tcp @ 0x55] Connection to tcp://localhost:6878 failed: Connection refused",
            "http://localhost:6878/ace/getstream?id=abc: Connection refused",
        ];
        match classify_exit(Some(1), lines) {
            ExitKind::UpstreamUnreachable(line) => assert!(line.contains("Connection refused")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            classify_exit(Some(8), ["Server returned 404 Not Found"]),
            ExitKind::UpstreamUnreachable(_)
        ));
    }

    #[test]
    fn classify_crash() {
        assert_eq!(
            classify_exit(Some(139), ["Segmentation fault"]),
            ExitKind::Crashed { code: Some(139) }
        );
        assert_eq!(
            classify_exit(None, ["Connection refused"]),
            ExitKind::Crashed { code: None }
        );
        assert_eq!(
            classify_exit(Some(1), std::iter::empty()),
            ExitKind::Crashed { code: Some(1) }
        );
    }
}
