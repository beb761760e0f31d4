//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds a full [`AppContext`] over a
//! temporary segment store. Transcoders are replaced by `sh` scripts so tests
//! control exactly what a "transcoder" does. [`TestHarness::with_server`]
//! starts Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use al_av::{ToolCommand, ToolRegistry};
use al_core::config::Config;
use al_core::Fingerprint;
use al_media::{generate_media_playlist, segment_file_name, MediaPlaylist, Segment, SegmentSeq};
use al_server::context::AppContext;
use al_server::controller::Launcher;
use al_server::router::build_router;
use al_server::store::SegmentStore;

/// A transcoder that runs an `sh` script with the store directory as `$1`
/// and the upstream URL as `$2`.
pub struct ScriptLauncher {
    script: String,
    launches: Arc<AtomicUsize>,
}

impl Launcher for ScriptLauncher {
    fn command(&self, _fp: &Fingerprint, source_url: &str, dir: &Path) -> al_core::Result<ToolCommand> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let mut cmd = ToolCommand::new(PathBuf::from("sh"));
        cmd.args(["-c", self.script.as_str(), "transcoder"]);
        cmd.arg(dir.to_string_lossy().as_ref());
        cmd.arg(source_url);
        Ok(cmd)
    }
}

/// A transcoder whose executable does not exist.
pub struct MissingLauncher {
    launches: Arc<AtomicUsize>,
}

impl Launcher for MissingLauncher {
    fn command(&self, _fp: &Fingerprint, _url: &str, _dir: &Path) -> al_core::Result<ToolCommand> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(ToolCommand::new(PathBuf::from("/nonexistent/bin/ffmpeg")))
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`] backed by a
/// temporary store directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub launches: Arc<AtomicUsize>,
    _store_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Harness whose transcoder idles until stopped.
    pub fn new() -> Self {
        Self::with_script("exec sleep 30")
    }

    pub fn with_script(script: &str) -> Self {
        Self::with_config_and_script(Config::default(), script)
    }

    pub fn with_config_and_script(config: Config, script: &str) -> Self {
        let launches = Arc::new(AtomicUsize::new(0));
        let launcher = Arc::new(ScriptLauncher {
            script: script.to_string(),
            launches: launches.clone(),
        });
        Self::build(config, launcher, launches)
    }

    /// Harness whose transcoder can never be spawned.
    pub fn with_missing_transcoder() -> Self {
        let launches = Arc::new(AtomicUsize::new(0));
        let launcher = Arc::new(MissingLauncher {
            launches: launches.clone(),
        });
        Self::build(Config::default(), launcher, launches)
    }

    fn build(mut config: Config, launcher: Arc<dyn Launcher>, launches: Arc<AtomicUsize>) -> Self {
        let store_dir = tempfile::tempdir().expect("failed to create store dir");
        config.live.store_root = store_dir.path().to_path_buf();
        config.live.linger_secs = 0;
        config.live.stop_timeout_secs = 2;

        let ctx = AppContext::with_launcher(config, Arc::new(ToolRegistry::default()), launcher);
        Self {
            ctx,
            launches,
            _store_dir: store_dir,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    pub async fn serve(self) -> (Self, SocketAddr) {
        let app = build_router(self.ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    pub fn store(&self) -> &SegmentStore {
        self.ctx.store()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Play the transcoder: write segments `range` and a manifest listing
    /// exactly those segments.
    pub fn write_window(&self, fp: &Fingerprint, range: std::ops::RangeInclusive<u64>) {
        for n in range.clone() {
            self.store()
                .write_segment(fp, SegmentSeq::new(n).unwrap(), segment_payload(n).as_bytes())
                .expect("failed to write segment");
        }
        self.store()
            .write_manifest(fp, manifest(range).as_bytes())
            .expect("failed to write manifest");
    }
}

/// Body written for segment `n` by [`TestHarness::write_window`].
pub fn segment_payload(n: u64) -> String {
    format!("segment {n}")
}

/// Live playlist listing `range` with 2 s segments.
pub fn manifest(range: std::ops::RangeInclusive<u64>) -> String {
    generate_media_playlist(&MediaPlaylist {
        version: 3,
        target_duration: 2,
        media_sequence: *range.start(),
        segments: range
            .map(|n| Segment {
                duration: 2.0,
                uri: segment_file_name(n),
                title: None,
            })
            .collect(),
        ended: false,
    })
}

pub fn fingerprint(c: char) -> Fingerprint {
    Fingerprint::parse(&c.to_string().repeat(40)).unwrap()
}

/// POST /api/convert with `link`.
pub async fn convert(addr: SocketAddr, link: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/api/convert"))
        .json(&serde_json::json!({ "link": link }))
        .send()
        .await
        .unwrap()
}

/// Poll `check` every 20 ms until it returns true or `timeout` passes.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
