//! Session lifecycle: launching the transcoder, supervising it, and tearing
//! everything down when it ends.
//!
//! Each started session gets one supervisor task that owns the child process
//! and the `Arc<Session>`. A drop guard inside that task performs cleanup, so
//! the registry entry is released and the store scheduled for reclaim on
//! every exit path: natural exit, stop request, or the task being aborted.

use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::task::JoinHandle;

use al_av::{classify_exit, ExitKind, LiveTranscode, ToolCommand, ToolRegistry};
use al_core::config::{Config, TranscoderConfig};
use al_core::{Fingerprint, Result};

use crate::registry::SessionTable;
use crate::session::{FailureReason, Session, SessionState};
use crate::store::SegmentStore;

/// How long the supervisor waits for the stderr reader to drain after the
/// process exited, before classifying the exit.
const DIAGNOSTIC_DRAIN: Duration = Duration::from_millis(250);

/// Produces the transcoder command for a fingerprint.
pub trait Launcher: Send + Sync {
    fn command(&self, fp: &Fingerprint, source_url: &str, output_dir: &Path) -> Result<ToolCommand>;
}

/// Production launcher: ffmpeg HLS live packaging.
pub struct FfmpegLauncher {
    tools: Arc<ToolRegistry>,
    transcoder: TranscoderConfig,
}

impl FfmpegLauncher {
    pub fn new(tools: Arc<ToolRegistry>, transcoder: TranscoderConfig) -> Self {
        Self { tools, transcoder }
    }
}

impl Launcher for FfmpegLauncher {
    fn command(&self, _fp: &Fingerprint, source_url: &str, output_dir: &Path) -> Result<ToolCommand> {
        LiveTranscode::new(&self.transcoder, source_url, output_dir).command(&self.tools)
    }
}

/// Timing and sizing knobs for supervised sessions.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Segments kept on disk per fingerprint.
    pub window_size: usize,
    /// How often the supervisor enforces the retention window.
    pub retention_interval: Duration,
    /// Grace period between SIGTERM and SIGKILL.
    pub stop_timeout: Duration,
    /// How long a store outlives its session.
    pub linger: Duration,
    pub diagnostic_lines: usize,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window_size: config.transcoder.window_size,
            retention_interval: config.transcoder.segment_duration(),
            stop_timeout: config.live.stop_timeout(),
            linger: config.live.linger(),
            diagnostic_lines: config.live.diagnostic_lines,
        }
    }
}

/// Starts and supervises transcoder processes.
#[derive(Clone)]
pub struct LiveController {
    store: SegmentStore,
    launcher: Arc<dyn Launcher>,
    settings: ControllerSettings,
}

impl LiveController {
    pub fn new(store: SegmentStore, launcher: Arc<dyn Launcher>, settings: ControllerSettings) -> Self {
        Self {
            store,
            launcher,
            settings,
        }
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Start a transcoder for `fp` and return its session.
    ///
    /// Never blocks on the process. If it cannot be spawned, the returned
    /// session is already `Failed(SpawnFailure)` and no supervisor exists;
    /// the caller must not register it. Only a failure to prepare the store
    /// directory is returned as an error.
    ///
    /// This is synchronous so the registry can call it while holding its
    /// entry lock.
    pub(crate) fn start(
        &self,
        fp: &Fingerprint,
        source_url: &str,
        table: &Arc<SessionTable>,
    ) -> Result<Arc<Session>> {
        let dir = self.store.prepare(fp)?;

        let spawned = self
            .launcher
            .command(fp, source_url, &dir)
            .and_then(|cmd| cmd.spawn().map(|child| (cmd, child)));

        let (cmd, mut child) = match spawned {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!(fingerprint = %fp, "Failed to start transcoder: {e}");
                let session = Arc::new(Session::new(fp.clone(), None, self.settings.diagnostic_lines));
                session.push_diagnostic(e.to_string());
                session.transition(SessionState::Failed {
                    reason: FailureReason::SpawnFailure,
                });
                table.record_exit(&session);
                self.store.remove(fp);
                return Ok(session);
            }
        };

        let session = Arc::new(Session::new(
            fp.clone(),
            child.id(),
            self.settings.diagnostic_lines,
        ));
        session.transition(SessionState::Running);

        tracing::info!(
            fingerprint = %fp,
            session_id = %session.id(),
            pid = ?session.pid(),
            program = %cmd.program_name(),
            "Transcoder started"
        );

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(capture_diagnostics(stderr, session.clone())));

        let guard = SessionGuard {
            session: session.clone(),
            table: table.clone(),
            store: self.store.clone(),
            linger: self.settings.linger,
        };
        tokio::spawn(supervise(
            child,
            guard,
            stderr_task,
            self.store.clone(),
            self.settings.clone(),
        ));

        Ok(session)
    }
}

/// Read transcoder stderr into the session's diagnostics ring buffer.
async fn capture_diagnostics(stderr: ChildStderr, session: Arc<Session>) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                tracing::trace!(fingerprint = %session.fingerprint(), "ffmpeg: {line}");
                session.push_diagnostic(line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(fingerprint = %session.fingerprint(), "stderr read failed: {e}");
                break;
            }
        }
    }
}

/// Wait for the process to end (or be stopped), enforce retention while it
/// runs, then record the outcome.
async fn supervise(
    mut child: Child,
    guard: SessionGuard,
    stderr_task: Option<JoinHandle<()>>,
    store: SegmentStore,
    settings: ControllerSettings,
) {
    let session = guard.session.clone();
    let fp = session.fingerprint().clone();
    let cancel = session.cancel_token();

    let mut retention = tokio::time::interval(settings.retention_interval);
    retention.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = cancel.cancelled() => break terminate(&mut child, settings.stop_timeout, &fp).await,
            _ = retention.tick() => {
                let store = store.clone();
                let fp = fp.clone();
                let keep = settings.window_size;
                let result = tokio::task::spawn_blocking(move || store.evict_oldest(&fp, keep)).await;
                match result {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::warn!(fingerprint = %session.fingerprint(), "Retention pass failed: {e}"),
                    Err(e) => tracing::warn!(fingerprint = %session.fingerprint(), "Retention task failed: {e}"),
                }
            }
        }
    };

    if let Some(task) = stderr_task {
        let _ = tokio::time::timeout(DIAGNOSTIC_DRAIN, task).await;
    }

    let next = match status {
        Ok(status) => outcome(&session, status),
        Err(e) => {
            tracing::error!(fingerprint = %fp, "Failed to wait for transcoder: {e}");
            session.push_diagnostic(format!("wait failed: {e}"));
            SessionState::Failed {
                reason: FailureReason::ProcessCrashed { code: None },
            }
        }
    };
    session.transition(next);

    drop(guard);
}

/// Map an exit status to the session's terminal state.
fn outcome(session: &Session, status: ExitStatus) -> SessionState {
    let code = status.code();
    if session.stop_requested() {
        return SessionState::Exited { code };
    }

    let diagnostics = session.diagnostics();
    match classify_exit(code, diagnostics.iter().map(String::as_str)) {
        ExitKind::Success => SessionState::Exited { code },
        ExitKind::UpstreamUnreachable(line) => {
            tracing::warn!(fingerprint = %session.fingerprint(), "Upstream unreachable: {line}");
            SessionState::Failed {
                reason: FailureReason::UpstreamUnreachable,
            }
        }
        ExitKind::Crashed { code } => {
            tracing::warn!(
                fingerprint = %session.fingerprint(),
                code = ?code,
                last_line = diagnostics.last().map(String::as_str).unwrap_or(""),
                "Transcoder crashed"
            );
            SessionState::Failed {
                reason: FailureReason::ProcessCrashed { code },
            }
        }
    }
}

/// SIGTERM, wait up to `grace`, then SIGKILL.
async fn terminate(
    child: &mut Child,
    grace: Duration,
    fp: &Fingerprint,
) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: `pid` is our own child and has not been reaped (`id()`
            // returns `None` after that), so it cannot name another process.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                tracing::debug!(
                    fingerprint = %fp,
                    "SIGTERM failed: {}",
                    std::io::Error::last_os_error()
                );
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!(fingerprint = %fp, "Transcoder ignored SIGTERM; killing");
            child.kill().await?;
            child.wait().await
        }
    }
}

/// Cleanup that runs when the supervisor finishes or is dropped.
struct SessionGuard {
    session: Arc<Session>,
    table: Arc<SessionTable>,
    store: SegmentStore,
    linger: Duration,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let session = &self.session;
        session.transition(SessionState::Failed {
            reason: FailureReason::Aborted,
        });

        self.table.release(session);
        self.table.record_exit(session);

        tracing::info!(
            fingerprint = %session.fingerprint(),
            session_id = %session.id(),
            state = ?session.state(),
            "Transcoder session ended"
        );

        let fp = session.fingerprint().clone();
        let table = self.table.clone();
        let store = self.store.clone();
        let linger = self.linger;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                tokio::time::sleep(linger).await;
                table.reclaim_store(&fp, &store);
            });
        } else {
            table.reclaim_store(&fp, &store);
        }
    }
}
