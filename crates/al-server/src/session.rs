//! Runtime record of one transcoder process.
//!
//! A [`Session`] is owned by its supervisor task; the registry only keeps a
//! weak reference for lookup. State changes go through a `watch` channel so
//! callers can await termination without polling.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use al_core::Fingerprint;

/// Why a session ended unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The transcoder could not be started at all.
    SpawnFailure,
    /// The transcoder could not read from the upstream source.
    UpstreamUnreachable,
    /// Non-zero or abnormal exit mid-stream.
    ProcessCrashed { code: Option<i32> },
    /// The supervisor went away before the process was seen to exit.
    Aborted,
}

/// Lifecycle state of a session. Terminal states are final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Starting,
    Running,
    Exited { code: Option<i32> },
    Failed { reason: FailureReason },
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited { .. } | Self::Failed { .. })
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Running => 1,
            Self::Exited { .. } | Self::Failed { .. } => 2,
        }
    }
}

/// Serializable view of a session for diagnostics endpoints.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct SessionSnapshot {
    pub id: String,
    pub fingerprint: String,
    pub state: SessionState,
    pub pid: Option<u32>,
    #[schema(value_type = String)]
    pub started_at: DateTime<Utc>,
    /// Set once the session has been torn down.
    #[schema(value_type = Option<String>)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Seconds since the last read of this session's manifest or segments.
    pub idle_secs: u64,
    /// Most recent transcoder stderr lines, oldest first.
    pub diagnostics: Vec<String>,
}

/// One transcoder process and everything known about it.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    fingerprint: Fingerprint,
    started_at: DateTime<Utc>,
    pid: Option<u32>,
    state: watch::Sender<SessionState>,
    last_access: Mutex<Instant>,
    diagnostics: Mutex<VecDeque<String>>,
    diagnostic_capacity: usize,
    cancel: CancellationToken,
    stop_requested: AtomicBool,
}

impl Session {
    pub(crate) fn new(fingerprint: Fingerprint, pid: Option<u32>, diagnostic_capacity: usize) -> Self {
        let (state, _) = watch::channel(SessionState::Starting);
        Self {
            id: Uuid::new_v4(),
            fingerprint,
            started_at: Utc::now(),
            pid,
            state,
            last_access: Mutex::new(Instant::now()),
            diagnostics: Mutex::new(VecDeque::with_capacity(diagnostic_capacity.min(256))),
            diagnostic_capacity,
            cancel: CancellationToken::new(),
            stop_requested: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Move to `next` if that is a forward transition.
    ///
    /// Returns `false` (and changes nothing) when the session is already
    /// terminal or `next` would move it backwards.
    pub(crate) fn transition(&self, next: SessionState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if current.is_terminal() || next.rank() < current.rank() || *current == next {
                return false;
            }
            *current = next.clone();
            true
        });
        if changed {
            tracing::debug!(
                fingerprint = %self.fingerprint,
                session_id = %self.id,
                state = ?next,
                "Session state changed"
            );
        }
        changed
    }

    /// Wait until the session reaches a terminal state.
    pub async fn wait_terminal(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(SessionState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    /// Record read activity.
    pub fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_access.lock().elapsed()
    }

    pub(crate) fn push_diagnostic(&self, line: impl Into<String>) {
        if self.diagnostic_capacity == 0 {
            return;
        }
        let mut lines = self.diagnostics.lock();
        while lines.len() >= self.diagnostic_capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// Captured transcoder stderr, oldest first.
    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.lock().iter().cloned().collect()
    }

    /// Ask the supervisor to terminate the process.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.cancel.cancel();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.to_string(),
            fingerprint: self.fingerprint.to_string(),
            state: self.state(),
            pid: self.pid,
            started_at: self.started_at,
            ended_at: None,
            idle_secs: self.idle_for().as_secs(),
            diagnostics: self.diagnostics(),
        }
    }
}
