//! Fingerprint to session mapping.
//!
//! [`SessionRegistry::get_or_start`] is the only way sessions come into
//! existence. The check for a live session and the insertion of a new one
//! happen under a single `DashMap` entry lock, so any number of concurrent
//! callers for one fingerprint end up with the same session and exactly one
//! transcoder process.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use al_core::config::UpstreamConfig;
use al_core::{Error, Fingerprint, Result};

use crate::controller::LiveController;
use crate::session::{Session, SessionSnapshot};
use crate::store::SegmentStore;

/// Extra time a stop request may take beyond the SIGTERM grace period.
const STOP_SLACK: Duration = Duration::from_secs(2);

/// Most exit snapshots kept; the oldest is dropped when a new one would
/// exceed this.
pub const EXIT_SNAPSHOT_CAPACITY: usize = 256;

/// An exit snapshot and its insertion order.
#[derive(Debug)]
struct ExitRecord {
    order: u64,
    snapshot: SessionSnapshot,
}

/// Shared maps behind the registry. Supervisors hold an `Arc` to release
/// their own entry when they finish.
#[derive(Debug)]
pub struct SessionTable {
    live: DashMap<Fingerprint, Weak<Session>>,
    last_exit: DashMap<Fingerprint, ExitRecord>,
    exit_order: AtomicU64,
    exit_capacity: usize,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::with_exit_capacity(EXIT_SNAPSHOT_CAPACITY)
    }
}

impl SessionTable {
    pub fn with_exit_capacity(exit_capacity: usize) -> Self {
        Self {
            live: DashMap::new(),
            last_exit: DashMap::new(),
            exit_order: AtomicU64::new(0),
            exit_capacity,
        }
    }

    /// The live (non-terminal) session for `fp`, if any.
    fn live_session(&self, fp: &Fingerprint) -> Option<Arc<Session>> {
        self.live
            .get(fp)
            .and_then(|weak| weak.upgrade())
            .filter(|session| !session.is_terminal())
    }

    /// Remove the entry for `session`, but only if it still points at this
    /// very session (a newer one may have replaced it).
    pub(crate) fn release(&self, session: &Arc<Session>) -> bool {
        self.live
            .remove_if(session.fingerprint(), |_, weak| {
                std::ptr::eq(weak.as_ptr(), Arc::as_ptr(session))
            })
            .is_some()
    }

    pub(crate) fn record_exit(&self, session: &Session) {
        if self.exit_capacity == 0 {
            return;
        }
        let mut snapshot = session.snapshot();
        snapshot.ended_at = Some(Utc::now());
        let order = self.exit_order.fetch_add(1, Ordering::Relaxed);
        self.last_exit
            .insert(session.fingerprint().clone(), ExitRecord { order, snapshot });

        while self.last_exit.len() > self.exit_capacity {
            let oldest = self
                .last_exit
                .iter()
                .min_by_key(|entry| entry.value().order)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(fp) => {
                    self.last_exit.remove(&fp);
                }
                None => break,
            }
        }
    }

    pub(crate) fn last_exit(&self, fp: &Fingerprint) -> Option<SessionSnapshot> {
        self.last_exit.get(fp).map(|entry| entry.value().snapshot.clone())
    }

    #[cfg(test)]
    pub(crate) fn exit_count(&self) -> usize {
        self.last_exit.len()
    }

    /// Delete the store for `fp` unless a live session has taken it over.
    ///
    /// Runs under the entry lock so it cannot interleave with a new session
    /// preparing the same directory.
    pub(crate) fn reclaim_store(&self, fp: &Fingerprint, store: &SegmentStore) {
        match self.live.entry(fp.clone()) {
            Entry::Occupied(entry) => {
                let in_use = entry
                    .get()
                    .upgrade()
                    .is_some_and(|session| !session.is_terminal());
                if in_use {
                    tracing::trace!(fingerprint = %fp, "Store in use by a newer session");
                } else {
                    entry.remove();
                    store.remove(fp);
                }
            }
            Entry::Vacant(_) => store.remove(fp),
        }
    }
}

/// Registry of live sessions, one per fingerprint.
#[derive(Clone)]
pub struct SessionRegistry {
    table: Arc<SessionTable>,
    controller: LiveController,
    upstream: UpstreamConfig,
    closing: Arc<AtomicBool>,
}

impl SessionRegistry {
    pub fn new(controller: LiveController, upstream: UpstreamConfig) -> Self {
        Self {
            table: Arc::new(SessionTable::default()),
            controller,
            upstream,
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &SegmentStore {
        self.controller.store()
    }

    /// Return the live session for `fp`, starting one if there is none.
    ///
    /// A session whose transcoder could not be spawned is returned in
    /// `Failed(SpawnFailure)` and is not registered, so the next call tries
    /// again.
    ///
    /// # Errors
    ///
    /// - [`Error::Unavailable`] once [`shutdown`](Self::shutdown) has begun.
    /// - [`Error::Io`] if the store directory cannot be prepared.
    pub fn get_or_start(&self, fp: &Fingerprint) -> Result<Arc<Session>> {
        if self.closing.load(Ordering::Acquire) {
            return Err(Error::Unavailable("server is shutting down".into()));
        }

        match self.table.live.entry(fp.clone()) {
            Entry::Occupied(mut entry) => {
                if let Some(session) = entry.get().upgrade().filter(|s| !s.is_terminal()) {
                    session.touch();
                    return Ok(session);
                }
                // Lazily drop the dead entry and start over.
                let session = match self.start(fp) {
                    Ok(session) => session,
                    Err(e) => {
                        entry.remove();
                        return Err(e);
                    }
                };
                if session.is_terminal() {
                    entry.remove();
                } else {
                    entry.insert(Arc::downgrade(&session));
                }
                Ok(session)
            }
            Entry::Vacant(entry) => {
                let session = self.start(fp)?;
                if !session.is_terminal() {
                    entry.insert(Arc::downgrade(&session));
                }
                Ok(session)
            }
        }
    }

    fn start(&self, fp: &Fingerprint) -> Result<Arc<Session>> {
        let source_url = self.upstream.source_url(fp);
        self.controller.start(fp, &source_url, &self.table)
    }

    /// The live session for `fp`, if any.
    pub fn get(&self, fp: &Fingerprint) -> Option<Arc<Session>> {
        self.table.live_session(fp)
    }

    /// Mark `fp` as read by a client, keeping its session from going idle.
    pub fn touch(&self, fp: &Fingerprint) {
        if let Some(session) = self.get(fp) {
            session.touch();
        }
    }

    /// Retire the session for `fp`. Redundant calls are fine.
    ///
    /// A live session is asked to stop and keeps its entry until its
    /// supervisor releases it, so no second transcoder can start against the
    /// same directory in the meantime and shutdown still sees it. A dead or
    /// terminal entry is dropped at once. Returns `true` if this call changed
    /// anything. Unlike [`stop`](Self::stop) this does not wait.
    pub fn remove(&self, fp: &Fingerprint) -> bool {
        match self.table.live.entry(fp.clone()) {
            Entry::Occupied(entry) => {
                match entry.get().upgrade().filter(|s| !s.is_terminal()) {
                    Some(session) if session.stop_requested() => false,
                    Some(session) => {
                        tracing::info!(
                            fingerprint = %fp,
                            session_id = %session.id(),
                            "Removing session"
                        );
                        session.request_stop();
                        true
                    }
                    None => {
                        entry.remove();
                        true
                    }
                }
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Snapshots of all live sessions.
    pub fn list(&self) -> Vec<SessionSnapshot> {
        let mut sessions: Vec<SessionSnapshot> = self
            .live_sessions()
            .iter()
            .map(|session| session.snapshot())
            .collect();
        sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        sessions
    }

    fn live_sessions(&self) -> Vec<Arc<Session>> {
        self.table
            .live
            .iter()
            .filter_map(|entry| entry.value().upgrade())
            .filter(|session| !session.is_terminal())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.live_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the most recent session for `fp` that has ended.
    pub fn last_exit(&self, fp: &Fingerprint) -> Option<SessionSnapshot> {
        self.table.last_exit(fp)
    }

    /// Live session snapshot, or the last exit if nothing is running.
    pub fn snapshot(&self, fp: &Fingerprint) -> Option<SessionSnapshot> {
        self.get(fp)
            .map(|session| session.snapshot())
            .or_else(|| self.last_exit(fp))
    }

    /// Stop the live session for `fp` and wait (bounded) for it to end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no session is running for `fp`.
    pub async fn stop(&self, fp: &Fingerprint) -> Result<SessionSnapshot> {
        let session = self
            .get(fp)
            .ok_or_else(|| Error::not_found("session", fp))?;

        tracing::info!(fingerprint = %fp, session_id = %session.id(), "Stopping session");
        session.request_stop();
        self.await_end(&session).await;

        Ok(self
            .last_exit(fp)
            .filter(|snapshot| snapshot.id == session.id().to_string())
            .unwrap_or_else(|| session.snapshot()))
    }

    async fn await_end(&self, session: &Session) {
        let limit = self.controller.settings().stop_timeout + STOP_SLACK;
        if tokio::time::timeout(limit, session.wait_terminal()).await.is_err() {
            tracing::warn!(
                fingerprint = %session.fingerprint(),
                "Session did not end within {limit:?}"
            );
        }
    }

    /// Ask every session idle for at least `idle_timeout` to stop. Returns
    /// the fingerprints that were signalled; their supervisors finish the
    /// teardown.
    pub fn reap_idle(&self, idle_timeout: Duration) -> Vec<Fingerprint> {
        let mut reaped = Vec::new();
        for session in self.live_sessions() {
            let idle = session.idle_for();
            if idle >= idle_timeout && !session.stop_requested() {
                tracing::info!(
                    fingerprint = %session.fingerprint(),
                    idle_secs = idle.as_secs(),
                    "Stopping idle session"
                );
                session.request_stop();
                reaped.push(session.fingerprint().clone());
            }
        }
        reaped
    }

    /// Refuse new sessions, stop every live one, and reclaim their stores.
    pub async fn shutdown(&self) {
        self.closing.store(true, Ordering::Release);

        let sessions = self.live_sessions();
        if sessions.is_empty() {
            return;
        }
        tracing::info!(count = sessions.len(), "Stopping live sessions");

        for session in &sessions {
            session.request_stop();
        }
        for session in &sessions {
            self.await_end(session).await;
            self.store().remove(session.fingerprint());
        }
    }
}
