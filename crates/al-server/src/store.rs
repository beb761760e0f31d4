//! On-disk segment store.
//!
//! One directory per fingerprint under a fixed root, holding `index.m3u8`
//! and a rolling set of `seg_NNNNN.ts` files. The transcoder writes into it
//! through the filesystem; route handlers read from it. Nothing is cached:
//! every read goes to disk so readers always see the latest window.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use uuid::Uuid;

use al_core::{Error, Fingerprint, Result};
use al_media::{parse_media_playlist, parse_segment_file_name, SegmentSeq, MANIFEST_FILE_NAME};

/// Suffix for in-progress writes; never matches a segment or manifest name.
const TEMP_SUFFIX: &str = ".tmp";

/// Prefix of directories waiting for deletion; never a valid fingerprint.
const TRASH_PREFIX: &str = ".trash-";

/// Per-fingerprint manifest and segment storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct SegmentStore {
    root: PathBuf,
}

impl SegmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding everything for `fp`.
    pub fn dir(&self, fp: &Fingerprint) -> PathBuf {
        self.root.join(fp.as_str())
    }

    pub fn manifest_path(&self, fp: &Fingerprint) -> PathBuf {
        self.dir(fp).join(MANIFEST_FILE_NAME)
    }

    pub fn segment_path(&self, fp: &Fingerprint, seq: SegmentSeq) -> PathBuf {
        self.dir(fp).join(seq.file_name())
    }

    /// Wipe whatever a previous session left behind and create an empty
    /// directory for a new one.
    ///
    /// The old directory is renamed aside and deleted in the background, so
    /// the caller only pays for a rename and a mkdir.
    pub fn prepare(&self, fp: &Fingerprint) -> Result<PathBuf> {
        let dir = self.dir(fp);
        if let Some(old) = self.detach(fp)? {
            tracing::debug!(fingerprint = %fp, "Cleared previous store contents");
            discard(old);
        }
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Move the directory for `fp` out of the way. Returns its new location,
    /// or `None` if there was nothing to move.
    fn detach(&self, fp: &Fingerprint) -> Result<Option<PathBuf>> {
        let trash = self
            .root
            .join(format!("{TRASH_PREFIX}{fp}-{}", Uuid::new_v4().simple()));
        match std::fs::rename(self.dir(fp), &trash) {
            Ok(()) => Ok(Some(trash)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically replace the manifest.
    pub fn write_manifest(&self, fp: &Fingerprint, content: &[u8]) -> Result<()> {
        write_atomic(&self.dir(fp), MANIFEST_FILE_NAME, content)
    }

    /// Atomically write segment `seq`.
    pub fn write_segment(&self, fp: &Fingerprint, seq: SegmentSeq, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.dir(fp), &seq.file_name(), bytes)
    }

    /// Sorted sequence numbers of the segment files currently on disk.
    ///
    /// A missing directory is an empty store.
    pub fn segment_sequences(&self, fp: &Fingerprint) -> Result<Vec<u64>> {
        let entries = match std::fs::read_dir(self.dir(fp)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut seqs: Vec<u64> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_segment_file_name(&entry.file_name().to_string_lossy()))
            .collect();
        seqs.sort_unstable();
        Ok(seqs)
    }

    /// Sequence numbers the current manifest references. An absent or
    /// unparsable manifest references nothing.
    fn referenced_sequences(&self, fp: &Fingerprint) -> Vec<u64> {
        std::fs::read_to_string(self.manifest_path(fp))
            .ok()
            .and_then(|text| parse_media_playlist(&text).ok())
            .map(|playlist| playlist.segment_sequences())
            .unwrap_or_default()
    }

    /// Enforce the retention window: delete every segment older than the
    /// newest `keep`, except those the current manifest still lists.
    ///
    /// Deletion is best-effort. Files that vanish underneath (the transcoder
    /// evicts too) or cannot be removed are logged and skipped. Returns the
    /// sequences actually deleted.
    pub fn evict_oldest(&self, fp: &Fingerprint, keep: usize) -> Result<Vec<u64>> {
        let on_disk = self.segment_sequences(fp)?;
        let Some(&newest) = on_disk.last() else {
            return Ok(Vec::new());
        };

        let cutoff = newest.saturating_add(1).saturating_sub(keep as u64);
        let referenced = self.referenced_sequences(fp);

        let mut evicted = Vec::new();
        for seq in on_disk.into_iter().filter(|s| *s < cutoff) {
            if referenced.contains(&seq) {
                continue;
            }
            let path = self.dir(fp).join(al_media::segment_file_name(seq));
            match std::fs::remove_file(&path) {
                Ok(()) => evicted.push(seq),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(fingerprint = %fp, seq, "Failed to evict segment: {e}");
                }
            }
        }

        if !evicted.is_empty() {
            tracing::trace!(fingerprint = %fp, count = evicted.len(), "Evicted old segments");
        }
        Ok(evicted)
    }

    /// Current manifest bytes, or `None` while the transcoder has not
    /// produced one yet (including when the directory does not exist).
    pub async fn read_manifest(&self, fp: &Fingerprint) -> Result<Option<Bytes>> {
        match tokio::fs::read(self.manifest_path(fp)).await {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Bytes of segment `seq`, or [`Error::NotFound`] when it was evicted or
    /// never written.
    pub async fn read_segment(&self, fp: &Fingerprint, seq: SegmentSeq) -> Result<Bytes> {
        match tokio::fs::read(self.segment_path(fp, seq)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found("segment", format!("{fp}/{}", seq.file_name())))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the directory for `fp`. Best-effort.
    ///
    /// The path is free as soon as this returns; the contents are deleted on
    /// the blocking pool when called inside a runtime.
    pub fn remove(&self, fp: &Fingerprint) {
        match self.detach(fp) {
            Ok(Some(old)) => {
                tracing::debug!(fingerprint = %fp, "Reclaimed segment store");
                discard(old);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(fingerprint = %fp, "Failed to reclaim segment store: {e}"),
        }
    }

    /// Delete directories an earlier process detached but never finished
    /// deleting. Returns how many were removed.
    pub fn purge_detached(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return 0;
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(TRASH_PREFIX))
            .filter(|entry| match std::fs::remove_dir_all(entry.path()) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Failed to delete {}: {e}", entry.path().display());
                    false
                }
            })
            .count()
    }
}

/// Delete a detached store directory.
fn discard(path: PathBuf) {
    let remove = move || match std::fs::remove_dir_all(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to delete {}: {e}", path.display()),
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(remove);
        }
        Err(_) => remove(),
    }
}

/// Write `bytes` to `dir/name` via a temporary file and a rename, so readers
/// see either the old or the new content and never a partial write.
fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let tmp = dir.join(format!("{name}{TEMP_SUFFIX}"));
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, dir.join(name)).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        Error::from(e)
    })
}
