use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use vellum_store::{retry_once, sweep_temp_files, write_atomic};
use vellum_types::{Clock, FileKey, SessionId};

use crate::config::WalConfig;
use crate::error::WalResult;
use crate::frame::{decode_frame, encode_frame, WalEntry};

const EXTENSION: &str = "wal";
const QUARANTINE_EXTENSION: &str = "corrupt";

/// An unsaved document state left behind by an earlier session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecoveryInfo {
    pub file_key: FileKey,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

/// Maintains one log file per open document.
///
/// Layout:
/// ```text
/// {root}/
///   {file-key-digest}.wal       <- latest unsaved content, one frame
///   {file-key-digest}.corrupt   <- unreadable log set aside during a scan
/// ```
///
/// Every write replaces the whole file atomically, so a reader sees either
/// the previous state or the new one. Concurrent updates to one key resolve
/// last-write-wins.
pub struct RecoveryManager {
    root: PathBuf,
    config: WalConfig,
    session: SessionId,
    clock: Arc<dyn Clock>,
}

impl RecoveryManager {
    /// Open (or create) the log directory under a fresh session.
    pub fn open(root: impl AsRef<Path>, config: WalConfig, clock: Arc<dyn Clock>) -> WalResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let swept = sweep_temp_files(&root)?;
        if swept > 0 {
            debug!(swept, "removed stale WAL temp files");
        }
        Ok(Self {
            root,
            config,
            session: SessionId::new(),
            clock,
        })
    }

    /// The session this manager writes entries under.
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, file_key: &FileKey) -> PathBuf {
        self.root.join(format!("{}.{EXTENSION}", file_key.digest()))
    }

    /// Begin logging `file_key`, replacing any existing entry.
    #[instrument(skip(self, file_key, content), fields(file_key = %file_key))]
    pub fn start(&self, file_key: &FileKey, content: &str) -> WalResult<()> {
        self.write_entry(file_key, content)?;
        debug!("WAL started");
        Ok(())
    }

    /// Replace the logged content of `file_key`. Creates the entry if the
    /// document was never started.
    pub fn update(&self, file_key: &FileKey, content: &str) -> WalResult<()> {
        self.write_entry(file_key, content)
    }

    /// Remove the entry after a clean save or close. Returns whether an
    /// entry existed.
    pub fn stop(&self, file_key: &FileKey) -> WalResult<bool> {
        let removed = self.remove(file_key)?;
        debug!(file_key = %file_key, removed, "WAL stopped");
        Ok(removed)
    }

    /// Drop a recovery entry the user chose not to restore.
    pub fn discard(&self, file_key: &FileKey) -> WalResult<bool> {
        let removed = self.remove(file_key)?;
        info!(file_key = %file_key, removed, "recovery entry discarded");
        Ok(removed)
    }

    /// Every entry left by another session, oldest first.
    ///
    /// Entries that fail to decode are renamed aside with a `.corrupt`
    /// extension and skipped, so one damaged file cannot hide the rest.
    pub fn scan_for_recovery(&self) -> WalResult<Vec<RecoveryInfo>> {
        let mut found = Vec::new();
        for path in self.log_files()? {
            let bytes = match retry_once("WAL read", || fs::read(&path)) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let entry = match decode_frame(&bytes) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable WAL entry; quarantining");
                    self.quarantine(&path)?;
                    continue;
                }
            };

            if path != self.path_for(&entry.file_key) {
                warn!(path = %path.display(), file_key = %entry.file_key, "WAL entry stored under wrong name; quarantining");
                self.quarantine(&path)?;
                continue;
            }

            if entry.session_id == self.session {
                continue;
            }

            found.push(RecoveryInfo {
                file_key: entry.file_key,
                content: entry.content,
                updated_at: entry.updated_at,
            });
        }
        found.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.file_key.cmp(&b.file_key))
        });
        info!(entries = found.len(), "recovery scan complete");
        Ok(found)
    }

    /// Number of live log files, from any session.
    pub fn pending(&self) -> WalResult<usize> {
        Ok(self.log_files()?.len())
    }

    fn write_entry(&self, file_key: &FileKey, content: &str) -> WalResult<()> {
        let entry = WalEntry {
            file_key: file_key.clone(),
            content: content.to_string(),
            updated_at: self.clock.now(),
            session_id: self.session,
        };
        let frame = encode_frame(&entry)?;
        let path = self.path_for(file_key);
        let durability = self.config.sync_mode.durability();
        retry_once("WAL write", || write_atomic(&path, &frame, durability))?;
        Ok(())
    }

    fn remove(&self, file_key: &FileKey) -> WalResult<bool> {
        let path = self.path_for(file_key);
        match retry_once("WAL remove", || fs::remove_file(&path)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn quarantine(&self, path: &Path) -> WalResult<()> {
        let target = path.with_extension(QUARANTINE_EXTENSION);
        retry_once("WAL quarantine", || fs::rename(path, &target))?;
        Ok(())
    }

    fn log_files(&self) -> WalResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}
