use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use vellum_checkpoint::{
    Checkpoint, CheckpointListing, CheckpointManager, CompareTarget, CorruptCheckpoint,
    HistoryStore,
};
use vellum_delta::DiffResult;
use vellum_store::{FsObjectStore, ObjectStore};
use vellum_types::{CheckpointId, Clock, ContentHash, FileKey, SessionId, SystemClock, Trigger};
use vellum_wal::{RecoveryInfo, RecoveryManager};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Storage usage across the whole engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub blob_count: usize,
    pub blob_bytes: u64,
    pub documents: usize,
    pub checkpoints: usize,
    pub bookmarks: usize,
    pub delta_checkpoints: usize,
    pub corrupt_records: usize,
    pub pending_wal: usize,
}

/// Outcome of [`Engine::run_gc`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    /// Checkpoints dropped by retention before collecting.
    pub pruned: usize,
    /// Blobs still referenced afterwards.
    pub reachable: usize,
    /// Blobs deleted.
    pub removed: usize,
}

/// Handle to one workspace's versioning and recovery state.
///
/// Constructed with [`Engine::open`] when a workspace opens and retired with
/// [`Engine::shutdown`] when it closes. Share it behind an `Arc`; every
/// method takes `&self`.
pub struct Engine {
    config: EngineConfig,
    store: Arc<FsObjectStore>,
    checkpoints: CheckpointManager,
    recovery: RecoveryManager,
    /// Checkpoint operations hold it shared; GC and shutdown hold it
    /// exclusively.
    gate: RwLock<()>,
    closed: AtomicBool,
}

impl Engine {
    /// Open the workspace at `config.root`, creating it if needed.
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open with an explicit clock (tests drive retention with a manual one).
    pub fn open_with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> EngineResult<Self> {
        config.validate()?;
        let store = Arc::new(FsObjectStore::open(config.objects_dir())?);
        let history = HistoryStore::open(config.checkpoints_dir())?;
        let checkpoints = CheckpointManager::new(
            store.clone(),
            history,
            config.checkpoint.clone(),
            clock.clone(),
        );
        let recovery = RecoveryManager::open(config.wal_dir(), config.wal.clone(), clock)?;
        info!(root = %config.root.display(), session = %recovery.session(), "engine opened");
        Ok(Self {
            config,
            store,
            checkpoints,
            recovery,
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// Wait for in-flight operations, then refuse new ones.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _exclusive = self.gate.write().expect("engine gate poisoned");
        info!(root = %self.config.root.display(), "engine shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self) -> SessionId {
        self.recovery.session()
    }

    fn enter(&self) -> EngineResult<RwLockReadGuard<'_, ()>> {
        if self.is_closed() {
            return Err(EngineError::Closed);
        }
        let guard = self.gate.read().expect("engine gate poisoned");
        // shutdown may have won the race for the gate
        if self.is_closed() {
            return Err(EngineError::Closed);
        }
        Ok(guard)
    }

    // ---- Checkpoint operations ----

    pub fn create_checkpoint(
        &self,
        file_key: &FileKey,
        content: &str,
        trigger: Trigger,
    ) -> EngineResult<Checkpoint> {
        let _gate = self.enter()?;
        Ok(self.checkpoints.create_checkpoint(file_key, content, trigger)?)
    }

    pub fn create_bookmark(
        &self,
        file_key: &FileKey,
        content: &str,
        label: impl Into<String>,
        description: Option<String>,
    ) -> EngineResult<Checkpoint> {
        let _gate = self.enter()?;
        Ok(self
            .checkpoints
            .create_bookmark(file_key, content, label, description)?)
    }

    pub fn list_checkpoints(&self, file_key: &FileKey) -> EngineResult<CheckpointListing> {
        let _gate = self.enter()?;
        Ok(self.checkpoints.list_checkpoints(file_key)?)
    }

    pub fn restore_content(&self, file_key: &FileKey, id: &CheckpointId) -> EngineResult<String> {
        let _gate = self.enter()?;
        Ok(self.checkpoints.restore_content(file_key, id)?)
    }

    /// Snapshot `current` under [`Trigger::PreRestore`], then return the
    /// content of checkpoint `id`. The snapshot is skipped when `current`
    /// matches the latest checkpoint.
    pub fn restore_with_snapshot(
        &self,
        file_key: &FileKey,
        id: &CheckpointId,
        current: &str,
    ) -> EngineResult<(Checkpoint, String)> {
        let _gate = self.enter()?;
        let content = self.checkpoints.restore_content(file_key, id)?;
        let snapshot = self
            .checkpoints
            .create_checkpoint(file_key, current, Trigger::PreRestore)?;
        Ok((snapshot, content))
    }

    pub fn compare(
        &self,
        file_key: &FileKey,
        a: &CheckpointId,
        b: &CompareTarget,
    ) -> EngineResult<DiffResult> {
        let _gate = self.enter()?;
        Ok(self.checkpoints.compare(file_key, a, b)?)
    }

    pub fn label_checkpoint(
        &self,
        file_key: &FileKey,
        id: &CheckpointId,
        label: Option<String>,
        description: Option<String>,
    ) -> EngineResult<Checkpoint> {
        let _gate = self.enter()?;
        Ok(self
            .checkpoints
            .label_checkpoint(file_key, id, label, description)?)
    }

    pub fn delete_checkpoint(&self, file_key: &FileKey, id: &CheckpointId) -> EngineResult<Checkpoint> {
        let _gate = self.enter()?;
        Ok(self.checkpoints.delete_checkpoint(file_key, id)?)
    }

    pub fn verify_history(&self, file_key: &FileKey) -> EngineResult<Vec<CorruptCheckpoint>> {
        let _gate = self.enter()?;
        Ok(self.checkpoints.verify_history(file_key)?)
    }

    pub fn documents(&self) -> EngineResult<Vec<FileKey>> {
        let _gate = self.enter()?;
        Ok(self.checkpoints.documents()?)
    }

    pub fn get_storage_stats(&self) -> EngineResult<StorageStats> {
        let _gate = self.enter()?;
        let blobs = self.store.stats()?;
        let history = self.checkpoints.stats()?;
        Ok(StorageStats {
            blob_count: blobs.blob_count,
            blob_bytes: blobs.total_bytes,
            documents: history.documents,
            checkpoints: history.checkpoints,
            bookmarks: history.bookmarks,
            delta_checkpoints: history.delta_checkpoints,
            corrupt_records: history.corrupt_records,
            pending_wal: self.recovery.pending()?,
        })
    }

    // ---- Shared object store ----

    /// Store content owned by another subsystem (embedded images, for
    /// instance) in the shared object store. It survives GC only while the
    /// caller passes its hash to [`Engine::run_gc`].
    pub fn write_blob(&self, data: &[u8]) -> EngineResult<ContentHash> {
        let _gate = self.enter()?;
        Ok(self.store.write(data)?)
    }

    pub fn read_blob(&self, hash: &ContentHash) -> EngineResult<Vec<u8>> {
        let _gate = self.enter()?;
        Ok(self.store.read(hash)?)
    }

    pub fn blob_exists(&self, hash: &ContentHash) -> EngineResult<bool> {
        let _gate = self.enter()?;
        Ok(self.store.exists(hash)?)
    }

    /// Apply retention everywhere, then delete every blob no checkpoint
    /// references.
    ///
    /// `extra_reachable` carries content other subsystems keep in the same
    /// store (embedded images, for instance). Checkpoint creation is paused
    /// for the duration.
    #[instrument(skip(self, extra_reachable), fields(extra = extra_reachable.len()))]
    pub fn run_gc(&self, extra_reachable: &HashSet<ContentHash>) -> EngineResult<GcReport> {
        if self.is_closed() {
            return Err(EngineError::Closed);
        }
        let _exclusive = self.gate.write().expect("engine gate poisoned");
        let pruned = self.checkpoints.prune_all()?;
        let mut reachable = self.checkpoints.reachable_set()?;
        reachable.extend(extra_reachable.iter().copied());
        let removed = self.store.gc(&reachable)?;
        let report = GcReport {
            pruned,
            reachable: reachable.len(),
            removed,
        };
        info!(pruned, removed, reachable = report.reachable, "gc complete");
        Ok(report)
    }

    // ---- Recovery operations ----
    //
    // Log writes are best-effort: a failure degrades crash recovery for the
    // current edit window but must never interrupt editing, so it is logged
    // and swallowed.

    pub fn start_wal(&self, file_key: &FileKey, content: &str) {
        if let Err(e) = self.recovery.start(file_key, content) {
            warn!(file_key = %file_key, error = %e, "failed to start WAL");
        }
    }

    pub fn update_wal(&self, file_key: &FileKey, content: &str) {
        if let Err(e) = self.recovery.update(file_key, content) {
            warn!(file_key = %file_key, error = %e, "failed to update WAL");
        }
    }

    /// Drop the log for `file_key` once any in-flight checkpoint of it has
    /// settled.
    pub fn stop_wal(&self, file_key: &FileKey) {
        self.checkpoints.wait_idle(file_key);
        match self.recovery.stop(file_key) {
            Ok(removed) => debug!(file_key = %file_key, removed, "WAL stopped"),
            Err(e) => warn!(file_key = %file_key, error = %e, "failed to stop WAL"),
        }
    }

    /// Entries left behind by earlier sessions. Call once at startup,
    /// before documents are opened.
    pub fn scan_for_recovery(&self) -> EngineResult<Vec<RecoveryInfo>> {
        Ok(self.recovery.scan_for_recovery()?)
    }

    pub fn discard_recovery(&self, file_key: &FileKey) -> EngineResult<bool> {
        Ok(self.recovery.discard(file_key)?)
    }
}
