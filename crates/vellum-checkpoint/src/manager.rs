use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use vellum_delta::{compare_lines, DiffResult};
use vellum_store::{ObjectStore, StoreError};
use vellum_types::{CheckpointId, CheckpointKind, Clock, ContentHash, FileKey, Trigger};

use crate::config::CheckpointConfig;
use crate::error::{CheckpointError, CheckpointResult};
use crate::history::{History, HistoryLine, HistoryStore};
use crate::locks::KeyedLocks;
use crate::record::{Checkpoint, CheckpointStats};
use crate::retention::plan_prune;

/// A checkpoint that could not be listed or reconstructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CorruptCheckpoint {
    /// Id of the record, when it could be parsed at all.
    pub id: Option<CheckpointId>,
    /// 1-based line in the history file, for records that failed to parse.
    pub line: Option<usize>,
    pub reason: String,
}

/// Result of [`CheckpointManager::list_checkpoints`].
#[derive(Clone, Debug, Default)]
pub struct CheckpointListing {
    /// Usable checkpoints, oldest first.
    pub checkpoints: Vec<Checkpoint>,
    /// Records excluded from `checkpoints`, with the reason.
    pub warnings: Vec<CorruptCheckpoint>,
}

/// Right-hand side of a comparison.
#[derive(Clone, Debug)]
pub enum CompareTarget {
    /// Arbitrary content, typically the editor buffer.
    Content(String),
    Checkpoint(CheckpointId),
}

/// Aggregate figures over every history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub documents: usize,
    pub checkpoints: usize,
    pub bookmarks: usize,
    pub delta_checkpoints: usize,
    pub corrupt_records: usize,
}

/// Creates, reads, and prunes document checkpoints.
///
/// All operations on one document are serialized through a per-document
/// lock. Blob writes always complete before the record that references
/// them is appended, so a crash leaves at worst an unreferenced blob.
pub struct CheckpointManager {
    store: Arc<dyn ObjectStore>,
    history: HistoryStore,
    config: CheckpointConfig,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl CheckpointManager {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        history: HistoryStore,
        config: CheckpointConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            history,
            config,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    pub fn history_store(&self) -> &HistoryStore {
        &self.history
    }

    /// Block until no operation on `file_key` is in flight.
    pub fn wait_idle(&self, file_key: &FileKey) {
        self.locks.with_key(file_key, || ());
    }

    /// Record `content` as a new checkpoint of `file_key`.
    ///
    /// An auto checkpoint of content identical to the latest checkpoint is a
    /// no-op and returns that latest checkpoint.
    #[instrument(skip(self, file_key, content), fields(file_key = %file_key, len = content.len()))]
    pub fn create_checkpoint(
        &self,
        file_key: &FileKey,
        content: &str,
        trigger: Trigger,
    ) -> CheckpointResult<Checkpoint> {
        self.locks.with_key(file_key, || {
            let checkpoint = self.create_locked(file_key, content, trigger, None, None)?;
            if checkpoint.kind == CheckpointKind::Auto && self.config.retention.prune_on_create {
                self.prune_locked(file_key)?;
            }
            Ok(checkpoint)
        })
    }

    /// Record `content` as a named checkpoint exempt from retention.
    #[instrument(skip(self, file_key, content, label, description), fields(file_key = %file_key))]
    pub fn create_bookmark(
        &self,
        file_key: &FileKey,
        content: &str,
        label: impl Into<String>,
        description: Option<String>,
    ) -> CheckpointResult<Checkpoint> {
        let label = label.into();
        self.locks.with_key(file_key, || {
            self.create_locked(file_key, content, Trigger::Bookmark, Some(label), description)
        })
    }

    fn create_locked(
        &self,
        file_key: &FileKey,
        content: &str,
        trigger: Trigger,
        label: Option<String>,
        description: Option<String>,
    ) -> CheckpointResult<Checkpoint> {
        let history = self.history.load(file_key)?;
        let kind = trigger.kind();
        let content_hash = ContentHash::of(content.as_bytes());
        let after_size = content.len() as u64;

        let (base_ref, delta, stats) = match history.latest() {
            None => {
                let hash = self.store.write(content.as_bytes())?;
                let stats = CheckpointStats {
                    before_size: 0,
                    after_size,
                    change_size: after_size,
                };
                (hash, None, stats)
            }
            Some(latest) if latest.content_hash == content_hash => {
                if kind == CheckpointKind::Auto {
                    debug!(id = %latest.id.short_id(), "content unchanged, reusing latest checkpoint");
                    return Ok(latest.clone());
                }
                let stats = CheckpointStats {
                    before_size: after_size,
                    after_size,
                    change_size: 0,
                };
                (latest.base_ref, latest.delta.clone(), stats)
            }
            Some(latest) => self.encode_against(latest, content)?,
        };

        let checkpoint = Checkpoint {
            id: CheckpointId::new(),
            file_key: file_key.clone(),
            created_at: self.clock.now(),
            trigger,
            kind,
            base_ref,
            delta,
            content_hash,
            label,
            description,
            stats,
        };
        self.history.append(&history, &checkpoint)?;
        debug!(
            id = %checkpoint.id.short_id(),
            kind = %checkpoint.kind,
            delta = checkpoint.is_delta(),
            change = checkpoint.stats.change_size,
            "checkpoint created"
        );
        Ok(checkpoint)
    }

    /// Diff `content` against the full blob `latest` is anchored on and pick
    /// delta or full storage.
    fn encode_against(
        &self,
        latest: &Checkpoint,
        content: &str,
    ) -> CheckpointResult<(ContentHash, Option<vellum_delta::Delta>, CheckpointStats)> {
        let after_size = content.len() as u64;
        let anchor = match self.read_text(latest, &latest.base_ref) {
            Ok(anchor) => anchor,
            Err(e) => {
                warn!(id = %latest.id.short_id(), error = %e, "latest checkpoint unreadable, storing full content");
                let hash = self.store.write(content.as_bytes())?;
                let stats = CheckpointStats {
                    before_size: 0,
                    after_size,
                    change_size: after_size,
                };
                return Ok((hash, None, stats));
            }
        };

        // One budget covers both diffs below.
        let deadline = Instant::now() + vellum_delta::DIFF_TIME_BUDGET;
        let delta = vellum_delta::diff_until(&anchor, content, deadline);
        let (before_size, change_size) = match &latest.delta {
            None => (anchor.len() as u64, delta.change_size()),
            Some(prev) => match vellum_delta::apply(&anchor, prev) {
                Ok(previous) => (
                    previous.len() as u64,
                    vellum_delta::diff_until(&previous, content, deadline).change_size(),
                ),
                Err(e) => {
                    warn!(id = %latest.id.short_id(), error = %e, "latest delta does not apply");
                    (0, after_size)
                }
            },
        };
        let stats = CheckpointStats {
            before_size,
            after_size,
            change_size,
        };

        let encoded = vellum_delta::encoded_len(&delta);
        if self.config.prefers_delta(encoded, content.len()) {
            Ok((latest.base_ref, Some(delta), stats))
        } else {
            debug!(encoded, len = content.len(), "delta too large, storing full content");
            let hash = self.store.write(content.as_bytes())?;
            Ok((hash, None, stats))
        }
    }

    /// Checkpoints of `file_key`, oldest first.
    ///
    /// Every record is reconstructed and hash-checked. Records that fail to
    /// parse, whose base blob is gone, or whose content no longer verifies
    /// are returned as warnings instead of failing the listing.
    pub fn list_checkpoints(&self, file_key: &FileKey) -> CheckpointResult<CheckpointListing> {
        self.locks.with_key(file_key, || {
            let history = self.history.load(file_key)?;
            let mut listing = CheckpointListing::default();
            let mut anchors: HashMap<ContentHash, String> = HashMap::new();
            for line in history.lines() {
                match line {
                    HistoryLine::Valid(cp) => {
                        let checked = match anchors.get(&cp.base_ref) {
                            Some(base) => self.replay(cp, base.clone()),
                            None => self.read_text(cp, &cp.base_ref).and_then(|base| {
                                anchors.insert(cp.base_ref, base.clone());
                                self.replay(cp, base)
                            }),
                        };
                        match checked {
                            Ok(_) => listing.checkpoints.push(cp.clone()),
                            Err(e @ (CheckpointError::BaseMissing { .. } | CheckpointError::Corrupt { .. })) => {
                                warn!(id = %cp.id.short_id(), error = %e, "skipping unusable checkpoint");
                                listing.warnings.push(CorruptCheckpoint {
                                    id: Some(cp.id.clone()),
                                    line: None,
                                    reason: e.to_string(),
                                });
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    HistoryLine::Corrupt { line, reason, .. } => {
                        listing.warnings.push(CorruptCheckpoint {
                            id: None,
                            line: Some(*line),
                            reason: reason.clone(),
                        });
                    }
                }
            }
            listing.checkpoints.sort_by_key(|cp| cp.created_at);
            Ok(listing)
        })
    }

    /// Reconstruct the exact content recorded by checkpoint `id`.
    #[instrument(skip(self, file_key, id), fields(file_key = %file_key, id = %id.short_id()))]
    pub fn restore_content(&self, file_key: &FileKey, id: &CheckpointId) -> CheckpointResult<String> {
        self.locks.with_key(file_key, || {
            let history = self.history.load(file_key)?;
            let checkpoint = find(&history, id)?;
            self.reconstruct(checkpoint)
        })
    }

    /// Line-level comparison of checkpoint `a` against `b`.
    pub fn compare(
        &self,
        file_key: &FileKey,
        a: &CheckpointId,
        b: &CompareTarget,
    ) -> CheckpointResult<DiffResult> {
        self.locks.with_key(file_key, || {
            let history = self.history.load(file_key)?;
            let old = self.reconstruct(find(&history, a)?)?;
            let new = match b {
                CompareTarget::Content(content) => content.clone(),
                CompareTarget::Checkpoint(id) => self.reconstruct(find(&history, id)?)?,
            };
            Ok(compare_lines(&old, &new))
        })
    }

    /// Replace the label and description of checkpoint `id`.
    pub fn label_checkpoint(
        &self,
        file_key: &FileKey,
        id: &CheckpointId,
        label: Option<String>,
        description: Option<String>,
    ) -> CheckpointResult<Checkpoint> {
        self.locks.with_key(file_key, || {
            let mut history = self.history.load(file_key)?;
            let checkpoint = history
                .find_mut(id)
                .ok_or_else(|| not_found(file_key, id))?;
            checkpoint.label = label;
            checkpoint.description = description;
            let updated = checkpoint.clone();
            self.history.rewrite(&history)?;
            Ok(updated)
        })
    }

    /// Remove checkpoint `id` from the history. Its blob is left for GC.
    pub fn delete_checkpoint(&self, file_key: &FileKey, id: &CheckpointId) -> CheckpointResult<Checkpoint> {
        self.locks.with_key(file_key, || {
            let mut history = self.history.load(file_key)?;
            let mut removed = history.remove(std::slice::from_ref(id));
            let checkpoint = removed.pop().ok_or_else(|| not_found(file_key, id))?;
            self.history.rewrite(&history)?;
            info!(file_key = %file_key, id = %id.short_id(), "checkpoint deleted");
            Ok(checkpoint)
        })
    }

    /// Apply the retention policy to one document. Returns how many
    /// checkpoints were removed.
    pub fn prune(&self, file_key: &FileKey) -> CheckpointResult<usize> {
        self.locks.with_key(file_key, || self.prune_locked(file_key))
    }

    /// Apply the retention policy to every document.
    pub fn prune_all(&self) -> CheckpointResult<usize> {
        let mut total = 0;
        for history in self.history.load_all()? {
            if history.checkpoints().next().is_some() {
                total += self.prune(history.file_key())?;
            }
        }
        Ok(total)
    }

    fn prune_locked(&self, file_key: &FileKey) -> CheckpointResult<usize> {
        let mut history = self.history.load(file_key)?;
        let checkpoints: Vec<Checkpoint> = history.checkpoints().cloned().collect();
        let doomed = plan_prune(&checkpoints, &self.config.retention);
        if doomed.is_empty() {
            return Ok(0);
        }
        let removed = history.remove(&doomed);
        self.history.rewrite(&history)?;
        debug!(file_key = %file_key, pruned = removed.len(), "retention applied");
        Ok(removed.len())
    }

    /// Every blob referenced by any history.
    ///
    /// The caller must keep checkpoint creation paused between computing
    /// this set and collecting garbage with it.
    pub fn reachable_set(&self) -> CheckpointResult<HashSet<ContentHash>> {
        let mut reachable = HashSet::new();
        for history in self.history.load_all()? {
            reachable.extend(history.referenced_blobs());
        }
        Ok(reachable)
    }

    /// Reconstruct every checkpoint of `file_key`, reporting those that fail.
    pub fn verify_history(&self, file_key: &FileKey) -> CheckpointResult<Vec<CorruptCheckpoint>> {
        self.locks.with_key(file_key, || {
            let history = self.history.load(file_key)?;
            let mut problems = Vec::new();
            for line in history.lines() {
                match line {
                    HistoryLine::Valid(cp) => {
                        if let Err(e) = self.reconstruct(cp) {
                            problems.push(CorruptCheckpoint {
                                id: Some(cp.id.clone()),
                                line: None,
                                reason: e.to_string(),
                            });
                        }
                    }
                    HistoryLine::Corrupt { line, reason, .. } => problems.push(CorruptCheckpoint {
                        id: None,
                        line: Some(*line),
                        reason: reason.clone(),
                    }),
                }
            }
            Ok(problems)
        })
    }

    /// Counts across all histories.
    pub fn stats(&self) -> CheckpointResult<HistoryStats> {
        let mut stats = HistoryStats::default();
        for history in self.history.load_all()? {
            stats.documents += 1;
            stats.corrupt_records += history.corrupt_count();
            for cp in history.checkpoints() {
                stats.checkpoints += 1;
                if cp.is_bookmark() {
                    stats.bookmarks += 1;
                }
                if cp.is_delta() {
                    stats.delta_checkpoints += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Every document with a history, in no particular order.
    pub fn documents(&self) -> CheckpointResult<Vec<FileKey>> {
        Ok(self
            .history
            .load_all()?
            .into_iter()
            .filter(|h| h.checkpoints().next().is_some())
            .map(|h| h.file_key().clone())
            .collect())
    }

    fn reconstruct(&self, checkpoint: &Checkpoint) -> CheckpointResult<String> {
        let base = self.read_text(checkpoint, &checkpoint.base_ref)?;
        self.replay(checkpoint, base)
    }

    /// Apply `checkpoint`'s delta (if any) to its anchor text and verify the
    /// result against the recorded content hash.
    fn replay(&self, checkpoint: &Checkpoint, base: String) -> CheckpointResult<String> {
        let content = match &checkpoint.delta {
            None => base,
            Some(delta) => vellum_delta::apply(&base, delta).map_err(|e| corrupt(checkpoint, e))?,
        };
        let computed = ContentHash::of(content.as_bytes());
        if computed != checkpoint.content_hash {
            return Err(corrupt(
                checkpoint,
                format!(
                    "reconstructed content hashes to {} not {}",
                    computed.short_hex(),
                    checkpoint.content_hash.short_hex()
                ),
            ));
        }
        Ok(content)
    }

    fn read_text(&self, checkpoint: &Checkpoint, hash: &ContentHash) -> CheckpointResult<String> {
        let bytes = match self.store.read(hash) {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound(_)) => {
                return Err(CheckpointError::BaseMissing {
                    id: checkpoint.id.clone(),
                    base_ref: *hash,
                })
            }
            Err(e @ StoreError::HashMismatch { .. }) => return Err(corrupt(checkpoint, e)),
            Err(e) => return Err(e.into()),
        };
        String::from_utf8(bytes).map_err(|e| corrupt(checkpoint, e))
    }
}

fn find<'a>(history: &'a History, id: &CheckpointId) -> CheckpointResult<&'a Checkpoint> {
    history
        .find(id)
        .ok_or_else(|| not_found(history.file_key(), id))
}

fn not_found(file_key: &FileKey, id: &CheckpointId) -> CheckpointError {
    CheckpointError::NotFound {
        file_key: file_key.clone(),
        id: id.clone(),
    }
}

fn corrupt(checkpoint: &Checkpoint, reason: impl std::fmt::Display) -> CheckpointError {
    warn!(id = %checkpoint.id.short_id(), %reason, "corrupt checkpoint");
    CheckpointError::Corrupt {
        id: checkpoint.id.clone(),
        reason: reason.to_string(),
    }
}
