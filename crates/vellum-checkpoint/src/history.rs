//! Per-document history files.
//!
//! Each document's checkpoints live in `{root}/{file-key-digest}.jsonl`, one
//! JSON record per line, oldest first. New checkpoints are appended; edits
//! that change existing records (labels, deletion, pruning) rewrite the whole
//! file atomically. Lines that fail to parse are kept verbatim so a rewrite
//! never destroys evidence of corruption.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use vellum_store::{retry_once, sweep_temp_files, write_atomic, Durability};
use vellum_types::{CheckpointId, ContentHash, FileKey};

use crate::error::{CheckpointError, CheckpointResult};
use crate::record::Checkpoint;

const EXTENSION: &str = "jsonl";

/// One line of a history file.
#[derive(Clone, Debug, PartialEq)]
pub enum HistoryLine {
    Valid(Checkpoint),
    Corrupt {
        /// 1-based line number in the file as loaded.
        line: usize,
        raw: String,
        reason: String,
    },
}

/// The loaded history of one document.
#[derive(Clone, Debug)]
pub struct History {
    file_key: FileKey,
    lines: Vec<HistoryLine>,
    /// File length when loaded; appends check it to detect a second writer.
    byte_len: u64,
}

impl History {
    pub fn file_key(&self) -> &FileKey {
        &self.file_key
    }

    pub fn lines(&self) -> &[HistoryLine] {
        &self.lines
    }

    /// Valid checkpoints in file order (creation order).
    pub fn checkpoints(&self) -> impl Iterator<Item = &Checkpoint> {
        self.lines.iter().filter_map(|line| match line {
            HistoryLine::Valid(cp) => Some(cp),
            HistoryLine::Corrupt { .. } => None,
        })
    }

    /// The most recently appended valid checkpoint.
    pub fn latest(&self) -> Option<&Checkpoint> {
        self.checkpoints().last()
    }

    pub fn find(&self, id: &CheckpointId) -> Option<&Checkpoint> {
        self.checkpoints().find(|cp| &cp.id == id)
    }

    pub fn find_mut(&mut self, id: &CheckpointId) -> Option<&mut Checkpoint> {
        self.lines.iter_mut().find_map(|line| match line {
            HistoryLine::Valid(cp) if &cp.id == id => Some(cp),
            _ => None,
        })
    }

    /// Remove the listed checkpoints, returning the removed records.
    pub fn remove(&mut self, ids: &[CheckpointId]) -> Vec<Checkpoint> {
        let mut removed = Vec::new();
        self.lines.retain(|line| match line {
            HistoryLine::Valid(cp) if ids.contains(&cp.id) => {
                removed.push(cp.clone());
                false
            }
            _ => true,
        });
        removed
    }

    pub fn corrupt_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| matches!(line, HistoryLine::Corrupt { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Every blob hash this history may reference.
    ///
    /// Corrupt lines are mined for a `base_ref` field when they are still
    /// well-formed JSON, so GC stays conservative around damaged records.
    pub fn referenced_blobs(&self) -> Vec<ContentHash> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                HistoryLine::Valid(cp) => Some(cp.base_ref),
                HistoryLine::Corrupt { raw, .. } => salvage_base_ref(raw),
            })
            .collect()
    }
}

fn salvage_base_ref(raw: &str) -> Option<ContentHash> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value.get("base_ref")?.as_str()?.parse().ok()
}

/// Directory of history files, one per document.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    root: PathBuf,
    durability: Durability,
}

impl HistoryStore {
    /// Open (or create) the history directory, removing temp files left by
    /// interrupted rewrites.
    pub fn open(root: impl AsRef<Path>) -> CheckpointResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let swept = sweep_temp_files(&root)?;
        if swept > 0 {
            debug!(swept, "removed stale history temp files");
        }
        Ok(Self {
            root,
            durability: Durability::Fsync,
        })
    }

    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, file_key: &FileKey) -> PathBuf {
        self.root.join(format!("{}.{EXTENSION}", file_key.digest()))
    }

    /// Load a document's history. A missing file is an empty history.
    pub fn load(&self, file_key: &FileKey) -> CheckpointResult<History> {
        let path = self.path_for(file_key);
        let text = match retry_once("history read", || fs::read(&path)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let byte_len = text.len() as u64;
        let lines = parse_lines(&String::from_utf8_lossy(&text), Some(file_key));
        Ok(History {
            file_key: file_key.clone(),
            lines,
            byte_len,
        })
    }

    /// Append a checkpoint to the history loaded as `history`.
    ///
    /// Fails with [`CheckpointError::ConcurrencyViolation`] if the file
    /// changed since it was loaded.
    pub fn append(&self, history: &History, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        let mut line = serde_json::to_string(checkpoint)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        line.push('\n');

        let path = self.path_for(&history.file_key);
        let mut file = retry_once("history open", || {
            OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(&path)
        })?;

        let len = file.metadata()?.len();
        debug_assert_eq!(
            len, history.byte_len,
            "concurrent writers on history of {}",
            history.file_key
        );
        if len != history.byte_len {
            warn!(
                file_key = %history.file_key,
                expected = history.byte_len,
                actual = len,
                "history changed underneath writer"
            );
            return Err(CheckpointError::ConcurrencyViolation {
                file_key: history.file_key.clone(),
            });
        }

        // A crash mid-append can leave a torn final line; start on a fresh one.
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                line.insert(0, '\n');
            }
        }

        file.write_all(line.as_bytes())?;
        if self.durability == Durability::Fsync {
            file.sync_data()?;
        }
        debug!(file_key = %history.file_key, id = %checkpoint.id.short_id(), "checkpoint appended");
        Ok(())
    }

    /// Atomically replace the history file with `history`'s lines. An empty
    /// history removes the file.
    pub fn rewrite(&self, history: &History) -> CheckpointResult<()> {
        let path = self.path_for(&history.file_key);
        if history.is_empty() {
            return match retry_once("history remove", || fs::remove_file(&path)) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }

        let mut out = String::new();
        for line in &history.lines {
            match line {
                HistoryLine::Valid(cp) => {
                    let json = serde_json::to_string(cp)
                        .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
                    out.push_str(&json);
                }
                HistoryLine::Corrupt { raw, .. } => out.push_str(raw),
            }
            out.push('\n');
        }
        retry_once("history rewrite", || {
            write_atomic(&path, out.as_bytes(), self.durability)
        })?;
        debug!(file_key = %history.file_key, lines = history.lines.len(), "history rewritten");
        Ok(())
    }

    /// Load every history file in the directory.
    ///
    /// Used for reachability and statistics, where the file key is taken
    /// from the records themselves. Files with no valid record still
    /// contribute their salvageable references.
    pub fn load_all(&self) -> CheckpointResult<Vec<History>> {
        let mut histories = Vec::new();
        let mut entries: Vec<_> = fs::read_dir(&self.root)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let text = retry_once("history read", || fs::read(&path))?;
            let lines = parse_lines(&String::from_utf8_lossy(&text), None);
            let file_key = lines.iter().find_map(|line| match line {
                HistoryLine::Valid(cp) => Some(cp.file_key.clone()),
                HistoryLine::Corrupt { .. } => None,
            });
            let file_key = match file_key {
                Some(key) => key,
                None => {
                    warn!(path = %path.display(), "history file has no readable records");
                    let Some(key) = unreadable_key(&path) else {
                        continue;
                    };
                    key
                }
            };
            histories.push(History {
                file_key,
                lines,
                byte_len: text.len() as u64,
            });
        }
        Ok(histories)
    }
}

/// Placeholder key for a history whose records are all unreadable.
fn unreadable_key(path: &Path) -> Option<FileKey> {
    let stem = path.file_stem()?.to_str()?;
    FileKey::new(format!("unreadable/{stem}")).ok()
}

fn parse_lines(text: &str, expected: Option<&FileKey>) -> Vec<HistoryLine> {
    let mut lines = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let line = index + 1;
        let parsed = match serde_json::from_str::<Checkpoint>(raw) {
            Ok(cp) => match expected {
                Some(key) if &cp.file_key != key => Err(format!(
                    "record belongs to {} not {key}",
                    cp.file_key
                )),
                _ => Ok(cp),
            },
            Err(e) => Err(e.to_string()),
        };
        match parsed {
            Ok(cp) => lines.push(HistoryLine::Valid(cp)),
            Err(reason) => {
                warn!(line, %reason, "corrupt history record");
                lines.push(HistoryLine::Corrupt {
                    line,
                    raw: raw.to_string(),
                    reason,
                });
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use vellum_types::{CheckpointKind, Trigger};

    use crate::record::CheckpointStats;

    fn key() -> FileKey {
        FileKey::new("docs/a.md").unwrap()
    }

    fn checkpoint(content: &str) -> Checkpoint {
        let hash = ContentHash::of(content.as_bytes());
        Checkpoint {
            id: CheckpointId::new(),
            file_key: key(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            trigger: Trigger::Manual,
            kind: CheckpointKind::Auto,
            base_ref: hash,
            delta: None,
            content_hash: hash,
            label: None,
            description: None,
            stats: CheckpointStats::default(),
        }
    }

    fn open() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path().join("checkpoints")).unwrap();
        (dir, store)
    }

    #[test]
    fn missing_history_is_empty() {
        let (_dir, store) = open();
        let history = store.load(&key()).unwrap();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }

    #[test]
    fn append_then_load() {
        let (_dir, store) = open();
        let a = checkpoint("a");
        store.append(&store.load(&key()).unwrap(), &a).unwrap();
        let b = checkpoint("b");
        store.append(&store.load(&key()).unwrap(), &b).unwrap();

        let history = store.load(&key()).unwrap();
        let ids: Vec<_> = history.checkpoints().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![a.id, b.id.clone()]);
        assert_eq!(history.latest().unwrap().id, b.id);
    }

    #[test]
    fn stale_history_is_a_concurrency_violation() {
        let (_dir, store) = open();
        let stale = store.load(&key()).unwrap();
        store.append(&stale, &checkpoint("first")).unwrap();
        let result = std::panic::catch_unwind(|| store.append(&stale, &checkpoint("second")));
        match result {
            // debug builds assert
            Err(_) => {}
            Ok(res) => assert!(matches!(
                res,
                Err(CheckpointError::ConcurrencyViolation { .. })
            )),
        }
        assert_eq!(store.load(&key()).unwrap().checkpoints().count(), 1);
    }

    #[test]
    fn corrupt_lines_are_reported_and_preserved() {
        let (_dir, store) = open();
        let good = checkpoint("good");
        store.append(&store.load(&key()).unwrap(), &good).unwrap();
        let path = store.path_for(&key());
        let mut text = fs::read_to_string(&path).unwrap();
        text.push_str("{\"id\": garbage\n");
        fs::write(&path, &text).unwrap();

        let mut history = store.load(&key()).unwrap();
        assert_eq!(history.checkpoints().count(), 1);
        assert_eq!(history.corrupt_count(), 1);
        assert!(matches!(
            &history.lines()[1],
            HistoryLine::Corrupt { line: 2, .. }
        ));

        history.find_mut(&good.id).unwrap().label = Some("kept".into());
        store.rewrite(&history).unwrap();
        let reloaded = store.load(&key()).unwrap();
        assert_eq!(reloaded.corrupt_count(), 1);
        assert_eq!(reloaded.find(&good.id).unwrap().label.as_deref(), Some("kept"));
    }

    #[test]
    fn torn_tail_does_not_swallow_next_record() {
        let (_dir, store) = open();
        store.append(&store.load(&key()).unwrap(), &checkpoint("a")).unwrap();
        let path = store.path_for(&key());
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"id\":\"torn").unwrap();
        drop(file);

        let next = checkpoint("b");
        store.append(&store.load(&key()).unwrap(), &next).unwrap();
        let history = store.load(&key()).unwrap();
        assert_eq!(history.checkpoints().count(), 2);
        assert_eq!(history.corrupt_count(), 1);
        assert_eq!(history.latest().unwrap().id, next.id);
    }

    #[test]
    fn remove_and_rewrite_to_empty_deletes_file() {
        let (_dir, store) = open();
        let a = checkpoint("a");
        store.append(&store.load(&key()).unwrap(), &a).unwrap();
        let mut history = store.load(&key()).unwrap();
        let removed = history.remove(std::slice::from_ref(&a.id));
        assert_eq!(removed.len(), 1);
        store.rewrite(&history).unwrap();
        assert!(!store.path_for(&key()).exists());
    }

    #[test]
    fn salvages_base_ref_from_semantically_corrupt_lines() {
        let (_dir, store) = open();
        let hash = ContentHash::of(b"still referenced");
        let path = store.path_for(&key());
        fs::write(
            &path,
            format!("{{\"base_ref\":\"{}\",\"delta\":\"zz\"}}\n", hash.to_hex()),
        )
        .unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].referenced_blobs(), vec![hash]);
    }

    #[test]
    fn load_all_skips_foreign_files() {
        let (_dir, store) = open();
        store.append(&store.load(&key()).unwrap(), &checkpoint("a")).unwrap();
        fs::write(store.root().join("README"), "not a history").unwrap();
        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].file_key(), &key());
    }
}
