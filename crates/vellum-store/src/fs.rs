use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use vellum_types::ContentHash;

use crate::atomic::{sweep_temp_files, write_atomic, Durability};
use crate::error::{StoreError, StoreResult};
use crate::retry::retry_once;
use crate::traits::{ObjectStore, StoreStats};

/// Filesystem-backed blob store.
///
/// Layout (two-character fan-out keeps directories small):
/// ```text
/// {root}/
///   ab/
///     ab34...ef   <- blob whose hash hex starts with "ab"
/// ```
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    durability: Durability,
}

impl FsObjectStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Temporary files left behind by writes interrupted by a crash are
    /// removed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let store = Self {
            root,
            durability: Durability::Fsync,
        };
        store.sweep()?;
        Ok(store)
    }

    /// Override the flush strategy used for blob writes.
    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a blob with the given hash is stored at.
    pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join(&hex[..2]).join(hex)
    }

    /// Remove stale temp files from every fan-out directory.
    fn sweep(&self) -> StoreResult<usize> {
        let mut removed = 0;
        for dir in self.fanout_dirs()? {
            removed += sweep_temp_files(&dir)?;
        }
        Ok(removed)
    }

    fn fanout_dirs(&self) -> StoreResult<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let is_fanout = name
                .to_str()
                .is_some_and(|n| n.len() == 2 && n.bytes().all(|b| b.is_ascii_hexdigit()));
            if is_fanout && entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }
}

impl ObjectStore for FsObjectStore {
    #[instrument(skip(self, data), level = "debug", fields(len = data.len()))]
    fn write(&self, data: &[u8]) -> StoreResult<ContentHash> {
        let hash = ContentHash::of(data);
        let path = self.blob_path(&hash);
        if path.exists() {
            match fs::read(&path) {
                Ok(existing) if ContentHash::of(&existing) == hash => {
                    debug!(hash = %hash.short_hex(), "blob already stored");
                    return Ok(hash);
                }
                Ok(_) => warn!(hash = %hash.short_hex(), "stored blob fails verification, rewriting"),
                Err(e) => warn!(hash = %hash.short_hex(), error = %e, "stored blob unreadable, rewriting"),
            }
        }

        retry_once("blob write", || write_atomic(&path, data, self.durability))?;
        debug!(hash = %hash.short_hex(), "blob written");
        Ok(hash)
    }

    fn read(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        let path = self.blob_path(hash);
        let data = match retry_once("blob read", || fs::read(&path)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*hash))
            }
            Err(e) => return Err(e.into()),
        };

        let computed = ContentHash::of(&data);
        if computed != *hash {
            warn!(hash = %hash, computed = %computed, "blob failed hash verification");
            return Err(StoreError::HashMismatch {
                hash: *hash,
                computed,
            });
        }
        Ok(data)
    }

    fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(self.blob_path(hash).is_file())
    }

    fn delete(&self, hash: &ContentHash) -> StoreResult<bool> {
        match retry_once("blob delete", || fs::remove_file(self.blob_path(hash))) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> StoreResult<Vec<ContentHash>> {
        let mut hashes = Vec::new();
        for dir in self.fanout_dirs()? {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                // Anything that is not a well-formed hash (temp files,
                // stray editor backups) is not a blob.
                match ContentHash::from_hex(&name) {
                    Ok(hash) => hashes.push(hash),
                    Err(_) => continue,
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        let mut stats = StoreStats::default();
        for hash in self.list()? {
            match fs::metadata(self.blob_path(&hash)) {
                Ok(meta) => {
                    stats.blob_count += 1;
                    stats.total_bytes += meta.len();
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(stats)
    }

    #[instrument(skip(self, reachable), fields(reachable = reachable.len()))]
    fn gc(&self, reachable: &HashSet<ContentHash>) -> StoreResult<usize> {
        let swept = self.sweep()?;
        let mut removed = 0;
        for hash in self.list()? {
            if !reachable.contains(&hash) && self.delete(&hash)? {
                removed += 1;
            }
        }
        info!(removed, swept, "object store gc complete");
        Ok(removed)
    }
}
