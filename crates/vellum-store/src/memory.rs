use std::collections::HashMap;
use std::sync::RwLock;

use vellum_types::ContentHash;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ObjectStore, StoreStats};

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Blobs are held behind a `RwLock` for
/// safe concurrent access and cloned on read/write.
pub struct InMemoryObjectStore {
    blobs: RwLock<HashMap<ContentHash, Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Overwrite the bytes stored under `hash` without rehashing.
    ///
    /// Exists to simulate on-disk corruption in tests.
    pub fn corrupt(&self, hash: &ContentHash, data: Vec<u8>) {
        self.blobs
            .write()
            .expect("lock poisoned")
            .insert(*hash, data);
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn write(&self, data: &[u8]) -> StoreResult<ContentHash> {
        let hash = ContentHash::of(data);
        let mut map = self.blobs.write().expect("lock poisoned");
        // Overwriting with identical bytes repairs a blob damaged by `corrupt`.
        map.insert(hash, data.to_vec());
        Ok(hash)
    }

    fn read(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        let map = self.blobs.read().expect("lock poisoned");
        let data = map.get(hash).ok_or(StoreError::NotFound(*hash))?;
        let computed = ContentHash::of(data);
        if computed != *hash {
            return Err(StoreError::HashMismatch {
                hash: *hash,
                computed,
            });
        }
        Ok(data.clone())
    }

    fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(self.blobs.read().expect("lock poisoned").contains_key(hash))
    }

    fn delete(&self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(self
            .blobs
            .write()
            .expect("lock poisoned")
            .remove(hash)
            .is_some())
    }

    fn list(&self) -> StoreResult<Vec<ContentHash>> {
        let map = self.blobs.read().expect("lock poisoned");
        let mut hashes: Vec<ContentHash> = map.keys().copied().collect();
        hashes.sort();
        Ok(hashes)
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(StoreStats {
            blob_count: map.len(),
            total_bytes: map.values().map(|b| b.len() as u64).sum(),
        })
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("blob_count", &self.len())
            .finish()
    }
}
