use std::collections::HashSet;

use vellum_types::ContentHash;

use crate::error::StoreResult;

/// Aggregate size information for a store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of blobs held.
    pub blob_count: usize,
    /// Sum of blob sizes in bytes.
    pub total_bytes: u64,
}

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - Blobs are immutable once written. The same bytes always produce the
///   same hash, so a hash can never name two different contents.
/// - `write` is idempotent: writing bytes that are already stored costs a
///   hash computation and nothing else.
/// - A blob becomes visible under its hash only once fully written.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Store `data` and return its content hash.
    fn write(&self, data: &[u8]) -> StoreResult<ContentHash>;

    /// Read a blob by hash.
    ///
    /// Returns [`StoreError::NotFound`](crate::StoreError::NotFound) if no
    /// blob exists for the hash.
    fn read(&self, hash: &ContentHash) -> StoreResult<Vec<u8>>;

    /// Check whether a blob exists.
    fn exists(&self, hash: &ContentHash) -> StoreResult<bool>;

    /// Delete a blob. Returns `true` if it existed.
    ///
    /// Intended for garbage collection only; deleting a referenced blob
    /// breaks every checkpoint built on it.
    fn delete(&self, hash: &ContentHash) -> StoreResult<bool>;

    /// Hashes of every stored blob, sorted.
    fn list(&self) -> StoreResult<Vec<ContentHash>>;

    /// Blob count and total size.
    fn stats(&self) -> StoreResult<StoreStats>;

    /// Delete every blob whose hash is not in `reachable`. Returns the
    /// number of blobs removed.
    ///
    /// The caller must guarantee that no blob about to become reachable is
    /// being written concurrently.
    fn gc(&self, reachable: &HashSet<ContentHash>) -> StoreResult<usize> {
        let mut removed = 0;
        for hash in self.list()? {
            if !reachable.contains(&hash) && self.delete(&hash)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
