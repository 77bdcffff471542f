use vellum_types::ContentHash;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No blob exists for the requested hash.
    #[error("blob not found: {0}")]
    NotFound(ContentHash),

    /// The bytes on disk no longer hash to their name (bit rot or a torn
    /// write that escaped the atomic rename).
    #[error("hash mismatch for {hash}: content hashes to {computed}")]
    HashMismatch {
        hash: ContentHash,
        computed: ContentHash,
    },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
