use vellum_types::{CheckpointId, ContentHash, FileKey};

/// Errors produced by checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// No checkpoint with this id exists in the document's history.
    #[error("checkpoint {id} not found for {file_key}")]
    NotFound { file_key: FileKey, id: CheckpointId },

    /// The blob a checkpoint is built on has been removed; the version is no
    /// longer available.
    #[error("version no longer available: checkpoint {id} references missing blob {base_ref}")]
    BaseMissing { id: CheckpointId, base_ref: ContentHash },

    /// A stored checkpoint cannot be reconstructed (delta fails to apply,
    /// blob fails verification, or the result does not match its hash).
    #[error("checkpoint {id} is corrupt: {reason}")]
    Corrupt { id: CheckpointId, reason: String },

    /// Two writers touched the same document's history at once.
    #[error("concurrent writers detected on history of {file_key}")]
    ConcurrencyViolation { file_key: FileKey },

    /// Object store failure.
    #[error("store error: {0}")]
    Store(#[from] vellum_store::StoreError),

    /// I/O error on the history files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A history record could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for checkpoint operations.
pub type CheckpointResult<T> = Result<T, CheckpointError>;
