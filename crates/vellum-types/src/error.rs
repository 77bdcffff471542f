use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid file key {key:?}: {reason}")]
    InvalidFileKey { key: String, reason: &'static str },

    #[error("invalid checkpoint id: {0}")]
    InvalidCheckpointId(String),

    #[error("unknown trigger: {0}")]
    UnknownTrigger(String),
}
