use std::io;

/// Errors produced by the recovery log.
#[derive(Debug, thiserror::Error)]
pub enum WalError {
    /// I/O error on a log file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The frame checksum does not match its payload.
    #[error("CRC integrity check failed: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch { expected: u32, actual: u32 },

    /// The frame header does not describe the bytes that follow it.
    #[error("invalid WAL frame: header says {length} payload bytes, {available} present")]
    InvalidLength { length: u32, available: usize },
}

/// Result alias for recovery log operations.
pub type WalResult<T> = Result<T, WalError>;
