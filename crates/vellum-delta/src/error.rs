//! Error types for the delta crate.

/// Errors that can occur while replaying or decoding a delta.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    /// The delta does not fit its base: an op runs past the end of the base,
    /// splits a UTF-8 character, or leaves part of the base unconsumed.
    #[error("delta corrupt at op {op_index}: {reason}")]
    Corrupt { op_index: usize, reason: String },

    /// The encoded form of a delta is malformed.
    #[error("delta decode failed at byte {offset}: {reason}")]
    Decode { offset: usize, reason: String },
}

/// Convenience alias for delta results.
pub type DeltaResult<T> = Result<T, DeltaError>;
