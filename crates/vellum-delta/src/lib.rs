//! Delta engine for vellum.
//!
//! Computes edit scripts between two versions of a document, replays them,
//! and encodes them compactly for storage. Also provides the coarser,
//! line-oriented comparison shown to users.
//!
//! # Key Types
//!
//! - [`DeltaOp`] / [`Delta`] -- `Keep` / `Insert` / `Delete` edit script
//! - [`diff`] / [`apply`] -- compute and replay a delta; `apply(b, &diff(b, t)) == t`
//! - [`encode`] / [`decode`] -- varint-framed binary form of a delta
//! - [`compare_lines`] / [`DiffResult`] -- line-level additions and deletions

pub mod codec;
pub mod compare;
pub mod engine;
pub mod error;
pub mod ops;

pub use codec::{decode, encode, encoded_len};
pub use compare::{compare_lines, DiffHunk, DiffLine, DiffResult};
pub use engine::{apply, diff, diff_until, DIFF_TIME_BUDGET};
pub use error::{DeltaError, DeltaResult};
pub use ops::{Delta, DeltaOp};
