//! Checkpoint manager for vellum.
//!
//! Records the history of each document as an append-only sequence of
//! [`Checkpoint`]s. A checkpoint either owns a full blob in the object store
//! or is a delta against one; deltas never chain, so restoring any version
//! costs exactly one blob read and at most one delta replay.
//!
//! # Persisted Layout
//!
//! ```text
//! {root}/
//!   {file-key-digest}.jsonl   <- one checkpoint record per line, oldest first
//! ```
//!
//! # Concurrency
//!
//! Every operation on a document runs under that document's lock; different
//! documents proceed in parallel. Garbage collection of unreachable blobs is
//! driven from outside (see [`CheckpointManager::reachable_set`]) and must be
//! serialized against checkpoint creation by the caller.

pub mod config;
pub mod error;
pub mod history;
pub mod locks;
pub mod manager;
pub mod record;
pub mod retention;

pub use config::{CheckpointConfig, RetentionPolicy};
pub use error::{CheckpointError, CheckpointResult};
pub use history::{History, HistoryLine, HistoryStore};
pub use locks::KeyedLocks;
pub use manager::{
    CheckpointListing, CheckpointManager, CompareTarget, CorruptCheckpoint, HistoryStats,
};
pub use record::{Checkpoint, CheckpointStats};
pub use retention::plan_prune;
