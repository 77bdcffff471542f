//! Content-addressed blob storage for vellum.
//!
//! Every full document snapshot the checkpoint manager keeps lives here as
//! an immutable blob named by its BLAKE3 hash. The store never interprets
//! blob contents.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`FsObjectStore`] -- one file per blob under `objects/<hh>/<hash>`
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written; identical bytes map to the same hash.
//! 2. Writes land under a temporary name and are renamed into place, so a
//!    crash never exposes a partially written blob.
//! 3. Reads recompute the hash; a mismatch is reported, never returned as data.
//! 4. Garbage collection deletes every blob outside the caller's reachable
//!    set. Serializing it against checkpoint creation is the caller's job.
//! 5. Transient I/O failures are retried once, then propagated.

pub mod atomic;
pub mod error;
pub mod fs;
pub mod memory;
pub mod retry;
pub mod traits;

pub use atomic::{sweep_temp_files, write_atomic, Durability};
pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use retry::retry_once;
pub use traits::{ObjectStore, StoreStats};
