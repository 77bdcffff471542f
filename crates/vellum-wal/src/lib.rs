//! Crash-recovery log for vellum.
//!
//! While a document is open its latest unsaved content is mirrored into a
//! small per-document log file. A clean save or close removes the file; any
//! file still present at the next startup is evidence of a crash and is
//! offered back to the user by [`RecoveryManager::scan_for_recovery`].
//!
//! WAL entries are a liveness buffer, never a substitute for checkpoints,
//! and they never reference blobs in the object store.

pub mod config;
pub mod error;
pub mod frame;
pub mod recovery;

pub use config::{SyncMode, WalConfig};
pub use error::{WalError, WalResult};
pub use frame::{decode_frame, encode_frame, WalEntry};
pub use recovery::{RecoveryInfo, RecoveryManager};
