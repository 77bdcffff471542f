//! Embeddable vellum engine.
//!
//! One [`Engine`] per open workspace bundles the content-addressed object
//! store, the checkpoint manager, and the crash-recovery log, and enforces
//! the cross-cutting rules between them: garbage collection never overlaps
//! checkpoint creation, and a document's recovery log is only dropped after
//! its in-flight checkpoint has landed.
//!
//! ```no_run
//! use vellum_sdk::{Engine, EngineConfig, FileKey, Trigger};
//!
//! let engine = Engine::open(EngineConfig::default().with_root("/tmp/ws/.vellum"))?;
//! for entry in engine.scan_for_recovery()? {
//!     println!("unsaved changes found for {}", entry.file_key);
//! }
//!
//! let key = FileKey::new("notes/today.md")?;
//! engine.start_wal(&key, "draft");
//! let checkpoint = engine.create_checkpoint(&key, "draft", Trigger::FileOpen)?;
//! assert_eq!(engine.restore_content(&key, &checkpoint.id)?, "draft");
//! engine.stop_wal(&key);
//! engine.shutdown();
//! # Ok::<(), vellum_sdk::EngineError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod pump;

pub use config::EngineConfig;
pub use engine::{Engine, GcReport, StorageStats};
pub use error::{EngineError, EngineResult};
pub use pump::WalPump;

// Re-export key types
pub use vellum_checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointListing, CheckpointStats, CompareTarget,
    CorruptCheckpoint, RetentionPolicy,
};
pub use vellum_delta::{DiffHunk, DiffLine, DiffResult};
pub use vellum_types::{
    CheckpointId, CheckpointKind, Clock, ContentHash, FileKey, ManualClock, SessionId,
    SystemClock, Trigger,
};
pub use vellum_wal::{RecoveryInfo, SyncMode, WalConfig};
