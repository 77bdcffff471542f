//! Foundation types for vellum, the document versioning and durability engine.
//!
//! Every other vellum crate depends on `vellum-types`.
//!
//! # Key Types
//!
//! - [`ContentHash`]: BLAKE3 digest identifying a blob in the object store
//! - [`FileKey`]: workspace-relative document identifier
//! - [`CheckpointId`]: UUID v7 checkpoint identifier (time-ordered)
//! - [`SessionId`]: identifies one engine lifetime, stamped on WAL entries
//! - [`Trigger`] / [`CheckpointKind`]: why a checkpoint was taken
//! - [`Clock`]: wall-clock source, swappable in tests

pub mod checkpoint;
pub mod clock;
pub mod error;
pub mod hash;
pub mod key;

pub use checkpoint::{CheckpointId, CheckpointKind, SessionId, Trigger};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::TypeError;
pub use hash::ContentHash;
pub use key::FileKey;
