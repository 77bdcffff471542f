use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Unique identifier for a checkpoint (UUID v7 for time-ordering).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CheckpointId(uuid::Uuid);

impl CheckpointId {
    /// Generate a new time-ordered checkpoint ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short representation (first 8 characters of the UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for CheckpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CheckpointId({})", self.short_id())
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CheckpointId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidCheckpointId(e.to_string()))
    }
}

/// Identifies one engine lifetime. WAL entries carry the session that wrote
/// them so recovery can tell leftovers from a previous run apart from live
/// entries of the current one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Generate a fresh random session ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", &self.0.to_string()[..8])
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage class of a checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// Taken automatically; subject to retention pruning.
    Auto,
    /// Named by the user; never pruned automatically.
    Bookmark,
}

impl CheckpointKind {
    /// Returns `true` if retention may remove checkpoints of this kind.
    pub fn is_prunable(&self) -> bool {
        match self {
            Self::Auto => true,
            Self::Bookmark => false,
        }
    }
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Bookmark => write!(f, "bookmark"),
        }
    }
}

/// The event that caused a checkpoint to be taken.
///
/// Choosing *when* to checkpoint is the editor's business; the engine only
/// records the trigger and derives the [`CheckpointKind`] from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The document was opened.
    FileOpen,
    /// Periodic auto-save interval elapsed.
    Interval,
    /// The editor judged the pending edit significant.
    SignificantChange,
    /// The document was closed.
    FileClose,
    /// The user explicitly bookmarked the current state.
    Bookmark,
    /// Safety snapshot taken right before a restore overwrites the document.
    PreRestore,
    /// Explicit save or other user-initiated checkpoint.
    Manual,
}

impl Trigger {
    /// All triggers, in declaration order.
    pub const ALL: [Trigger; 7] = [
        Self::FileOpen,
        Self::Interval,
        Self::SignificantChange,
        Self::FileClose,
        Self::Bookmark,
        Self::PreRestore,
        Self::Manual,
    ];

    /// The checkpoint kind a trigger produces.
    pub fn kind(&self) -> CheckpointKind {
        match self {
            Self::Bookmark => CheckpointKind::Bookmark,
            Self::FileOpen
            | Self::Interval
            | Self::SignificantChange
            | Self::FileClose
            | Self::PreRestore
            | Self::Manual => CheckpointKind::Auto,
        }
    }

    /// Stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileOpen => "file_open",
            Self::Interval => "interval",
            Self::SignificantChange => "significant_change",
            Self::FileClose => "file_close",
            Self::Bookmark => "bookmark",
            Self::PreRestore => "pre_restore",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trigger {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownTrigger(s.to_string()))
    }
}
