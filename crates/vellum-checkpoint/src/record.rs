use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vellum_delta::Delta;
use vellum_types::{CheckpointId, CheckpointKind, ContentHash, FileKey, Trigger};

/// Size bookkeeping for a checkpoint, in bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointStats {
    /// Size of the previous checkpoint's content (0 if untracked).
    pub before_size: u64,
    /// Size of this checkpoint's content.
    pub after_size: u64,
    /// Bytes inserted plus bytes deleted relative to the previous checkpoint.
    pub change_size: u64,
}

/// One recorded version of a document.
///
/// `base_ref` always names a full blob. With no `delta` that blob *is* the
/// content; otherwise the delta applied to it yields the content, whose hash
/// is `content_hash`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub file_key: FileKey,
    pub created_at: DateTime<Utc>,
    pub trigger: Trigger,
    pub kind: CheckpointKind,
    pub base_ref: ContentHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    pub content_hash: ContentHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub stats: CheckpointStats,
}

impl Checkpoint {
    pub fn is_delta(&self) -> bool {
        self.delta.is_some()
    }

    pub fn is_bookmark(&self) -> bool {
        self.kind == CheckpointKind::Bookmark
    }
}
