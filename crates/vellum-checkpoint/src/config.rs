use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How aggressively auto checkpoints are thinned out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Auto checkpoints closer than this to the previously retained auto
    /// checkpoint are pruned.
    pub window_secs: u64,
    /// The newest `keep_recent` auto checkpoints are always retained.
    pub keep_recent: usize,
    /// Run the policy after every auto checkpoint.
    pub prune_on_create: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            window_secs: 60,
            keep_recent: 10,
            prune_on_create: true,
        }
    }
}

impl RetentionPolicy {
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window_secs = window.as_secs();
        self
    }

    pub fn with_keep_recent(mut self, keep_recent: usize) -> Self {
        self.keep_recent = keep_recent;
        self
    }

    pub fn with_prune_on_create(mut self, prune_on_create: bool) -> Self {
        self.prune_on_create = prune_on_create;
        self
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.window_secs).unwrap_or(i64::MAX))
    }
}

/// Configuration for the checkpoint manager.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// A delta is stored only if its encoded size is below this fraction of
    /// the full content size.
    pub delta_ratio: f64,
    pub retention: RetentionPolicy,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            delta_ratio: 0.5,
            retention: RetentionPolicy::default(),
        }
    }
}

impl CheckpointConfig {
    pub fn with_delta_ratio(mut self, ratio: f64) -> Self {
        self.delta_ratio = ratio;
        self
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Selection policy: should a delta of `delta_len` encoded bytes be kept
    /// instead of the `content_len`-byte full content?
    pub fn prefers_delta(&self, delta_len: usize, content_len: usize) -> bool {
        (delta_len as f64) < self.delta_ratio * content_len as f64
    }
}
