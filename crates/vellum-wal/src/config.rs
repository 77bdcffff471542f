use serde::{Deserialize, Serialize};
use vellum_store::Durability;

/// Flush strategy for log writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    #[default]
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    OsDefault,
}

impl SyncMode {
    pub(crate) fn durability(self) -> Durability {
        match self {
            Self::EveryWrite => Durability::Fsync,
            Self::OsDefault => Durability::OsDefault,
        }
    }
}

/// Configuration for the recovery log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalConfig {
    pub sync_mode: SyncMode,
}

impl WalConfig {
    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }
}
