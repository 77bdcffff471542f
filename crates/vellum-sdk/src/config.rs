use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vellum_checkpoint::CheckpointConfig;
use vellum_wal::WalConfig;

use crate::error::{EngineError, EngineResult};

/// Everything needed to open an [`Engine`](crate::Engine).
///
/// Loadable from TOML; every field is optional there.
///
/// ```toml
/// root = "/home/me/notes/.vellum"
/// pump_interval_ms = 1000
///
/// [checkpoint]
/// delta_ratio = 0.5
///
/// [checkpoint.retention]
/// window_secs = 60
/// keep_recent = 10
///
/// [wal]
/// sync_mode = "every_write"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Storage root; holds `objects/`, `checkpoints/` and `wal/`.
    pub root: PathBuf,
    /// How often a [`WalPump`](crate::WalPump) flushes coalesced updates.
    pub pump_interval_ms: u64,
    pub checkpoint: CheckpointConfig,
    pub wal: WalConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".vellum"),
            pump_interval_ms: 1000,
            checkpoint: CheckpointConfig::default(),
            wal: WalConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: CheckpointConfig) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn with_wal(mut self, wal: WalConfig) -> Self {
        self.wal = wal;
        self
    }

    pub fn with_pump_interval(mut self, interval: Duration) -> Self {
        self.pump_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> EngineResult<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn validate(&self) -> EngineResult<()> {
        let ratio = self.checkpoint.delta_ratio;
        if !(ratio.is_finite() && ratio > 0.0 && ratio <= 1.0) {
            return Err(EngineError::Config(format!(
                "checkpoint.delta_ratio must be in (0, 1], got {ratio}"
            )));
        }
        if self.pump_interval_ms == 0 {
            return Err(EngineError::Config("pump_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn pump_interval(&self) -> Duration {
        Duration::from_millis(self.pump_interval_ms)
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    pub fn wal_dir(&self) -> PathBuf {
        self.root.join("wal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_wal::SyncMode;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn toml_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            root = "/tmp/ws"
            pump_interval_ms = 250

            [checkpoint.retention]
            keep_recent = 2

            [wal]
            sync_mode = "os_default"
            "#,
        )
        .unwrap();
        assert_eq!(config.root, PathBuf::from("/tmp/ws"));
        assert_eq!(config.pump_interval(), Duration::from_millis(250));
        assert_eq!(config.checkpoint.retention.keep_recent, 2);
        assert_eq!(config.checkpoint.retention.window_secs, 60);
        assert_eq!(config.wal.sync_mode, SyncMode::OsDefault);
        assert_eq!(config.wal_dir(), PathBuf::from("/tmp/ws/wal"));
    }

    #[test]
    fn toml_roundtrip() {
        let config = EngineConfig::default().with_root("/data/vellum");
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(EngineConfig::from_toml_str("[checkpoint]\ndelta_ratio = 0.0").is_err());
        assert!(EngineConfig::from_toml_str("pump_interval_ms = 0").is_err());
        assert!(EngineConfig::from_toml_str("root = 7").is_err());
    }
}
