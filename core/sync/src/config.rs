//! Sync configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use vaultsync_common::{Error, Result};
use vaultsync_storage::OnConflictStrategy;

use crate::strategy::SyncStrategy;

/// Configuration for syncing remote vault files.
///
/// Missing fields take their default values when loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How cached and remote copies are reconciled.
    pub sync_strategy: SyncStrategy,
    /// What to do when the remote copy is newer.
    pub on_conflict: OnConflictStrategy,
    /// Directory holding cached copies of remote files.
    pub cache_dir: PathBuf,
    /// Cache database file.
    pub cache_db: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let base = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("vaultsync");

        Self {
            sync_strategy: SyncStrategy::default(),
            on_conflict: OnConflictStrategy::Cancel,
            cache_dir: base.join("files"),
            cache_db: base.join("cache.db"),
        }
    }
}

impl SyncConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// - `NotFound` if the file does not exist
    /// - `Serialization` if the file is not valid configuration
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::NotFound(format!("Config file not found: {}", path.display()))
            }
            _ => Error::from(e),
        })?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vaultsync_common::ErrorKind;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.sync_strategy, SyncStrategy::LastModificationWins);
        assert_eq!(config.on_conflict, OnConflictStrategy::Cancel);
        assert!(config.cache_dir.ends_with("vaultsync/files"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SyncConfig::from_json(r#"{ "on_conflict": "rewrite" }"#).unwrap();
        assert_eq!(config.on_conflict, OnConflictStrategy::Rewrite);
        assert_eq!(config.cache_db, SyncConfig::default().cache_db);
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let err = SyncConfig::from_json(r#"{ "on_conflict": "merge" }"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let config = SyncConfig {
            cache_dir: temp.path().join("files"),
            ..SyncConfig::default()
        };

        config.save(&path).unwrap();
        assert_eq!(SyncConfig::load(&path).unwrap(), config);
        assert_eq!(
            SyncConfig::load(temp.path().join("missing.json"))
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
    }
}
