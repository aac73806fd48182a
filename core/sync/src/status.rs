//! Sync status of a tracked remote file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vaultsync_storage::RemoteFile;

/// Sync status for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Cached copy matches the remote.
    NoChanges,
    /// Local changes pending upload.
    LocalChanges,
    /// Remote changes pending download.
    RemoteChanges,
    /// Both sides changed since the last sync.
    Conflict,
}

impl SyncStatus {
    /// Status of a cache entry given the remote's current modification time.
    pub fn of(entry: &RemoteFile, remote_modified_at: DateTime<Utc>) -> Self {
        let remote_changed = remote_modified_at > entry.remote_modified_at;
        match (entry.is_dirty, remote_changed) {
            (true, true) => Self::Conflict,
            (true, false) => Self::LocalChanges,
            (false, true) => Self::RemoteChanges,
            (false, false) => Self::NoChanges,
        }
    }

    pub fn needs_sync(&self) -> bool {
        !matches!(self, Self::NoChanges)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NoChanges => "up to date",
            Self::LocalChanges => "local changes",
            Self::RemoteChanges => "remote changes",
            Self::Conflict => "conflict",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn entry(dirty: bool) -> RemoteFile {
        let synced = Utc.timestamp_millis_opt(1_000).unwrap();
        RemoteFile {
            uid: "abc".to_string(),
            local_path: PathBuf::from("/cache/abc"),
            remote_path: "/db.kdbx".to_string(),
            local_modified_at: synced,
            remote_modified_at: synced,
            is_dirty: dirty,
        }
    }

    #[test]
    fn test_status_matrix() {
        let same = Utc.timestamp_millis_opt(1_000).unwrap();
        let later = Utc.timestamp_millis_opt(2_000).unwrap();

        assert_eq!(SyncStatus::of(&entry(false), same), SyncStatus::NoChanges);
        assert_eq!(SyncStatus::of(&entry(true), same), SyncStatus::LocalChanges);
        assert_eq!(SyncStatus::of(&entry(false), later), SyncStatus::RemoteChanges);
        assert_eq!(SyncStatus::of(&entry(true), later), SyncStatus::Conflict);
    }

    #[test]
    fn test_needs_sync() {
        assert!(!SyncStatus::NoChanges.needs_sync());
        assert!(SyncStatus::Conflict.needs_sync());
    }
}
