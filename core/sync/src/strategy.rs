//! Sync strategies and the reconciliation decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vaultsync_storage::OnConflictStrategy;

/// How to reconcile a cached copy with its remote counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// The copy with the later modification time wins.
    LastModificationWins,
}

impl Default for SyncStrategy {
    fn default() -> Self {
        Self::LastModificationWins
    }
}

/// Data movement chosen for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Push the cached copy to the remote.
    Upload,
    /// Replace the cached copy with the remote.
    Download,
    /// Leave both sides alone and report a version conflict.
    Reject,
}

/// Decide how to reconcile a cached copy modified at `local` with a remote
/// copy modified at `remote`.
///
/// Equal timestamps resolve to [`SyncAction::Download`].
pub fn decide(
    local: DateTime<Utc>,
    remote: DateTime<Utc>,
    strategy: SyncStrategy,
    on_conflict: OnConflictStrategy,
) -> SyncAction {
    match strategy {
        SyncStrategy::LastModificationWins => {
            if local > remote {
                SyncAction::Upload
            } else if remote > local {
                match on_conflict {
                    OnConflictStrategy::Rewrite => SyncAction::Download,
                    OnConflictStrategy::Cancel => SyncAction::Reject,
                }
            } else {
                SyncAction::Download
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_equal_timestamps_download() {
        for on_conflict in [OnConflictStrategy::Rewrite, OnConflictStrategy::Cancel] {
            assert_eq!(
                decide(at(100), at(100), SyncStrategy::LastModificationWins, on_conflict),
                SyncAction::Download
            );
        }
    }

    #[test]
    fn test_strategy_serialization() {
        let json = serde_json::to_string(&SyncStrategy::LastModificationWins).unwrap();
        assert_eq!(json, "\"last_modification_wins\"");
    }

    proptest! {
        #[test]
        fn prop_newer_local_always_uploads(
            remote in 0i64..1_000_000_000,
            delta in 1i64..1_000_000,
            rewrite in any::<bool>(),
        ) {
            let on_conflict = if rewrite {
                OnConflictStrategy::Rewrite
            } else {
                OnConflictStrategy::Cancel
            };
            prop_assert_eq!(
                decide(at(remote + delta), at(remote), SyncStrategy::LastModificationWins, on_conflict),
                SyncAction::Upload
            );
        }

        #[test]
        fn prop_newer_remote_follows_conflict_strategy(
            local in 0i64..1_000_000_000,
            delta in 1i64..1_000_000,
        ) {
            let strategy = SyncStrategy::LastModificationWins;
            prop_assert_eq!(
                decide(at(local), at(local + delta), strategy, OnConflictStrategy::Rewrite),
                SyncAction::Download
            );
            prop_assert_eq!(
                decide(at(local), at(local + delta), strategy, OnConflictStrategy::Cancel),
                SyncAction::Reject
            );
        }
    }
}
