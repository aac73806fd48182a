//! Per-file serialization of sync runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use vaultsync_common::{FileDescriptor, Result};
use vaultsync_storage::OnConflictStrategy;

use crate::processor::SyncProcessor;
use crate::strategy::SyncStrategy;

/// Runs a [`SyncProcessor`] with at most one sync in flight per file uid.
///
/// Syncs of different files proceed in parallel.
pub struct SyncCoordinator {
    processor: Arc<dyn SyncProcessor>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SyncCoordinator {
    pub fn new(processor: Arc<dyn SyncProcessor>) -> Self {
        Self {
            processor,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Sync `local`, waiting for any sync of the same uid to finish first.
    pub fn process(
        &self,
        local: &FileDescriptor,
        strategy: SyncStrategy,
        on_conflict: OnConflictStrategy,
    ) -> Result<FileDescriptor> {
        let slot = self.slot(&local.uid);
        let result = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            debug!("Acquired sync slot for {}", local.uid);
            self.processor.process(local, strategy, on_conflict)
        };

        self.release(&local.uid, slot);
        result
    }

    pub fn processor(&self) -> &Arc<dyn SyncProcessor> {
        &self.processor
    }

    fn slot(&self, uid: &str) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(in_flight.entry(uid.to_string()).or_default())
    }

    /// Drop the slot for `uid` once no other caller holds or waits on it.
    fn release(&self, uid: &str, slot: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here.
        if Arc::strong_count(&slot) == 2 {
            in_flight.remove(uid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::SyncStatus;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use vaultsync_common::BackendKind;

    /// Processor that tracks how many calls overlap.
    #[derive(Default)]
    struct SlowProcessor {
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl SyncProcessor for SlowProcessor {
        fn locally_modified_files(&self) -> Result<Vec<FileDescriptor>> {
            Ok(Vec::new())
        }

        fn sync_status(&self, _file: &FileDescriptor) -> Result<SyncStatus> {
            Ok(SyncStatus::NoChanges)
        }

        fn process(
            &self,
            local: &FileDescriptor,
            _strategy: SyncStrategy,
            _on_conflict: OnConflictStrategy,
        ) -> Result<FileDescriptor> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(local.clone())
        }
    }

    /// Returns the peak number of overlapping syncs and the slots left behind.
    fn run_concurrently(uids: &[&str]) -> (usize, usize) {
        let processor = Arc::new(SlowProcessor::default());
        let coordinator = Arc::new(SyncCoordinator::new(processor.clone()));

        let handles: Vec<_> = uids
            .iter()
            .map(|uid| {
                let coordinator = Arc::clone(&coordinator);
                let file = FileDescriptor::file(*uid, "/db.kdbx", Utc::now(), BackendKind::Remote);
                thread::spawn(move || {
                    coordinator
                        .process(
                            &file,
                            SyncStrategy::LastModificationWins,
                            OnConflictStrategy::Rewrite,
                        )
                        .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        let slots = coordinator.in_flight.lock().unwrap().len();
        (processor.max_active.load(Ordering::SeqCst), slots)
    }

    #[test]
    fn test_same_uid_is_serialized() {
        assert_eq!(run_concurrently(&["abc", "abc", "abc", "abc"]).0, 1);
    }

    #[test]
    fn test_slots_released_after_sync() {
        let uids: Vec<String> = (0..64).map(|i| format!("uid-{}", i % 8)).collect();
        let uids: Vec<&str> = uids.iter().map(String::as_str).collect();
        assert_eq!(run_concurrently(&uids).1, 0);
    }

    #[test]
    fn test_failed_sync_releases_slot() {
        let coordinator = SyncCoordinator::new(Arc::new(crate::LocalSyncProcessor));
        let file =
            FileDescriptor::file("/tmp/db.kdbx", "/tmp/db.kdbx", Utc::now(), BackendKind::Local);

        assert!(coordinator
            .process(
                &file,
                SyncStrategy::LastModificationWins,
                OnConflictStrategy::Cancel,
            )
            .is_err());
        assert!(coordinator.in_flight.lock().unwrap().is_empty());
    }
}
