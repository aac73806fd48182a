//! Sync processors: reconcile a cached copy with its backend.

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use vaultsync_common::{Error, FileDescriptor, Result};
use vaultsync_storage::{OnConflictStrategy, RemoteFile, RemoteFileCache, RemoteFileSystemProvider};

use crate::status::SyncStatus;
use crate::strategy::{decide, SyncAction, SyncStrategy};

/// Reconciles files of one backend kind.
pub trait SyncProcessor: Send + Sync {
    /// Files whose cached copy has edits not yet uploaded.
    fn locally_modified_files(&self) -> Result<Vec<FileDescriptor>>;

    /// Compare the cached copy of `file` with its remote counterpart.
    ///
    /// # Errors
    /// - `CacheMiss` if `file` is not tracked
    /// - Any error from resolving the remote file
    fn sync_status(&self, file: &FileDescriptor) -> Result<SyncStatus>;

    /// Reconcile `local` with the remote and return the post-sync descriptor.
    ///
    /// # Preconditions
    /// - At most one call in flight per `local.uid`
    ///
    /// # Postconditions
    /// - On success the cache entry reflects the transfer that took place
    ///
    /// # Errors
    /// - `CacheMiss` if `local` is not tracked, before any backend call
    /// - `VersionConflict` if the remote is newer and `on_conflict` is `Cancel`
    /// - `NetworkIo` if an upload fails mid-transfer
    /// - `FileAccess` if a download fails mid-transfer
    fn process(
        &self,
        local: &FileDescriptor,
        strategy: SyncStrategy,
        on_conflict: OnConflictStrategy,
    ) -> Result<FileDescriptor>;
}

fn cache_miss() -> Error {
    Error::CacheMiss("Failed to find cached file".to_string())
}

/// Sync processor for remote backends.
///
/// Moves bytes between the cache and the remote through the provider's
/// streams. The cache is the source of truth for post-sync timestamps.
pub struct RemoteSyncProcessor {
    provider: Arc<dyn RemoteFileSystemProvider>,
    cache: Arc<dyn RemoteFileCache>,
    buffer_dir: PathBuf,
}

impl RemoteSyncProcessor {
    /// Create a processor that snapshots uploads under the system temp dir.
    pub fn new(
        provider: Arc<dyn RemoteFileSystemProvider>,
        cache: Arc<dyn RemoteFileCache>,
    ) -> Self {
        Self::with_buffer_dir(provider, cache, std::env::temp_dir())
    }

    pub fn with_buffer_dir(
        provider: Arc<dyn RemoteFileSystemProvider>,
        cache: Arc<dyn RemoteFileCache>,
        buffer_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            provider,
            cache,
            buffer_dir: buffer_dir.as_ref().to_path_buf(),
        }
    }

    fn upload(&self, local: &FileDescriptor, cached: &RemoteFile) -> Result<()> {
        let mut stream =
            self.provider
                .open_remote_file_for_write(local, OnConflictStrategy::Rewrite, false)?;

        // The write stream may target the very file we read from.
        let mut buffer = self.snapshot(&cached.local_path)?;

        io::copy(&mut buffer, &mut stream)
            .map_err(|e| Error::network_io("Failed to upload file", Some(e)))?;
        stream
            .close()
            .map_err(|e| Error::network_io("Failed to upload file", Some(e)))?;

        info!("Uploaded {}", local.path);
        Ok(())
    }

    fn download(&self, local: &FileDescriptor) -> Result<()> {
        let mut stream =
            self.provider
                .open_remote_file_for_read(local, OnConflictStrategy::Rewrite, false)?;

        io::copy(&mut stream, &mut io::sink())
            .map_err(|e| Error::file_access("Failed to download file", Some(e)))?;

        info!("Downloaded {}", local.path);
        Ok(())
    }

    fn snapshot(&self, source: &Path) -> Result<File> {
        let buffer_fault = |e: io::Error| Error::generic_io("Failed to access to file", Some(e));

        let mut source = File::open(source).map_err(buffer_fault)?;
        let mut buffer = tempfile::tempfile_in(&self.buffer_dir).map_err(buffer_fault)?;
        io::copy(&mut source, &mut buffer).map_err(buffer_fault)?;
        buffer.seek(SeekFrom::Start(0)).map_err(buffer_fault)?;
        Ok(buffer)
    }
}

impl SyncProcessor for RemoteSyncProcessor {
    fn locally_modified_files(&self) -> Result<Vec<FileDescriptor>> {
        Ok(self
            .cache
            .locally_modified_files()?
            .iter()
            .map(RemoteFile::to_file_descriptor)
            .collect())
    }

    fn sync_status(&self, file: &FileDescriptor) -> Result<SyncStatus> {
        let cached = self.cache.get_by_uid(&file.uid)?.ok_or_else(cache_miss)?;
        let remote = self.provider.get_file(&cached.remote_path, false)?;
        Ok(SyncStatus::of(&cached, remote.modified_at))
    }

    fn process(
        &self,
        local: &FileDescriptor,
        strategy: SyncStrategy,
        on_conflict: OnConflictStrategy,
    ) -> Result<FileDescriptor> {
        let cached = self.cache.get_by_uid(&local.uid)?.ok_or_else(cache_miss)?;
        let remote = self.provider.get_file(&local.path, false)?;

        let action = decide(local.modified_at, remote.modified_at, strategy, on_conflict);
        debug!(
            "Sync {}: local={}, remote={}, action={:?}",
            local.path, local.modified_at, remote.modified_at, action
        );

        match action {
            SyncAction::Upload => self.upload(local, &cached)?,
            SyncAction::Download => self.download(local)?,
            SyncAction::Reject => {
                warn!("Remote copy of {} is newer, sync cancelled", local.path);
                return Err(Error::VersionConflict(
                    "Local version conflicts with remote".to_string(),
                ));
            }
        }

        self.cache
            .get_by_uid(&local.uid)?
            .map(|entry| entry.to_file_descriptor())
            .ok_or_else(cache_miss)
    }
}

/// Sync processor for local backends, which have nothing to reconcile.
#[derive(Debug, Default)]
pub struct LocalSyncProcessor;

impl SyncProcessor for LocalSyncProcessor {
    fn locally_modified_files(&self) -> Result<Vec<FileDescriptor>> {
        Ok(Vec::new())
    }

    fn sync_status(&self, _file: &FileDescriptor) -> Result<SyncStatus> {
        Ok(SyncStatus::NoChanges)
    }

    fn process(
        &self,
        _local: &FileDescriptor,
        _strategy: SyncStrategy,
        _on_conflict: OnConflictStrategy,
    ) -> Result<FileDescriptor> {
        Err(Error::InvalidInput("Incorrect use case".to_string()))
    }
}
