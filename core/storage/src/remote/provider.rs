//! Remote storage provider backed by a local cache.

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::client::{RemoteClient, RemoteEntry};
use crate::cache::{RemoteFile, RemoteFileCache};
use crate::provider::{
    Authenticator, FileSystemProvider, OnConflictStrategy, ReadStream,
    RemoteFileSystemProvider, WriteStream,
};
use crate::staged::StagedWriter;
use vaultsync_common::{BackendKind, Error, FileDescriptor, RemotePath, Result};

/// State shared between the provider and the write streams it hands out.
struct Shared {
    client: Arc<dyn RemoteClient>,
    cache: Arc<dyn RemoteFileCache>,
    cache_dir: PathBuf,
}

impl Shared {
    fn lookup(&self, file: &FileDescriptor) -> Result<Option<RemoteFile>> {
        match self.cache.get_by_uid(&file.uid)? {
            Some(cached) => Ok(Some(cached)),
            None => self.cache.get_by_remote_path(&file.path),
        }
    }

    fn cache_path_for(&self, cached: Option<&RemoteFile>) -> PathBuf {
        cached
            .map(|c| c.local_path.clone())
            .unwrap_or_else(|| self.cache_dir.join(Uuid::new_v4().to_string()))
    }

    /// Fetch the remote copy into the cache and record it as clean.
    fn download(&self, remote: &RemoteEntry, cached: Option<&RemoteFile>) -> Result<RemoteFile> {
        let local_path = self.cache_path_for(cached);
        let mut staged = StagedWriter::new(&local_path)
            .map_err(|e| Error::generic_io("Failed to create cache file", Some(e)))?;

        let entry = self.client.download(&remote.path, &mut staged)?;
        staged
            .commit()
            .map_err(|e| Error::file_access("Failed to write cache file", Some(e)))?;

        let record = RemoteFile {
            uid: entry.id.clone(),
            local_path,
            remote_path: entry.path.to_string(),
            local_modified_at: entry.modified_at,
            remote_modified_at: entry.modified_at,
            is_dirty: false,
        };
        self.replace_record(cached, &record)?;

        info!("Downloaded {} into cache", record.remote_path);
        Ok(record)
    }

    /// Upload the cached copy at `local_path` and record it as clean.
    fn upload(
        &self,
        previous: Option<&RemoteFile>,
        local_path: &Path,
        remote_path: &RemotePath,
    ) -> Result<RemoteFile> {
        let mut input = File::open(local_path)
            .map_err(|e| Error::file_access("Failed to access to file", Some(e)))?;
        let entry = self.client.upload(remote_path, &mut input)?;

        let record = RemoteFile {
            uid: entry.id.clone(),
            local_path: local_path.to_path_buf(),
            remote_path: entry.path.to_string(),
            local_modified_at: entry.modified_at,
            remote_modified_at: entry.modified_at,
            is_dirty: false,
        };
        self.replace_record(previous, &record)?;

        info!("Uploaded {} from cache", record.remote_path);
        Ok(record)
    }

    fn mark_dirty(
        &self,
        uid: &str,
        previous: Option<&RemoteFile>,
        local_path: &Path,
        remote_path: &RemotePath,
        remote_modified_at: DateTime<Utc>,
    ) -> Result<RemoteFile> {
        let record = RemoteFile {
            uid: previous.map(|p| p.uid.clone()).unwrap_or_else(|| uid.to_string()),
            local_path: local_path.to_path_buf(),
            remote_path: remote_path.to_string(),
            local_modified_at: Utc::now(),
            remote_modified_at,
            is_dirty: true,
        };
        self.cache.upsert(&record)?;

        debug!("Marked {} as locally modified", record.remote_path);
        Ok(record)
    }

    fn replace_record(&self, previous: Option<&RemoteFile>, record: &RemoteFile) -> Result<()> {
        if let Some(old) = previous.filter(|p| p.uid != record.uid) {
            self.cache.delete_by_uid(&old.uid)?;
        }
        self.cache.upsert(record)
    }
}

/// Remote storage provider.
///
/// Reads and writes go through a cached copy on local disk. The cache, not
/// the remote, is the source of truth for the last known modification
/// times of both copies.
pub struct RemoteProvider {
    shared: Arc<Shared>,
}

impl RemoteProvider {
    /// Create a provider over `client`, caching copies under `cache_dir`.
    ///
    /// # Postconditions
    /// - Cache directory is created if it doesn't exist
    pub fn new(
        client: Arc<dyn RemoteClient>,
        cache: Arc<dyn RemoteFileCache>,
        cache_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            shared: Arc::new(Shared {
                client,
                cache,
                cache_dir,
            }),
        })
    }

    pub fn cache(&self) -> &Arc<dyn RemoteFileCache> {
        &self.shared.cache
    }

    fn open_cached(record: &RemoteFile) -> Result<ReadStream> {
        let file = File::open(&record.local_path)
            .map_err(|e| Error::file_access("Failed to access to file", Some(e)))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn flush_dirty(&self, record: &RemoteFile) -> Result<()> {
        let remote_path = RemotePath::parse(&record.remote_path)?;
        match self.shared.client.stat(&remote_path) {
            Ok(remote) if remote.modified_at > record.remote_modified_at => {
                return Err(Error::VersionConflict(format!(
                    "Remote copy of {} changed since last sync",
                    record.remote_path
                )));
            }
            Ok(_) | Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        self.shared
            .upload(Some(record), &record.local_path, &remote_path)?;
        Ok(())
    }
}

impl FileSystemProvider for RemoteProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn authenticator(&self) -> Option<&dyn Authenticator> {
        self.shared.client.authenticator()
    }

    fn list_files(&self, dir: &FileDescriptor) -> Result<Vec<FileDescriptor>> {
        if !dir.is_directory {
            return Err(Error::NotADirectory(dir.path.clone()));
        }

        let path = RemotePath::parse(&dir.path)?;
        let entries = self.shared.client.list(&path)?;
        Ok(entries.iter().map(RemoteEntry::to_file_descriptor).collect())
    }

    fn get_parent(&self, file: &FileDescriptor) -> Result<FileDescriptor> {
        let path = RemotePath::parse(&file.path)?;
        self.shared.client.stat(&path)?;

        let parent = path
            .parent()
            .ok_or_else(|| Error::FileDoesNotExist(format!("No parent for {}", file.path)))?;
        Ok(self.shared.client.stat(&parent)?.to_file_descriptor())
    }

    fn get_root_file(&self) -> Result<FileDescriptor> {
        Ok(self
            .shared
            .client
            .stat(&RemotePath::root())?
            .to_file_descriptor())
    }

    fn open_file_for_read(&self, file: &FileDescriptor) -> io::Result<ReadStream> {
        self.open_remote_file_for_read(file, OnConflictStrategy::Cancel, true)
            .map_err(Error::into_io)
    }

    fn open_file_for_write(&self, file: &FileDescriptor) -> io::Result<Box<dyn WriteStream>> {
        self.open_remote_file_for_write(file, OnConflictStrategy::Cancel, false)
            .map_err(Error::into_io)
    }

    fn exists(&self, file: &FileDescriptor) -> io::Result<bool> {
        let path = RemotePath::parse(&file.path).map_err(Error::into_io)?;
        match self.shared.client.stat(&path) {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into_io()),
        }
    }

    fn sync(&self) {
        let dirty = match self.shared.cache.locally_modified_files() {
            Ok(dirty) => dirty,
            Err(e) => {
                warn!("Failed to read locally modified files: {}", e);
                return;
            }
        };

        for record in dirty {
            if let Err(e) = self.flush_dirty(&record) {
                warn!("Deferred upload of {} failed: {}", record.remote_path, e);
            }
        }
    }
}

impl RemoteFileSystemProvider for RemoteProvider {
    fn get_file(&self, path: &str, use_cache: bool) -> Result<FileDescriptor> {
        let remote_path = RemotePath::parse(path)?;

        if use_cache {
            if let Some(cached) = self.shared.cache.get_by_remote_path(&remote_path.to_string())? {
                debug!("Resolved {} from cache", path);
                return Ok(FileDescriptor {
                    modified_at: cached.remote_modified_at,
                    ..cached.to_file_descriptor()
                });
            }
        }

        Ok(self.shared.client.stat(&remote_path)?.to_file_descriptor())
    }

    fn open_remote_file_for_read(
        &self,
        file: &FileDescriptor,
        on_conflict: OnConflictStrategy,
        use_cache: bool,
    ) -> Result<ReadStream> {
        let cached = self.shared.lookup(file)?;

        if use_cache {
            if let Some(cached) = &cached {
                return Self::open_cached(cached);
            }
        }

        let remote_path = RemotePath::parse(&file.path)?;
        let remote = self.shared.client.stat(&remote_path)?;
        if remote.is_directory {
            return Err(Error::InvalidInput(format!(
                "Cannot read directory: {}",
                file.path
            )));
        }

        if let Some(dirty) = cached.as_ref().filter(|c| c.is_dirty) {
            let remote_changed = remote.modified_at > dirty.remote_modified_at;
            match on_conflict {
                OnConflictStrategy::Cancel if remote_changed => {
                    return Err(Error::VersionConflict(
                        "Local version conflicts with remote".to_string(),
                    ));
                }
                OnConflictStrategy::Cancel => return Self::open_cached(dirty),
                OnConflictStrategy::Rewrite => {
                    warn!("Discarding local edits of {}", file.path);
                }
            }
        }

        let record = self.shared.download(&remote, cached.as_ref())?;
        Self::open_cached(&record)
    }

    fn open_remote_file_for_write(
        &self,
        file: &FileDescriptor,
        on_conflict: OnConflictStrategy,
        use_cache: bool,
    ) -> Result<Box<dyn WriteStream>> {
        let cached = self.shared.lookup(file)?;
        let remote_path = RemotePath::parse(&file.path)?;

        match on_conflict {
            OnConflictStrategy::Cancel if !use_cache => {
                if let Some(cached) = &cached {
                    match self.shared.client.stat(&remote_path) {
                        Ok(remote) if remote.modified_at > cached.remote_modified_at => {
                            return Err(Error::VersionConflict(
                                "Local version conflicts with remote".to_string(),
                            ));
                        }
                        Ok(_) | Err(Error::NotFound(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
            }
            OnConflictStrategy::Cancel | OnConflictStrategy::Rewrite => {}
        }

        // Remote time the edit is based on. The epoch stands for "no remote copy yet".
        let base_remote_modified_at = match &cached {
            Some(cached) => cached.remote_modified_at,
            None => match self.shared.client.stat(&remote_path) {
                Ok(remote) => remote.modified_at,
                Err(Error::NotFound(_)) => DateTime::<Utc>::UNIX_EPOCH,
                Err(e) => return Err(e),
            },
        };

        let local_path = self.shared.cache_path_for(cached.as_ref());
        let staged = StagedWriter::new(&local_path)
            .map_err(|e| Error::generic_io("Failed to create cache file", Some(e)))?;

        Ok(Box::new(RemoteWriteStream {
            staged,
            uid: file.uid.clone(),
            previous: cached,
            remote_path,
            base_remote_modified_at,
            deferred: use_cache,
            shared: Arc::clone(&self.shared),
        }))
    }
}

/// Write stream that lands in the cache and then goes upstream.
struct RemoteWriteStream {
    staged: StagedWriter,
    uid: String,
    previous: Option<RemoteFile>,
    remote_path: RemotePath,
    base_remote_modified_at: DateTime<Utc>,
    deferred: bool,
    shared: Arc<Shared>,
}

impl RemoteWriteStream {
    fn publish(self) -> Result<RemoteFile> {
        let local_path = self
            .staged
            .commit()
            .map_err(|e| Error::file_access("Failed to write cache file", Some(e)))?;

        if self.deferred {
            return self.shared.mark_dirty(
                &self.uid,
                self.previous.as_ref(),
                &local_path,
                &self.remote_path,
                self.base_remote_modified_at,
            );
        }

        match self
            .shared
            .upload(self.previous.as_ref(), &local_path, &self.remote_path)
        {
            Ok(record) => Ok(record),
            Err(err) => {
                warn!(
                    "Upload of {} failed, keeping local edits: {}",
                    self.remote_path, err
                );
                self.shared.mark_dirty(
                    &self.uid,
                    self.previous.as_ref(),
                    &local_path,
                    &self.remote_path,
                    self.base_remote_modified_at,
                )?;
                Err(err)
            }
        }
    }
}

impl Write for RemoteWriteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.staged.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.staged.flush()
    }
}

impl WriteStream for RemoteWriteStream {
    fn close(self: Box<Self>) -> io::Result<()> {
        self.publish().map(|_| ()).map_err(Error::into_io)
    }
}
