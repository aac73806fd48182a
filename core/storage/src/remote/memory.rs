//! In-memory remote client for testing.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use super::client::{RemoteClient, RemoteEntry};
use crate::provider::{Authenticator, Credentials};
use vaultsync_common::{Error, RemotePath, Result};

#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, meta: RemoteEntry },
    Directory { meta: RemoteEntry },
}

impl Entry {
    fn meta(&self) -> &RemoteEntry {
        match self {
            Entry::File { meta, .. } | Entry::Directory { meta } => meta,
        }
    }
}

/// In-memory remote backend.
///
/// Useful for testing and development. Modification times can be pinned,
/// the backend can be taken offline, and transfers are counted.
pub struct MemoryClient {
    storage: RwLock<HashMap<String, Entry>>,
    offline: AtomicBool,
    credentials: Option<Credentials>,
    authenticated: AtomicBool,
    downloads: AtomicUsize,
    uploads: AtomicUsize,
}

impl MemoryClient {
    /// Create a new empty backend with a root directory.
    pub fn new() -> Self {
        let root = RemoteEntry {
            id: Uuid::new_v4().to_string(),
            path: RemotePath::root(),
            is_directory: true,
            size: None,
            modified_at: Utc::now(),
        };

        let mut storage = HashMap::new();
        storage.insert("/".to_string(), Entry::Directory { meta: root });

        Self {
            storage: RwLock::new(storage),
            offline: AtomicBool::new(false),
            credentials: None,
            authenticated: AtomicBool::new(true),
            downloads: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
        }
    }

    /// Require these credentials before serving any request.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self.authenticated = AtomicBool::new(false);
        self
    }

    /// Simulate losing (or regaining) the network.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Store a file with a pinned modification time.
    pub fn put_file(
        &self,
        path: &str,
        data: impl Into<Vec<u8>>,
        modified_at: DateTime<Utc>,
    ) -> Result<RemoteEntry> {
        let path = RemotePath::parse(path)?;
        self.write_file(&path, data.into(), modified_at)
    }

    /// Pin the modification time of an existing object.
    pub fn set_modified(&self, path: &str, modified_at: DateTime<Utc>) -> Result<()> {
        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        let key = RemotePath::parse(path)?.to_string();
        match storage.get_mut(&key) {
            Some(Entry::File { meta, .. }) | Some(Entry::Directory { meta }) => {
                meta.modified_at = modified_at;
                Ok(())
            }
            None => Err(Error::NotFound(format!("File not found: {}", key))),
        }
    }

    pub fn create_dir(&self, path: &str) -> Result<RemoteEntry> {
        let path = RemotePath::parse(path)?;
        self.check_parent(&path)?;

        let meta = RemoteEntry {
            id: Uuid::new_v4().to_string(),
            path: path.clone(),
            is_directory: true,
            size: None,
            modified_at: Utc::now(),
        };

        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        if storage.contains_key(&path.to_string()) {
            return Err(Error::AlreadyExists(format!("Path already exists: {}", path)));
        }
        storage.insert(path.to_string(), Entry::Directory { meta: meta.clone() });
        Ok(meta)
    }

    /// Current content of a file, bypassing counters and connectivity.
    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        match storage.get(&RemotePath::parse(path).ok()?.to_string()) {
            Some(Entry::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::network_io(
                "Remote backend is unreachable",
                Some(io::Error::new(io::ErrorKind::NotConnected, "offline")),
            ));
        }
        if !self.authenticated.load(Ordering::SeqCst) {
            return Err(Error::AccessForbidden {
                message: "Authentication required".to_string(),
                source: None,
            });
        }
        Ok(())
    }

    fn check_parent(&self, path: &RemotePath) -> Result<()> {
        let Some(parent) = path.parent() else {
            return Err(Error::AlreadyExists("Root always exists".to_string()));
        };

        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        match storage.get(&parent.to_string()) {
            Some(Entry::Directory { .. }) => Ok(()),
            Some(Entry::File { .. }) => Err(Error::NotADirectory(parent.to_string())),
            None => Err(Error::NotFound("Parent directory not found".to_string())),
        }
    }

    fn write_file(
        &self,
        path: &RemotePath,
        data: Vec<u8>,
        modified_at: DateTime<Utc>,
    ) -> Result<RemoteEntry> {
        self.check_parent(path)?;

        let key = path.to_string();
        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);

        // Overwrites keep the object id, like real backends do.
        let id = match storage.get(&key) {
            Some(Entry::File { meta, .. }) => meta.id.clone(),
            Some(Entry::Directory { .. }) => {
                return Err(Error::InvalidInput(format!("Path is a directory: {}", key)));
            }
            None => Uuid::new_v4().to_string(),
        };

        let meta = RemoteEntry {
            id,
            path: path.clone(),
            is_directory: false,
            size: Some(data.len() as u64),
            modified_at,
        };
        storage.insert(
            key,
            Entry::File {
                data,
                meta: meta.clone(),
            },
        );
        Ok(meta)
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Authenticator for MemoryClient {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn authenticate(&self, credentials: &Credentials) -> Result<()> {
        match &self.credentials {
            Some(expected) if expected != credentials => Err(Error::AccessForbidden {
                message: "Invalid credentials".to_string(),
                source: None,
            }),
            _ => {
                self.authenticated.store(true, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

impl RemoteClient for MemoryClient {
    fn name(&self) -> &str {
        "memory"
    }

    fn authenticator(&self) -> Option<&dyn Authenticator> {
        self.credentials.as_ref().map(|_| self as &dyn Authenticator)
    }

    fn stat(&self, path: &RemotePath) -> Result<RemoteEntry> {
        self.check_available()?;
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        storage
            .get(&path.to_string())
            .map(|e| e.meta().clone())
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", path)))
    }

    fn list(&self, path: &RemotePath) -> Result<Vec<RemoteEntry>> {
        let dir = self.stat(path)?;
        if !dir.is_directory {
            return Err(Error::NotADirectory(path.to_string()));
        }

        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        Ok(storage
            .values()
            .map(Entry::meta)
            .filter(|m| m.path.parent().as_ref() == Some(path))
            .cloned()
            .collect())
    }

    fn download(&self, path: &RemotePath, out: &mut dyn Write) -> Result<RemoteEntry> {
        self.check_available()?;
        let (data, meta) = {
            let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
            match storage.get(&path.to_string()) {
                Some(Entry::File { data, meta }) => (data.clone(), meta.clone()),
                Some(Entry::Directory { .. }) => {
                    return Err(Error::InvalidInput("Cannot download directory".to_string()));
                }
                None => return Err(Error::NotFound(format!("File not found: {}", path))),
            }
        };

        out.write_all(&data)
            .map_err(|e| Error::network_io("Failed to receive file", Some(e)))?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(meta)
    }

    fn upload(&self, path: &RemotePath, input: &mut dyn Read) -> Result<RemoteEntry> {
        self.check_available()?;
        let mut data = Vec::new();
        input
            .read_to_end(&mut data)
            .map_err(|e| Error::network_io("Failed to send file", Some(e)))?;

        let meta = self.write_file(path, data, Utc::now())?;
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vaultsync_common::ErrorKind;

    fn path(p: &str) -> RemotePath {
        RemotePath::parse(p).unwrap()
    }

    #[test]
    fn test_upload_download() {
        let client = MemoryClient::new();
        let data = b"Hello, Remote!".to_vec();

        client.upload(&path("/db.kdbx"), &mut data.as_slice()).unwrap();

        let mut out = Vec::new();
        let meta = client.download(&path("/db.kdbx"), &mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(meta.size, Some(data.len() as u64));
        assert_eq!(client.download_count(), 1);
        assert_eq!(client.upload_count(), 1);
    }

    #[test]
    fn test_overwrite_keeps_id() {
        let client = MemoryClient::new();
        let t = Utc.timestamp_millis_opt(50).unwrap();
        let first = client.put_file("/db.kdbx", "v1", t).unwrap();
        let second = client.upload(&path("/db.kdbx"), &mut &b"v2"[..]).unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.modified_at > t);
        assert_eq!(client.content("/db.kdbx").unwrap(), b"v2");
    }

    #[test]
    fn test_list_direct_children() {
        let client = MemoryClient::new();
        let now = Utc::now();
        client.create_dir("/dir").unwrap();
        client.put_file("/dir/a.kdbx", "a", now).unwrap();
        client.put_file("/dir/b.kdbx", "b", now).unwrap();
        client.put_file("/top.kdbx", "t", now).unwrap();

        assert_eq!(client.list(&path("/dir")).unwrap().len(), 2);
        assert_eq!(client.list(&RemotePath::root()).unwrap().len(), 2);
        assert_eq!(
            client.list(&path("/top.kdbx")).unwrap_err().kind(),
            ErrorKind::NotADirectory
        );
    }

    #[test]
    fn test_missing_parent() {
        let client = MemoryClient::new();
        let err = client.put_file("/nope/db.kdbx", "x", Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_offline_is_network_error() {
        let client = MemoryClient::new();
        client.put_file("/db.kdbx", "x", Utc::now()).unwrap();
        client.set_offline(true);

        let err = client.stat(&path("/db.kdbx")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkIo);

        client.set_offline(false);
        assert!(client.stat(&path("/db.kdbx")).is_ok());
    }

    #[test]
    fn test_authentication() {
        let creds = Credentials {
            username: "user".to_string(),
            password: "secret".to_string(),
        };
        let client = MemoryClient::new().with_credentials(creds.clone());
        let auth = client.authenticator().unwrap();
        assert!(!auth.is_authenticated());
        assert_eq!(
            client.stat(&RemotePath::root()).unwrap_err().kind(),
            ErrorKind::AccessForbidden
        );

        let wrong = Credentials {
            password: "guess".to_string(),
            ..creds.clone()
        };
        assert!(auth.authenticate(&wrong).is_err());
        auth.authenticate(&creds).unwrap();
        assert!(client.stat(&RemotePath::root()).is_ok());
    }
}
