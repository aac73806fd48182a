//! Remote client over a directory, e.g. a mounted network share.

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::client::{RemoteClient, RemoteEntry};
use crate::provider::Authenticator;
use crate::staged::StagedWriter;
use vaultsync_common::{Error, RemotePath, Result};

/// Remote client whose backend is a directory tree.
///
/// Object ids are the remote paths. Transport faults are reported as
/// `NetworkIo`, since the directory usually sits on a network mount.
pub struct DirectoryClient {
    root: PathBuf,
}

impl DirectoryClient {
    /// # Errors
    /// - Root does not exist or is not a directory
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(Error::NotFound(format!(
                "Remote root not found: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    fn to_fs_path(&self, path: &RemotePath) -> PathBuf {
        let mut fs_path = self.root.clone();
        for component in path.components() {
            fs_path.push(component);
        }
        fs_path
    }

    fn entry_for(&self, path: &RemotePath, fs_meta: &fs::Metadata) -> Result<RemoteEntry> {
        Ok(RemoteEntry {
            id: path.to_string(),
            path: path.clone(),
            is_directory: fs_meta.is_dir(),
            size: fs_meta.is_file().then(|| fs_meta.len()),
            modified_at: Self::modified_at(path, fs_meta.modified())?,
        })
    }

    fn modified_at(path: &RemotePath, modified: io::Result<SystemTime>) -> Result<DateTime<Utc>> {
        modified
            .map(DateTime::<Utc>::from)
            .map_err(|e| Self::transport_error(path, e))
    }

    fn transport_error(path: &RemotePath, err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(format!("File not found: {}", path)),
            io::ErrorKind::PermissionDenied => {
                Error::access_forbidden(format!("Access denied: {}", path), err)
            }
            _ => Error::network_io(format!("Transfer failed: {}", path), Some(err)),
        }
    }
}

impl RemoteClient for DirectoryClient {
    fn name(&self) -> &str {
        "directory"
    }

    fn authenticator(&self) -> Option<&dyn Authenticator> {
        None
    }

    fn stat(&self, path: &RemotePath) -> Result<RemoteEntry> {
        let fs_meta =
            fs::metadata(self.to_fs_path(path)).map_err(|e| Self::transport_error(path, e))?;
        self.entry_for(path, &fs_meta)
    }

    fn list(&self, path: &RemotePath) -> Result<Vec<RemoteEntry>> {
        let dir = self.stat(path)?;
        if !dir.is_directory {
            return Err(Error::NotADirectory(path.to_string()));
        }

        let entries =
            fs::read_dir(self.to_fs_path(path)).map_err(|e| Self::transport_error(path, e))?;

        let mut results = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Self::transport_error(path, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child = path.join(&name)?;
            let fs_meta = entry
                .metadata()
                .map_err(|e| Self::transport_error(&child, e))?;
            results.push(self.entry_for(&child, &fs_meta)?);
        }
        Ok(results)
    }

    fn download(&self, path: &RemotePath, out: &mut dyn Write) -> Result<RemoteEntry> {
        let mut file = File::open(self.to_fs_path(path)).map_err(|e| Self::transport_error(path, e))?;
        let fs_meta = file.metadata().map_err(|e| Self::transport_error(path, e))?;
        if fs_meta.is_dir() {
            return Err(Error::InvalidInput("Cannot download directory".to_string()));
        }

        io::copy(&mut file, out).map_err(|e| Self::transport_error(path, e))?;
        self.entry_for(path, &fs_meta)
    }

    fn upload(&self, path: &RemotePath, input: &mut dyn Read) -> Result<RemoteEntry> {
        let fs_path = self.to_fs_path(path);
        if !fs_path.parent().map(Path::is_dir).unwrap_or(false) {
            return Err(Error::NotFound("Parent directory not found".to_string()));
        }

        let mut staged = StagedWriter::new(&fs_path).map_err(|e| Self::transport_error(path, e))?;
        io::copy(input, &mut staged).map_err(|e| Self::transport_error(path, e))?;
        staged.commit().map_err(|e| Self::transport_error(path, e))?;

        self.stat(path)
    }
}
