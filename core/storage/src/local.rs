//! Local filesystem storage provider.

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use crate::provider::{Authenticator, FileSystemProvider, ReadStream, WriteStream};
use crate::staged::StagedWriter;
use vaultsync_common::{BackendKind, Error, FileDescriptor, Result};

/// Local filesystem storage provider.
///
/// Descriptors use the absolute path as both `uid` and `path`.
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    /// Create a provider rooted at `/`.
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }

    /// Create a provider rooted at `root`.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied
    pub fn with_root(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    /// Build a descriptor for a path on disk, following symlinks.
    ///
    /// # Errors
    /// - `NotFound` if the path does not exist
    /// - `GenericIo` if the modification time can't be read
    pub fn descriptor_for(&self, path: &Path) -> Result<FileDescriptor> {
        let meta = fs::metadata(path)?;
        self.descriptor_from(path, &meta)
    }

    fn descriptor_from(&self, path: &Path, meta: &fs::Metadata) -> Result<FileDescriptor> {
        let modified = modified_at(path, meta.modified())?;
        let path_str = path.to_string_lossy().into_owned();

        let descriptor = if meta.is_dir() {
            FileDescriptor::directory(path_str.clone(), path_str, modified, BackendKind::Local)
        } else {
            FileDescriptor::file(path_str.clone(), path_str, modified, BackendKind::Local)
        };

        if path == self.root {
            Ok(descriptor.into_root())
        } else {
            Ok(descriptor)
        }
    }

    /// Descriptor for a directory entry. A symlink whose target is gone is
    /// described by the link itself.
    fn child_descriptor(&self, entry: &fs::DirEntry) -> Result<FileDescriptor> {
        let path = entry.path();
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Dangling link {}", path.display());
                entry.metadata()?
            }
            Err(e) => return Err(e.into()),
        };
        self.descriptor_from(&path, &meta)
    }
}

/// Modification time reported by the filesystem. Never substituted.
fn modified_at(path: &Path, modified: io::Result<SystemTime>) -> Result<DateTime<Utc>> {
    modified.map(DateTime::<Utc>::from).map_err(|e| {
        Error::generic_io(
            format!("Failed to read modification time of {}", path.display()),
            Some(e),
        )
    })
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystemProvider for LocalProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn authenticator(&self) -> Option<&dyn Authenticator> {
        None
    }

    fn list_files(&self, dir: &FileDescriptor) -> Result<Vec<FileDescriptor>> {
        if !dir.is_directory {
            return Err(Error::NotADirectory(dir.path.clone()));
        }

        let path = Path::new(&dir.path);
        if !path.exists() {
            return Err(Error::NotFound(format!("Directory not found: {}", dir.path)));
        }

        let entries = fs::read_dir(path).map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => Error::access_forbidden("File access is forbidden", e),
            _ => Error::generic_io(format!("Failed to list {}", dir.path), Some(e)),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            files.push(self.child_descriptor(&entry)?);
        }

        debug!("Listed {} entries in {}", files.len(), dir.path);
        Ok(files)
    }

    fn get_parent(&self, file: &FileDescriptor) -> Result<FileDescriptor> {
        let path = Path::new(&file.path);
        if !path.exists() {
            return Err(Error::NotFound(format!("File not found: {}", file.path)));
        }

        match path.parent() {
            Some(parent) if path != self.root => self.descriptor_for(parent),
            _ => Err(Error::FileDoesNotExist(format!(
                "No parent for {}",
                file.path
            ))),
        }
    }

    fn get_root_file(&self) -> Result<FileDescriptor> {
        if !self.root.exists() {
            return Err(Error::NotFound(format!(
                "Root not found: {}",
                self.root.display()
            )));
        }
        self.descriptor_for(&self.root)
    }

    fn open_file_for_read(&self, file: &FileDescriptor) -> io::Result<ReadStream> {
        let f = File::open(&file.path)?;
        Ok(Box::new(BufReader::new(f)))
    }

    fn open_file_for_write(&self, file: &FileDescriptor) -> io::Result<Box<dyn WriteStream>> {
        Ok(Box::new(StagedWriter::new(&file.path)?))
    }

    fn exists(&self, file: &FileDescriptor) -> io::Result<bool> {
        Path::new(&file.path).try_exists()
    }

    fn sync(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::TempDir;
    use vaultsync_common::ErrorKind;

    fn setup() -> (TempDir, LocalProvider) {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::with_root(temp.path()).unwrap();
        (temp, provider)
    }

    #[test]
    fn test_local_write_read() {
        let (temp, provider) = setup();
        let path = temp.path().join("test.kdbx");
        let fd = FileDescriptor::file(
            path.to_string_lossy(),
            path.to_string_lossy(),
            Utc::now(),
            BackendKind::Local,
        );

        let mut out = provider.open_file_for_write(&fd).unwrap();
        out.write_all(b"Hello, Local!").unwrap();
        out.close().unwrap();

        let mut data = Vec::new();
        provider
            .open_file_for_read(&fd)
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        assert_eq!(data, b"Hello, Local!");
        assert!(provider.exists(&fd).unwrap());
    }

    #[test]
    fn test_local_list() {
        let (temp, provider) = setup();
        fs::create_dir(temp.path().join("dir")).unwrap();
        fs::write(temp.path().join("dir/file1.kdbx"), [1]).unwrap();
        fs::write(temp.path().join("dir/file2.kdbx"), [2]).unwrap();

        let dir = provider.descriptor_for(&temp.path().join("dir")).unwrap();
        let contents = provider.list_files(&dir).unwrap();
        assert_eq!(contents.len(), 2);
        assert!(contents.iter().all(|f| f.backend == BackendKind::Local));
    }

    #[test]
    fn test_local_list_empty_dir() {
        let (_temp, provider) = setup();
        let root = provider.get_root_file().unwrap();
        assert!(root.is_root);
        assert!(provider.list_files(&root).unwrap().is_empty());
    }

    #[test]
    fn test_local_list_errors() {
        let (temp, provider) = setup();
        let file_path = temp.path().join("plain.kdbx");
        fs::write(&file_path, b"x").unwrap();
        let file = provider.descriptor_for(&file_path).unwrap();
        assert_eq!(
            provider.list_files(&file).unwrap_err().kind(),
            ErrorKind::NotADirectory
        );

        let missing = temp.path().join("missing");
        let dir = FileDescriptor::directory(
            missing.to_string_lossy(),
            missing.to_string_lossy(),
            Utc::now(),
            BackendKind::Local,
        );
        assert_eq!(provider.list_files(&dir).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_local_get_parent() {
        let (temp, provider) = setup();
        let file_path = temp.path().join("a.kdbx");
        fs::write(&file_path, b"x").unwrap();

        let file = provider.descriptor_for(&file_path).unwrap();
        let parent = provider.get_parent(&file).unwrap();
        assert!(parent.is_root);

        assert_eq!(
            provider.get_parent(&parent).unwrap_err().kind(),
            ErrorKind::FileDoesNotExist
        );

        fs::remove_file(&file_path).unwrap();
        assert_eq!(provider.get_parent(&file).unwrap_err().kind(), ErrorKind::NotFound);
        assert!(!provider.exists(&file).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_local_list_keeps_dangling_link() {
        let (temp, provider) = setup();
        fs::write(temp.path().join("a.kdbx"), b"x").unwrap();
        std::os::unix::fs::symlink(temp.path().join("gone"), temp.path().join("link")).unwrap();

        let root = provider.get_root_file().unwrap();
        let mut names: Vec<_> = provider
            .list_files(&root)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.kdbx", "link"]);
    }

    #[test]
    fn test_unreadable_mtime_is_error() {
        let err = modified_at(
            Path::new("/db.kdbx"),
            Err(io::Error::new(io::ErrorKind::Unsupported, "no mtime")),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenericIo);
    }

    #[test]
    fn test_local_has_no_authenticator() {
        let provider = LocalProvider::new();
        assert!(provider.authenticator().is_none());
        assert_eq!(provider.kind(), BackendKind::Local);
    }
}
