//! Storage provider capability definitions.

use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

use vaultsync_common::{BackendKind, FileDescriptor, Result};

/// What to do when the remote copy changed since the cached copy was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnConflictStrategy {
    /// Overwrite the other side.
    Rewrite,
    /// Stop and report a version conflict.
    Cancel,
}

/// Byte stream returned by `open_file_for_read`. Closed on drop.
pub type ReadStream = Box<dyn Read + Send>;

/// Byte stream returned by `open_file_for_write`.
///
/// Written bytes become visible only after [`WriteStream::close`] succeeds.
/// Dropping the stream without closing it discards everything written.
pub trait WriteStream: Write + Send {
    /// Flush and publish the written bytes.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Credentials for backends that need them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Credential negotiation for a backend.
pub trait Authenticator: Send + Sync {
    /// Whether the backend currently accepts requests.
    fn is_authenticated(&self) -> bool;

    /// Present credentials to the backend.
    ///
    /// # Errors
    /// - `AccessForbidden` if the credentials are rejected
    fn authenticate(&self, credentials: &Credentials) -> Result<()>;
}

/// Uniform file access over a storage medium.
///
/// Every operation reports expected failures through [`Result`] except the
/// stream-open primitives and `exists`, which are thin wrappers over the
/// medium's native calls and report raw `std::io` faults. Their direct
/// callers convert those faults into a domain error on the spot.
pub trait FileSystemProvider: Send + Sync {
    /// Backend this provider serves.
    fn kind(&self) -> BackendKind;

    /// Credential negotiation object, if the backend needs one.
    fn authenticator(&self) -> Option<&dyn Authenticator>;

    /// List immediate children of a directory.
    ///
    /// # Errors
    /// - `NotADirectory` if `dir` is not a directory
    /// - `NotFound` if `dir` does not exist
    /// - `AccessForbidden` if the medium denies enumeration
    fn list_files(&self, dir: &FileDescriptor) -> Result<Vec<FileDescriptor>>;

    /// Get the parent directory of a file.
    ///
    /// # Errors
    /// - `NotFound` if `file` does not exist
    /// - `FileDoesNotExist` if `file` has no parent
    fn get_parent(&self, file: &FileDescriptor) -> Result<FileDescriptor>;

    /// Get the backend root.
    fn get_root_file(&self) -> Result<FileDescriptor>;

    fn open_file_for_read(&self, file: &FileDescriptor) -> io::Result<ReadStream>;

    fn open_file_for_write(&self, file: &FileDescriptor) -> io::Result<Box<dyn WriteStream>>;

    fn exists(&self, file: &FileDescriptor) -> io::Result<bool>;

    /// Flush deferred writes, best effort.
    fn sync(&self);
}

/// Remote backend fronted by a local cache.
pub trait RemoteFileSystemProvider: FileSystemProvider {
    /// Resolve a descriptor by remote path, from the cache when `use_cache`
    /// is set and the file is tracked.
    fn get_file(&self, path: &str, use_cache: bool) -> Result<FileDescriptor>;

    /// Open a file for reading. May fetch the remote copy into the cache.
    fn open_remote_file_for_read(
        &self,
        file: &FileDescriptor,
        on_conflict: OnConflictStrategy,
        use_cache: bool,
    ) -> Result<ReadStream>;

    /// Open a file for writing. Bytes land in the cache on close and are
    /// uploaded unless `use_cache` defers the upload.
    fn open_remote_file_for_write(
        &self,
        file: &FileDescriptor,
        on_conflict: OnConflictStrategy,
        use_cache: bool,
    ) -> Result<Box<dyn WriteStream>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_strategy_serialization() {
        let json = serde_json::to_string(&OnConflictStrategy::Rewrite).unwrap();
        assert_eq!(json, "\"rewrite\"");
        let parsed: OnConflictStrategy = serde_json::from_str("\"cancel\"").unwrap();
        assert_eq!(parsed, OnConflictStrategy::Cancel);
    }
}
