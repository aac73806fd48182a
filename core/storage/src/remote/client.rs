//! Remote SDK seam.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::provider::Authenticator;
use vaultsync_common::{BackendKind, FileDescriptor, RemotePath, Result};

/// Metadata for an object on the remote backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Stable identifier (provider-specific).
    pub id: String,
    pub path: RemotePath,
    pub is_directory: bool,
    /// Size in bytes (None for directories).
    pub size: Option<u64>,
    pub modified_at: DateTime<Utc>,
}

impl RemoteEntry {
    pub fn to_file_descriptor(&self) -> FileDescriptor {
        let path = self.path.to_string();
        let descriptor = if self.is_directory {
            FileDescriptor::directory(self.id.clone(), path, self.modified_at, BackendKind::Remote)
        } else {
            FileDescriptor::file(self.id.clone(), path, self.modified_at, BackendKind::Remote)
        };

        if self.path.is_root() {
            descriptor.into_root()
        } else {
            descriptor
        }
    }
}

/// Transport-level access to a remote backend.
///
/// Implementations map transport failures to `NetworkIo` and missing
/// objects to `NotFound`.
pub trait RemoteClient: Send + Sync {
    /// Client name for logs (e.g., "memory", "directory").
    fn name(&self) -> &str;

    fn authenticator(&self) -> Option<&dyn Authenticator>;

    fn stat(&self, path: &RemotePath) -> Result<RemoteEntry>;

    /// List immediate children of a directory.
    fn list(&self, path: &RemotePath) -> Result<Vec<RemoteEntry>>;

    /// Stream the file content into `out` and return its metadata.
    fn download(&self, path: &RemotePath, out: &mut dyn Write) -> Result<RemoteEntry>;

    /// Replace (or create) the file with the content of `input`.
    ///
    /// # Preconditions
    /// - Parent directory must exist
    ///
    /// # Postconditions
    /// - Returns metadata of the uploaded file, including its new
    ///   modification time
    fn upload(&self, path: &RemotePath, input: &mut dyn Read) -> Result<RemoteEntry>;
}
