//! Common types used throughout vaultsync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage medium a descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Local filesystem.
    Local,
    /// Remote backend accessed through a local cache.
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

/// Identity of a file at observation time, independent of its backend.
///
/// For local files `uid` is the absolute path. For remote files `uid` is the
/// id reported by the remote backend and `path` is the remote path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Stable unique identifier.
    pub uid: String,
    /// Backend-specific path.
    pub path: String,
    /// Last path component.
    pub name: String,
    /// Whether this is a directory.
    pub is_directory: bool,
    /// Whether this is the backend root.
    pub is_root: bool,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
    /// Backend the file lives on.
    pub backend: BackendKind,
}

impl FileDescriptor {
    /// Create a descriptor for a regular (non-directory) file.
    pub fn file(
        uid: impl Into<String>,
        path: impl Into<String>,
        modified_at: DateTime<Utc>,
        backend: BackendKind,
    ) -> Self {
        let path = path.into();
        Self {
            uid: uid.into(),
            name: file_name(&path).to_string(),
            path,
            is_directory: false,
            is_root: false,
            modified_at,
            backend,
        }
    }

    /// Create a descriptor for a directory.
    pub fn directory(
        uid: impl Into<String>,
        path: impl Into<String>,
        modified_at: DateTime<Utc>,
        backend: BackendKind,
    ) -> Self {
        Self {
            is_directory: true,
            ..Self::file(uid, path, modified_at, backend)
        }
    }

    /// Mark this descriptor as the backend root.
    pub fn into_root(mut self) -> Self {
        self.is_directory = true;
        self.is_root = true;
        self
    }
}

fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// A `/`-separated path on a remote backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemotePath {
    components: Vec<String>,
}

impl RemotePath {
    /// Create a root path.
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parse a path string. Empty components are skipped, so `//a/` is `/a`.
    ///
    /// # Errors
    /// - Returns error if a component is `.` or `..`
    pub fn parse(path: &str) -> crate::Result<Self> {
        let mut components = Vec::new();
        for comp in path.split('/').filter(|c| !c.is_empty()) {
            if comp == "." || comp == ".." {
                return Err(crate::Error::InvalidInput(format!(
                    "Relative component in remote path: {}",
                    path
                )));
            }
            components.push(comp.to_string());
        }
        Ok(Self { components })
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let mut components = self.components.clone();
        components.pop();
        Some(Self { components })
    }

    /// Get the file/directory name (last component).
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Join this path with a child component.
    pub fn join(&self, child: &str) -> crate::Result<Self> {
        if child.is_empty() || child.contains('/') || child == "." || child == ".." {
            return Err(crate::Error::InvalidInput(format!(
                "Invalid path component: {:?}",
                child
            )));
        }
        let mut components = self.components.clone();
        components.push(child.to_string());
        Ok(Self { components })
    }

    /// Get the path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "/{}", self.components.join("/"))
        }
    }
}
