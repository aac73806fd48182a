//! Common error types for vaultsync.

use std::fmt;
use std::io;

use thiserror::Error;

/// Top-level error type for storage and sync operations.
///
/// Every expected failure crosses component boundaries as one of these
/// variants. I/O faults from the underlying medium are remapped to the
/// nearest variant where they occur, keeping the original fault as the
/// error source.
#[derive(Debug, Error)]
pub enum Error {
    /// Target file or directory does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation requires a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// The medium denied access.
    #[error("Access forbidden: {message}")]
    AccessForbidden {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// The file exists but the requested relative (e.g. its parent) does not.
    #[error("File does not exist: {0}")]
    FileDoesNotExist(String),

    /// No cache entry is tracked for the file.
    #[error("Cache miss: {0}")]
    CacheMiss(String),

    /// Local and remote copies diverged and the caller asked not to overwrite.
    #[error("Version conflict: {0}")]
    VersionConflict(String),

    /// Transfer to or from the remote backend failed.
    #[error("Network I/O error: {message}")]
    NetworkIo {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Reading or closing a local file failed.
    #[error("File access error: {message}")]
    FileAccess {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Any other I/O failure.
    #[error("I/O error: {message}")]
    GenericIo {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persistent store (cache database, DAO) failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Discriminant of [`Error`], for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NotADirectory,
    AccessForbidden,
    FileDoesNotExist,
    CacheMiss,
    VersionConflict,
    NetworkIo,
    FileAccess,
    GenericIo,
    AlreadyExists,
    InvalidInput,
    Database,
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::NotADirectory => "NOT_A_DIRECTORY",
            ErrorKind::AccessForbidden => "ACCESS_FORBIDDEN",
            ErrorKind::FileDoesNotExist => "FILE_DOES_NOT_EXIST",
            ErrorKind::CacheMiss => "CACHE_MISS",
            ErrorKind::VersionConflict => "VERSION_CONFLICT",
            ErrorKind::NetworkIo => "NETWORK_IO_ERROR",
            ErrorKind::FileAccess => "FILE_ACCESS_ERROR",
            ErrorKind::GenericIo => "GENERIC_IO_ERROR",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Database => "DATABASE_ERROR",
            ErrorKind::Serialization => "SERIALIZATION_ERROR",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::NotADirectory(_) => ErrorKind::NotADirectory,
            Error::AccessForbidden { .. } => ErrorKind::AccessForbidden,
            Error::FileDoesNotExist(_) => ErrorKind::FileDoesNotExist,
            Error::CacheMiss(_) => ErrorKind::CacheMiss,
            Error::VersionConflict(_) => ErrorKind::VersionConflict,
            Error::NetworkIo { .. } => ErrorKind::NetworkIo,
            Error::FileAccess { .. } => ErrorKind::FileAccess,
            Error::GenericIo { .. } => ErrorKind::GenericIo,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Database(_) => ErrorKind::Database,
            Error::Serialization(_) => ErrorKind::Serialization,
        }
    }

    pub fn access_forbidden(message: impl Into<String>, source: io::Error) -> Self {
        Error::AccessForbidden {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn network_io(message: impl Into<String>, source: Option<io::Error>) -> Self {
        Error::NetworkIo {
            message: message.into(),
            source,
        }
    }

    pub fn file_access(message: impl Into<String>, source: Option<io::Error>) -> Self {
        Error::FileAccess {
            message: message.into(),
            source,
        }
    }

    pub fn generic_io(message: impl Into<String>, source: Option<io::Error>) -> Self {
        Error::GenericIo {
            message: message.into(),
            source,
        }
    }

    /// Convert into a raw medium fault, for the stream-open channel that
    /// speaks `std::io::Result`.
    pub fn into_io(self) -> io::Error {
        let kind = match self.kind() {
            ErrorKind::NotFound | ErrorKind::FileDoesNotExist => io::ErrorKind::NotFound,
            ErrorKind::AccessForbidden => io::ErrorKind::PermissionDenied,
            ErrorKind::AlreadyExists => io::ErrorKind::AlreadyExists,
            ErrorKind::InvalidInput | ErrorKind::NotADirectory => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => {
                Error::access_forbidden("File access is forbidden", err)
            }
            _ => Error::generic_io(err.to_string(), Some(err)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Error::CacheMiss("x".into()).kind(), ErrorKind::CacheMiss);
        assert_eq!(
            Error::network_io("upload failed", None).kind(),
            ErrorKind::NetworkIo
        );
        assert_eq!(ErrorKind::VersionConflict.to_string(), "VERSION_CONFLICT");
    }

    #[test]
    fn test_io_error_mapping() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: Error = io::Error::new(io::ErrorKind::PermissionDenied, "no").into();
        assert_eq!(err.kind(), ErrorKind::AccessForbidden);
        assert!(err.source().is_some());

        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert_eq!(err.kind(), ErrorKind::GenericIo);
    }

    #[test]
    fn test_into_io_keeps_error_as_inner() {
        let io_err = Error::NotFound("/db.kdbx".into()).into_io();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
        assert!(io_err.to_string().contains("/db.kdbx"));
    }
}
