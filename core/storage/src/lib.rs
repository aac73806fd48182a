//! Storage backends for vaultsync.
//!
//! This crate provides a trait-based interface over storage media (the
//! local filesystem and remote backends) and the cache that remote
//! backends keep on local disk.
//!
//! # Design Principles
//! - Provider isolation: no backend-specific logic leaks into sync or vault code
//! - Blocking operations: callers own any threading
//! - Streaming support: file content is handled via streams
//! - Atomic writes: written bytes become visible only on close

pub mod cache;
pub mod local;
pub mod provider;
pub mod remote;
pub mod staged;

pub use cache::{RemoteFile, RemoteFileCache, SqliteFileCache};
pub use local::LocalProvider;
pub use provider::{
    Authenticator, Credentials, FileSystemProvider, OnConflictStrategy, ReadStream,
    RemoteFileSystemProvider, WriteStream,
};
pub use remote::{DirectoryClient, MemoryClient, RemoteClient, RemoteEntry, RemoteProvider};
pub use staged::StagedWriter;
