//! vaultsync sync engine
//!
//! This module reconciles cached copies of vault files with their backend:
//! - Last-modification-wins reconciliation with configurable conflict handling
//! - Sync status reporting for tracked files
//! - Backend resolution for local and remote files
//! - Per-file serialization of sync runs

pub mod config;
pub mod coordinator;
pub mod processor;
pub mod resolver;
pub mod status;
pub mod strategy;

// Re-export main types
pub use config::SyncConfig;
pub use coordinator::SyncCoordinator;
pub use processor::{LocalSyncProcessor, RemoteSyncProcessor, SyncProcessor};
pub use resolver::FileSystemResolver;
pub use status::SyncStatus;
pub use strategy::{decide, SyncAction, SyncStrategy};
