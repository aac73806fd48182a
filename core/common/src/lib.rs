//! Common utilities and types shared across vaultsync crates.
//!
//! This module provides the error taxonomy and the backend-independent file
//! descriptor that every storage provider and sync processor speaks.

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{BackendKind, FileDescriptor, RemotePath};
