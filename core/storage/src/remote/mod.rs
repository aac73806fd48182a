//! Remote backends.
//!
//! A [`RemoteClient`] speaks to the backend; [`RemoteProvider`] layers the
//! local cache and conflict handling on top of it.

mod client;
mod directory;
mod memory;
mod provider;

pub use client::{RemoteClient, RemoteEntry};
pub use directory::DirectoryClient;
pub use memory::MemoryClient;
pub use provider::RemoteProvider;
