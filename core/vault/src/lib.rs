//! Vault-side entities for vaultsync.
//!
//! This module provides:
//! - Groups (notepads) and the store they live in
//! - A repository that keeps group titles unique under concurrent inserts

pub mod group;
pub mod repository;

pub use group::{Group, GroupDao, MemoryGroupDao};
pub use repository::GroupRepository;
