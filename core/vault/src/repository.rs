//! Group repository with duplicate-free titles.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use vaultsync_common::{Error, Result};

use crate::group::{Group, GroupDao};

/// Group repository.
///
/// One lock guards both the title lookup and the insert, so concurrent
/// inserts of the same title persist at most one group.
pub struct GroupRepository<D: GroupDao> {
    dao: D,
    lock: Mutex<()>,
}

impl<D: GroupDao> GroupRepository<D> {
    pub fn new(dao: D) -> Self {
        Self {
            dao,
            lock: Mutex::new(()),
        }
    }

    pub fn all_groups(&self) -> Result<Vec<Group>> {
        self.dao.get_all()
    }

    /// Whether no stored group has exactly this title.
    pub fn is_title_free(&self, title: &str) -> Result<bool> {
        let _guard = self.guard();
        self.title_free_locked(title)
    }

    /// Store `group` and assign its generated uid.
    ///
    /// # Postconditions
    /// - `group.uid` is set on success
    ///
    /// # Errors
    /// - `AlreadyExists` if a group with the same title is stored
    pub fn insert(&self, group: &mut Group) -> Result<()> {
        let _guard = self.guard();

        if !self.title_free_locked(&group.title)? {
            debug!("Rejected duplicate group title '{}'", group.title);
            return Err(Error::AlreadyExists(format!(
                "Group '{}' already exists",
                group.title
            )));
        }

        let uid = self.dao.insert(group)?;
        group.uid = Some(uid);

        info!("Inserted group {}", uid);
        Ok(())
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn title_free_locked(&self, title: &str) -> Result<bool> {
        Ok(!self.dao.get_all()?.iter().any(|g| g.title == title))
    }
}
