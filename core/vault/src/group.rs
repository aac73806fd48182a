//! Vault groups and their storage.

use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use vaultsync_common::{Error, Result};

/// A group of vault entries (a notepad).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Assigned by the store on insert.
    pub uid: Option<Uuid>,
    pub title: String,
    pub parent_uid: Option<Uuid>,
}

impl Group {
    /// Create a top-level group that hasn't been stored yet.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            uid: None,
            title: title.into(),
            parent_uid: None,
        }
    }

    pub fn with_parent(mut self, parent_uid: Uuid) -> Self {
        self.parent_uid = Some(parent_uid);
        self
    }
}

/// Backing store for groups.
pub trait GroupDao: Send + Sync {
    fn get_all(&self) -> Result<Vec<Group>>;

    /// Store `group` and return the uid generated for it.
    fn insert(&self, group: &Group) -> Result<Uuid>;
}

/// In-process group store.
#[derive(Default)]
pub struct MemoryGroupDao {
    groups: RwLock<Vec<Group>>,
}

impl MemoryGroupDao {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GroupDao for MemoryGroupDao {
    fn get_all(&self) -> Result<Vec<Group>> {
        Ok(self
            .groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn insert(&self, group: &Group) -> Result<Uuid> {
        if group.title.is_empty() {
            return Err(Error::InvalidInput("Group title is empty".to_string()));
        }

        let uid = Uuid::new_v4();
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        groups.push(Group {
            uid: Some(uid),
            ..group.clone()
        });
        Ok(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_generates_uid() {
        let dao = MemoryGroupDao::new();
        let uid = dao.insert(&Group::new("Work")).unwrap();

        let all = dao.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].uid, Some(uid));
        assert_eq!(all[0].title, "Work");
    }

    #[test]
    fn test_empty_title_rejected() {
        let dao = MemoryGroupDao::new();
        assert!(dao.insert(&Group::new("")).is_err());
        assert!(dao.get_all().unwrap().is_empty());
    }
}
