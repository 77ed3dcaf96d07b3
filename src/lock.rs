//! Edit locks on arbitrary objects.
//!
//! A lock is owned by exactly one user. Locking an object that the same user
//! already holds succeeds again; locking an object held by someone else fails.

use crate::{audit::CurrentUserIdProvider, change::Change, defaults::GUEST_USER_ID};
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use log::{info, warn};
use std::{collections::BTreeSet, sync::Arc};

/// Result of trying to lock an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Locked {
    /// The object is locked by the requesting user.
    Locked,
    /// The object is locked by another user.
    NotLocked,
}

impl Locked {
    /// Whether the lock is held by the requesting user.
    pub fn is_locked(self) -> bool {
        self == Locked::Locked
    }
}

/// Who locked an object and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    lock_user_id: String,
    lock_date_time: DateTime<Utc>,
}

impl LockInfo {
    fn new(lock_user_id: impl Into<String>) -> Self {
        Self {
            lock_user_id: lock_user_id.into(),
            lock_date_time: Utc::now(),
        }
    }

    /// The user holding the lock.
    pub fn lock_user_id(&self) -> &str {
        &self.lock_user_id
    }

    /// When the lock was taken.
    pub fn lock_date_time(&self) -> DateTime<Utc> {
        self.lock_date_time
    }
}

/// Keeps track of locked objects.
pub struct LockManager {
    // Key: locked object ID
    locked_objects: DashMap<String, LockInfo>,
    current_user: Arc<dyn CurrentUserIdProvider>,
}

impl LockManager {
    /// Create a lock manager. The provider determines the user of the
    /// `*_current` operations.
    pub fn new(current_user: Arc<dyn CurrentUserIdProvider>) -> Self {
        Self {
            locked_objects: DashMap::new(),
            current_user,
        }
    }

    fn current_user_id(&self) -> String {
        self.current_user
            .current_user_id()
            .unwrap_or_else(|| GUEST_USER_ID.to_string())
    }

    /// Lock `object_id` for `user_id`.
    pub fn lock_object(&self, object_id: &str, user_id: &str) -> Locked {
        match self.locked_objects.entry(object_id.to_string()) {
            Entry::Occupied(entry) => {
                if entry.get().lock_user_id == user_id {
                    Locked::Locked
                } else {
                    Locked::NotLocked
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(LockInfo::new(user_id));
                info!("User '{user_id}' locked object '{object_id}'");
                Locked::Locked
            }
        }
    }

    /// Lock `object_id` for the current user.
    pub fn lock_object_current(&self, object_id: &str) -> Locked {
        self.lock_object(object_id, &self.current_user_id())
    }

    /// Release the lock `user_id` holds on `object_id`.
    pub fn unlock_object(&self, user_id: &str, object_id: &str) -> Change {
        let removed = self
            .locked_objects
            .remove_if(object_id, |_, lock| lock.lock_user_id == user_id);
        if removed.is_some() {
            info!("User '{user_id}' unlocked object '{object_id}'");
            return Change::Changed;
        }

        match self.get_lock_info(object_id) {
            Some(lock) => warn!(
                "User '{user_id}' could not unlock object '{object_id}' because it is locked by '{}'",
                lock.lock_user_id
            ),
            None => warn!("User '{user_id}' could not unlock object '{object_id}' because it is not locked"),
        }
        Change::Unchanged
    }

    /// Release the lock the current user holds on `object_id`.
    pub fn unlock_object_current(&self, object_id: &str) -> Change {
        self.unlock_object(&self.current_user_id(), object_id)
    }

    /// Release all locks of a user. Returns the unlocked object IDs, sorted.
    pub fn unlock_all_objects_of_user(&self, user_id: &str) -> Vec<String> {
        self.unlock_all_objects_of_user_except(user_id, &BTreeSet::new())
    }

    /// Release all locks of a user except those on `keep`. Returns the
    /// unlocked object IDs, sorted.
    pub fn unlock_all_objects_of_user_except(&self, user_id: &str, keep: &BTreeSet<String>) -> Vec<String> {
        let mut unlocked = Vec::new();
        self.locked_objects.retain(|object_id, lock| {
            if lock.lock_user_id == user_id && !keep.contains(object_id) {
                unlocked.push(object_id.clone());
                false
            } else {
                true
            }
        });
        unlocked.sort();
        if !unlocked.is_empty() {
            info!("Unlocked all objects of user '{user_id}': {unlocked:?}");
        }
        unlocked
    }

    /// Release all locks of the current user.
    pub fn unlock_all_objects_of_current_user(&self) -> Vec<String> {
        self.unlock_all_objects_of_user(&self.current_user_id())
    }

    /// Get a copy of the lock on `object_id`.
    pub fn get_lock_info(&self, object_id: &str) -> Option<LockInfo> {
        self.locked_objects.get(object_id).map(|lock| lock.clone())
    }

    /// The user holding the lock on `object_id`.
    pub fn get_lock_user_id(&self, object_id: &str) -> Option<String> {
        self.locked_objects
            .get(object_id)
            .map(|lock| lock.lock_user_id.clone())
    }

    /// Whether `user_id` holds the lock on `object_id`.
    pub fn is_object_locked_by_user(&self, object_id: &str, user_id: &str) -> bool {
        self.get_lock_user_id(object_id).as_deref() == Some(user_id)
    }

    /// Whether the current user holds the lock on `object_id`.
    pub fn is_object_locked_by_current_user(&self, object_id: &str) -> bool {
        self.is_object_locked_by_user(object_id, &self.current_user_id())
    }

    /// Whether someone other than `user_id` holds the lock on `object_id`.
    pub fn is_object_locked_by_other_user(&self, object_id: &str, user_id: &str) -> bool {
        self.get_lock_user_id(object_id)
            .is_some_and(|owner| owner != user_id)
    }

    /// Whether anybody holds the lock on `object_id`.
    pub fn is_object_locked_by_any_user(&self, object_id: &str) -> bool {
        self.locked_objects.contains_key(object_id)
    }

    /// IDs of all locked objects, sorted.
    pub fn get_all_locked_objects(&self) -> BTreeSet<String> {
        self.locked_objects
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(Arc::new(crate::audit::NoCurrentUser))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_ownership() {
        let locks = LockManager::default();
        assert!(locks.lock_object("doc", "alice").is_locked());
        assert!(locks.lock_object("doc", "alice").is_locked());
        assert_eq!(locks.lock_object("doc", "bob"), Locked::NotLocked);

        assert!(locks.is_object_locked_by_user("doc", "alice"));
        assert!(locks.is_object_locked_by_other_user("doc", "bob"));
        assert!(!locks.is_object_locked_by_other_user("doc", "alice"));
        assert!(!locks.is_object_locked_by_any_user("other"));
        assert_eq!(locks.get_lock_info("doc").unwrap().lock_user_id(), "alice");
    }

    #[test]
    fn test_unlock_only_by_owner() {
        let locks = LockManager::default();
        let _ = locks.lock_object("doc", "alice");
        assert!(locks.unlock_object("bob", "doc").is_unchanged());
        assert!(locks.unlock_object("alice", "doc").is_changed());
        assert!(locks.unlock_object("alice", "doc").is_unchanged());
        assert!(locks.get_all_locked_objects().is_empty());
    }

    #[test]
    fn test_unlock_all_of_user() {
        let locks = LockManager::default();
        for object in ["a", "b", "c"] {
            let _ = locks.lock_object(object, "alice");
        }
        let _ = locks.lock_object("d", "bob");

        let keep = BTreeSet::from(["b".to_string()]);
        assert_eq!(locks.unlock_all_objects_of_user_except("alice", &keep), vec!["a", "c"]);
        assert_eq!(locks.unlock_all_objects_of_user("alice"), vec!["b"]);
        assert!(locks.unlock_all_objects_of_user("alice").is_empty());
        assert_eq!(locks.get_all_locked_objects(), BTreeSet::from(["d".to_string()]));
    }

    #[test]
    fn test_current_user() {
        let locks = LockManager::new(Arc::new(|| Some("carol".to_string())));
        assert!(locks.lock_object_current("doc").is_locked());
        assert!(locks.is_object_locked_by_current_user("doc"));
        assert!(locks.is_object_locked_by_user("doc", "carol"));
        assert_eq!(locks.unlock_all_objects_of_current_user(), vec!["doc"]);

        let anonymous = LockManager::default();
        let _ = anonymous.lock_object_current("doc");
        assert!(anonymous.is_object_locked_by_user("doc", GUEST_USER_ID));
    }
}
