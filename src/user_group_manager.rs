//! User group management with XML persistence.

use crate::{
    audit::{Auditor, ObjectType},
    change::Change,
    dao::{DaoData, XmlDao, DEFAULT_AUTO_SAVE_ENABLED},
    defaults::*,
    error::{require_text, Error, Result},
    macros::impl_dao_controls,
    role_manager::RoleManager,
    user_group::UserGroup,
    user_manager::UserManager,
    xml::{XmlConverter, XmlDocument, XmlElement},
};
use log::{info, warn};
use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::Arc,
};

const ELEMENT_ROOT: &str = "usergroups";
const ELEMENT_USER_GROUP: &str = "usergroup";

/// A default group together with the members that exist when it is seeded.
struct DefaultGroup {
    id: &'static str,
    name: &'static str,
    user_id: Option<&'static str>,
    role_id: Option<&'static str>,
}

#[derive(Default)]
struct UserGroupStore {
    user_groups: HashMap<String, UserGroup>,
    defaults: Vec<DefaultGroup>,
}

impl UserGroupStore {
    fn add(&mut self, user_group: UserGroup) -> Result<()> {
        if self.user_groups.contains_key(user_group.id()) {
            return Err(Error::id_in_use("user group", user_group.id()));
        }
        self.user_groups.insert(user_group.id().to_string(), user_group);
        Ok(())
    }

    fn ids_where(&self, predicate: impl Fn(&UserGroup) -> bool) -> Vec<String> {
        let mut ids: Vec<String> = self
            .user_groups
            .values()
            .filter(|g| predicate(*g))
            .map(|g| g.id().to_string())
            .collect();
        ids.sort();
        ids
    }
}

impl DaoData for UserGroupStore {
    fn on_init(&mut self) -> Change {
        if self.defaults.is_empty() {
            return Change::Unchanged;
        }
        for default in std::mem::take(&mut self.defaults) {
            let mut group = UserGroup::with_id(default.id, default.name);
            if let Some(user_id) = default.user_id {
                let _ = group.assign_user(user_id);
            }
            if let Some(role_id) = default.role_id {
                let _ = group.assign_role(role_id);
            }
            self.user_groups.insert(default.id.to_string(), group);
        }
        Change::Changed
    }

    fn on_read(&mut self, doc: &XmlDocument) -> Result<Change> {
        self.defaults.clear();
        for element in doc.document_element().child_elements(ELEMENT_USER_GROUP) {
            self.add(UserGroup::from_xml_element(element)?)?;
        }
        Ok(Change::Unchanged)
    }

    fn create_write_data(&self) -> XmlDocument {
        let mut user_groups: Vec<&UserGroup> = self.user_groups.values().collect();
        user_groups.sort_by(|a, b| a.id().cmp(b.id()));

        let mut root = XmlElement::new(ELEMENT_ROOT);
        for user_group in user_groups {
            root.append_child(user_group.to_xml_element(ELEMENT_USER_GROUP));
        }
        XmlDocument::new(root)
    }
}

/// Manages all user groups and their user and role assignments.
///
/// Assignments are stored by ID only. Whether the IDs resolve is not
/// checked here; the [`AccessManager`](crate::access_manager::AccessManager)
/// keeps them consistent.
pub struct UserGroupManager {
    dao: XmlDao<UserGroupStore>,
    auditor: Arc<dyn Auditor>,
}

impl UserGroupManager {
    /// Create a user group manager bound to `file`. When the file does not
    /// exist yet and `create_defaults` is set, the default groups are created
    /// and linked to those default users and roles that exist.
    pub fn new(
        file: Option<PathBuf>,
        create_defaults: bool,
        user_manager: &UserManager,
        role_manager: &RoleManager,
        auditor: Arc<dyn Auditor>,
    ) -> Result<Self> {
        Self::with_auto_save(
            file,
            create_defaults,
            DEFAULT_AUTO_SAVE_ENABLED,
            user_manager,
            role_manager,
            auditor,
        )
    }

    /// Like [`new`](Self::new) with an explicit auto-save setting, which
    /// also applies to the default groups.
    pub fn with_auto_save(
        file: Option<PathBuf>,
        create_defaults: bool,
        auto_save: bool,
        user_manager: &UserManager,
        role_manager: &RoleManager,
        auditor: Arc<dyn Auditor>,
    ) -> Result<Self> {
        let mut store = UserGroupStore::default();
        if create_defaults {
            let user = |id: &'static str| user_manager.contains_user_with_id(id).then_some(id);
            let role = |id: &'static str| role_manager.contains_role_with_id(id).then_some(id);
            store.defaults = vec![
                DefaultGroup {
                    id: USERGROUP_ADMINISTRATORS_ID,
                    name: USERGROUP_ADMINISTRATORS_NAME,
                    user_id: user(USER_ADMINISTRATOR_ID),
                    role_id: role(ROLE_ADMINISTRATOR_ID),
                },
                DefaultGroup {
                    id: USERGROUP_USERS_ID,
                    name: USERGROUP_USERS_NAME,
                    user_id: user(USER_USER_ID),
                    role_id: role(ROLE_USER_ID),
                },
                DefaultGroup {
                    id: USERGROUP_GUESTS_ID,
                    name: USERGROUP_GUESTS_NAME,
                    user_id: user(USER_GUEST_ID),
                    role_id: None,
                },
            ];
        }

        Ok(Self {
            dao: XmlDao::with_auto_save(file, store, auto_save)?,
            auditor,
        })
    }

    /// Create a new user group with a generated ID.
    pub fn create_new_user_group(&self, name: &str) -> Result<UserGroup> {
        self.create_new_user_group_with_attributes(name, BTreeMap::new())
    }

    /// Create a new user group with a generated ID and custom attributes.
    pub fn create_new_user_group_with_attributes(
        &self,
        name: &str,
        custom_attributes: BTreeMap<String, String>,
    ) -> Result<UserGroup> {
        require_text(name, "name")?;
        self.add_user_group(UserGroup::new(name).with_custom_attributes(custom_attributes), false)
    }

    /// Create a new user group with a predefined ID.
    pub fn create_predefined_user_group(&self, id: &str, name: &str) -> Result<UserGroup> {
        require_text(id, "id")?;
        require_text(name, "name")?;
        self.add_user_group(UserGroup::with_id(id, name), true)
    }

    fn add_user_group(&self, user_group: UserGroup, predefined: bool) -> Result<UserGroup> {
        if let Err(e) = self.dao.try_modify(|store| store.add(user_group.clone())) {
            self.auditor.on_create_failure(
                ObjectType::USER_GROUP,
                &[user_group.id(), "id-already-in-use"],
            );
            return Err(e);
        }

        info!("Created user group '{}' ({})", user_group.name(), user_group.id());
        let mut args = vec![user_group.id()];
        if predefined {
            args.push("predefined-usergroup");
        }
        args.push(user_group.name());
        self.auditor.on_create_success(ObjectType::USER_GROUP, &args);
        Ok(user_group)
    }

    /// Delete the user group with the given ID.
    pub fn delete_user_group(&self, user_group_id: &str) -> Change {
        let change = self
            .dao
            .modify(|store| store.user_groups.remove(user_group_id).is_some().into());
        if change.is_unchanged() {
            self.auditor.on_delete_failure(
                ObjectType::USER_GROUP,
                &[user_group_id, "no-such-usergroup-id"],
            );
            return Change::Unchanged;
        }

        info!("Deleted user group {user_group_id}");
        self.auditor
            .on_delete_success(ObjectType::USER_GROUP, &[user_group_id]);
        Change::Changed
    }

    // Returns None if the user group does not exist
    fn modify_user_group(
        &self,
        user_group_id: &str,
        f: impl FnOnce(&mut UserGroup) -> Change,
    ) -> Option<Change> {
        let mut found = false;
        let change = self
            .dao
            .modify(|store| match store.user_groups.get_mut(user_group_id) {
                Some(group) => {
                    found = true;
                    f(group)
                }
                None => Change::Unchanged,
            });
        found.then_some(change)
    }

    // Audits the outcome of a modification of a single user group
    fn audit_modify(&self, result: Option<Change>, what: &str, args: &[&str]) -> Change {
        match result {
            None => {
                let mut failure_args = args.to_vec();
                failure_args.push("no-such-usergroup-id");
                self.auditor
                    .on_modify_failure(ObjectType::USER_GROUP, what, &failure_args);
                Change::Unchanged
            }
            Some(change) => {
                if change.is_changed() {
                    self.auditor.on_modify_success(ObjectType::USER_GROUP, what, args);
                }
                change
            }
        }
    }

    /// Rename a user group. An empty name is rejected.
    pub fn rename_user_group(&self, user_group_id: &str, new_name: &str) -> Change {
        if new_name.trim().is_empty() {
            self.auditor.on_modify_failure(
                ObjectType::USER_GROUP,
                "name",
                &[user_group_id, "empty-name"],
            );
            return Change::Unchanged;
        }
        let result = self.modify_user_group(user_group_id, |group| group.set_name(new_name));
        self.audit_modify(result, "name", &[user_group_id, new_name])
    }

    /// Get a snapshot of the user group with the given ID.
    pub fn get_user_group_of_id(&self, user_group_id: &str) -> Option<UserGroup> {
        self.dao
            .read(|store| store.user_groups.get(user_group_id).cloned())
    }

    /// Get snapshots of all user groups.
    pub fn get_all_user_groups(&self) -> Vec<UserGroup> {
        self.dao
            .read(|store| store.user_groups.values().cloned().collect())
    }

    /// Number of user groups.
    pub fn user_group_count(&self) -> usize {
        self.dao.read(|store| store.user_groups.len())
    }

    /// Whether a user group with the given ID exists.
    pub fn contains_user_group_with_id(&self, user_group_id: &str) -> bool {
        self.dao
            .read(|store| store.user_groups.contains_key(user_group_id))
    }

    /// Whether every given ID resolves to a user group. True for no IDs.
    pub fn contains_all_user_groups_with_id<'a>(
        &self,
        user_group_ids: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        self.dao.read(|store| {
            user_group_ids
                .into_iter()
                .all(|id| store.user_groups.contains_key(id))
        })
    }

    /// Assign a user to a user group.
    pub fn assign_user_to_user_group(&self, user_group_id: &str, user_id: &str) -> Change {
        let result = self.modify_user_group(user_group_id, |group| group.assign_user(user_id));
        self.audit_modify(result, "assign-user", &[user_group_id, user_id])
    }

    /// Remove a user from a user group.
    pub fn unassign_user_from_user_group(&self, user_group_id: &str, user_id: &str) -> Change {
        let result = self.modify_user_group(user_group_id, |group| group.unassign_user(user_id));
        self.audit_modify(result, "unassign-user", &[user_group_id, user_id])
    }

    /// Remove a user from every user group.
    pub fn unassign_user_from_all_user_groups(&self, user_id: &str) -> Change {
        let change = self.dao.modify(|store| {
            store
                .user_groups
                .values_mut()
                .fold(Change::Unchanged, |change, group| change.or(group.unassign_user(user_id)))
        });
        if change.is_changed() {
            self.auditor.on_modify_success(
                ObjectType::USER_GROUP,
                "unassign-user-from-all-usergroups",
                &[user_id],
            );
        }
        change
    }

    /// Whether the user is assigned to the user group.
    pub fn is_user_assigned_to_user_group(&self, user_group_id: &str, user_id: &str) -> bool {
        self.dao.read(|store| {
            store
                .user_groups
                .get(user_group_id)
                .is_some_and(|g| g.contains_user_id(user_id))
        })
    }

    /// All user groups the user is assigned to.
    pub fn get_all_user_groups_with_assigned_user(&self, user_id: &str) -> Vec<UserGroup> {
        self.dao.read(|store| {
            store
                .user_groups
                .values()
                .filter(|g| g.contains_user_id(user_id))
                .cloned()
                .collect()
        })
    }

    /// IDs of all user groups the user is assigned to, sorted.
    pub fn get_all_user_group_ids_with_assigned_user(&self, user_id: &str) -> Vec<String> {
        self.dao
            .read(|store| store.ids_where(|g| g.contains_user_id(user_id)))
    }

    /// Assign a role to a user group.
    pub fn assign_role_to_user_group(&self, user_group_id: &str, role_id: &str) -> Change {
        let result = self.modify_user_group(user_group_id, |group| group.assign_role(role_id));
        self.audit_modify(result, "assign-role", &[user_group_id, role_id])
    }

    /// Remove a role from a user group.
    pub fn unassign_role_from_user_group(&self, user_group_id: &str, role_id: &str) -> Change {
        let result = self.modify_user_group(user_group_id, |group| group.unassign_role(role_id));
        self.audit_modify(result, "unassign-role", &[user_group_id, role_id])
    }

    /// Remove a role from every user group.
    pub fn unassign_role_from_all_user_groups(&self, role_id: &str) -> Change {
        let change = self.dao.modify(|store| {
            store
                .user_groups
                .values_mut()
                .fold(Change::Unchanged, |change, group| change.or(group.unassign_role(role_id)))
        });
        if change.is_changed() {
            self.auditor.on_modify_success(
                ObjectType::USER_GROUP,
                "unassign-role-from-all-usergroups",
                &[role_id],
            );
        }
        change
    }

    /// Whether the role is assigned to the user group.
    pub fn is_role_assigned_to_user_group(&self, user_group_id: &str, role_id: &str) -> bool {
        self.dao.read(|store| {
            store
                .user_groups
                .get(user_group_id)
                .is_some_and(|g| g.contains_role_id(role_id))
        })
    }

    /// All user groups the role is assigned to.
    pub fn get_all_user_groups_with_assigned_role(&self, role_id: &str) -> Vec<UserGroup> {
        self.dao.read(|store| {
            store
                .user_groups
                .values()
                .filter(|g| g.contains_role_id(role_id))
                .cloned()
                .collect()
        })
    }

    /// IDs of all user groups the role is assigned to, sorted.
    pub fn get_all_user_group_ids_with_assigned_role(&self, role_id: &str) -> Vec<String> {
        self.dao
            .read(|store| store.ids_where(|g| g.contains_role_id(role_id)))
    }

    /// Remove every user and role reference rejected by the predicates.
    pub fn remove_dangling_references(
        &self,
        user_exists: &dyn Fn(&str) -> bool,
        role_exists: &dyn Fn(&str) -> bool,
    ) -> Change {
        let mut repaired: Vec<String> = Vec::new();
        let change = self.dao.modify(|store| {
            for group in store.user_groups.values_mut() {
                if group.retain_references(user_exists, role_exists).is_changed() {
                    repaired.push(group.id().to_string());
                }
            }
            (!repaired.is_empty()).into()
        });

        for user_group_id in &repaired {
            warn!("Removed dangling references from user group {user_group_id}");
            self.auditor.on_modify_success(
                ObjectType::USER_GROUP,
                "remove-dangling-references",
                &[user_group_id.as_str()],
            );
        }
        change
    }
}

impl_dao_controls!(UserGroupManager);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audit::NoopAuditor,
        password::{PasswordHashCreatorManager, Sha256PasswordHashCreator},
    };

    struct Managers {
        users: UserManager,
        roles: RoleManager,
        groups: UserGroupManager,
    }

    fn managers(create_defaults: bool) -> Managers {
        let passwords = PasswordHashCreatorManager::new();
        passwords
            .set_default_algorithm(Sha256PasswordHashCreator::ALGORITHM)
            .unwrap();
        let users =
            UserManager::new(None, create_defaults, Arc::new(passwords), Arc::new(NoopAuditor)).unwrap();
        let roles = RoleManager::new(None, create_defaults, Arc::new(NoopAuditor)).unwrap();
        let groups =
            UserGroupManager::new(None, create_defaults, &users, &roles, Arc::new(NoopAuditor)).unwrap();
        Managers { users, roles, groups }
    }

    #[test]
    fn test_default_groups() {
        let m = managers(true);
        assert_eq!(m.groups.user_group_count(), 3);
        assert!(m
            .groups
            .is_user_assigned_to_user_group(USERGROUP_ADMINISTRATORS_ID, USER_ADMINISTRATOR_ID));
        assert!(m
            .groups
            .is_role_assigned_to_user_group(USERGROUP_ADMINISTRATORS_ID, ROLE_ADMINISTRATOR_ID));
        assert!(m
            .groups
            .is_role_assigned_to_user_group(USERGROUP_USERS_ID, ROLE_USER_ID));

        let guests = m.groups.get_user_group_of_id(USERGROUP_GUESTS_ID).unwrap();
        assert!(guests.contains_user_id(USER_GUEST_ID));
        assert!(!guests.has_roles());

        assert!(m.users.contains_user_with_id(USER_GUEST_ID));
        assert!(m.roles.contains_role_with_id(ROLE_USER_ID));
    }

    #[test]
    fn test_defaults_skip_missing_members() {
        let users = UserManager::new(
            None,
            false,
            Arc::new(PasswordHashCreatorManager::new()),
            Arc::new(NoopAuditor),
        )
        .unwrap();
        let roles = RoleManager::new(None, true, Arc::new(NoopAuditor)).unwrap();
        let groups = UserGroupManager::new(None, true, &users, &roles, Arc::new(NoopAuditor)).unwrap();

        let admins = groups.get_user_group_of_id(USERGROUP_ADMINISTRATORS_ID).unwrap();
        assert!(!admins.has_users());
        assert!(admins.contains_role_id(ROLE_ADMINISTRATOR_ID));
    }

    #[test]
    fn test_create_rename_delete() {
        let m = managers(false);
        let group = m.groups.create_new_user_group("Editors").unwrap();
        assert!(m.groups.contains_user_group_with_id(group.id()));

        assert!(m.groups.rename_user_group(group.id(), "Writers").is_changed());
        assert!(m.groups.rename_user_group(group.id(), "Writers").is_unchanged());
        assert!(m.groups.rename_user_group("missing", "x").is_unchanged());
        assert_eq!(
            m.groups.get_user_group_of_id(group.id()).unwrap().name(),
            "Writers"
        );

        assert!(m.groups.delete_user_group(group.id()).is_changed());
        assert!(m.groups.delete_user_group(group.id()).is_unchanged());
    }

    #[test]
    fn test_predefined_id_in_use() {
        let m = managers(true);
        assert!(matches!(
            m.groups.create_predefined_user_group(USERGROUP_USERS_ID, "Dup"),
            Err(Error::IdInUse { kind: "user group", .. })
        ));
        assert_eq!(m.groups.user_group_count(), 3);
    }

    #[test]
    fn test_user_assignments() {
        let m = managers(true);
        assert!(m
            .groups
            .assign_user_to_user_group(USERGROUP_USERS_ID, USER_ADMINISTRATOR_ID)
            .is_changed());
        assert!(m
            .groups
            .assign_user_to_user_group(USERGROUP_USERS_ID, USER_ADMINISTRATOR_ID)
            .is_unchanged());
        assert!(m
            .groups
            .assign_user_to_user_group("missing", USER_ADMINISTRATOR_ID)
            .is_unchanged());

        assert_eq!(
            m.groups.get_all_user_group_ids_with_assigned_user(USER_ADMINISTRATOR_ID),
            vec![USERGROUP_ADMINISTRATORS_ID.to_string(), USERGROUP_USERS_ID.to_string()]
        );

        assert!(m
            .groups
            .unassign_user_from_all_user_groups(USER_ADMINISTRATOR_ID)
            .is_changed());
        assert!(m
            .groups
            .get_all_user_groups_with_assigned_user(USER_ADMINISTRATOR_ID)
            .is_empty());
        assert!(m
            .groups
            .unassign_user_from_all_user_groups(USER_ADMINISTRATOR_ID)
            .is_unchanged());
    }

    #[test]
    fn test_role_assignments() {
        let m = managers(true);
        assert!(m
            .groups
            .assign_role_to_user_group(USERGROUP_GUESTS_ID, ROLE_USER_ID)
            .is_changed());
        assert_eq!(m.groups.get_all_user_groups_with_assigned_role(ROLE_USER_ID).len(), 2);

        assert!(m
            .groups
            .unassign_role_from_user_group(USERGROUP_GUESTS_ID, ROLE_USER_ID)
            .is_changed());
        assert!(m.groups.unassign_role_from_all_user_groups(ROLE_USER_ID).is_changed());
        assert!(m
            .groups
            .get_all_user_group_ids_with_assigned_role(ROLE_USER_ID)
            .is_empty());
    }

    #[test]
    fn test_remove_dangling_references() {
        let m = managers(true);
        let _ = m.groups.assign_user_to_user_group(USERGROUP_USERS_ID, "ghost");
        let _ = m.groups.assign_role_to_user_group(USERGROUP_USERS_ID, "phantom");

        let user_exists = |id: &str| m.users.contains_user_with_id(id);
        let role_exists = |id: &str| m.roles.contains_role_with_id(id);
        assert!(m
            .groups
            .remove_dangling_references(&user_exists, &role_exists)
            .is_changed());
        assert!(m
            .groups
            .remove_dangling_references(&user_exists, &role_exists)
            .is_unchanged());

        let users = m.groups.get_user_group_of_id(USERGROUP_USERS_ID).unwrap();
        assert!(!users.contains_user_id("ghost"));
        assert!(!users.contains_role_id("phantom"));
        assert!(users.contains_user_id(USER_USER_ID));
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("usergroups.xml");
        let m = managers(true);
        {
            let groups =
                UserGroupManager::new(Some(file.clone()), true, &m.users, &m.roles, Arc::new(NoopAuditor))
                    .unwrap();
            let _ = groups.assign_role_to_user_group(USERGROUP_GUESTS_ID, ROLE_USER_ID);
        }

        let groups =
            UserGroupManager::new(Some(file), true, &m.users, &m.roles, Arc::new(NoopAuditor)).unwrap();
        assert_eq!(groups.user_group_count(), 3);
        assert!(groups.is_role_assigned_to_user_group(USERGROUP_GUESTS_ID, ROLE_USER_ID));
    }
}
