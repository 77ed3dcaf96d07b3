//! The access manager ties users, roles and user groups together.

use crate::{
    audit::Auditor,
    change::Change,
    config::SecurityConfig,
    error::Result,
    password::PasswordHashCreatorManager,
    role::Role,
    role_manager::RoleManager,
    user::{User, UserData},
    user_group::UserGroup,
    user_group_manager::UserGroupManager,
    user_manager::UserManager,
};
use log::{info, warn};
use std::{collections::BTreeSet, sync::Arc};

/// Façade over the user, role and user group managers.
///
/// Deleting a user or a role also removes it from all user groups. The two
/// steps are not atomic; [`repair_dangling_references`](Self::repair_dangling_references)
/// cleans up references left behind by an interrupted cascade.
pub struct AccessManager {
    user_manager: UserManager,
    role_manager: RoleManager,
    user_group_manager: UserGroupManager,
}

impl AccessManager {
    /// Create all managers as described by `config`.
    pub fn new(config: &SecurityConfig, auditor: Arc<dyn Auditor>) -> Result<Self> {
        let password_manager = PasswordHashCreatorManager::new();
        password_manager.set_default_algorithm(&config.password_hash_algorithm)?;
        password_manager.set_password_constraints(config.password_constraints.to_constraint_list());
        Self::with_password_manager(config, Arc::new(password_manager), auditor)
    }

    /// Create all managers using an existing set of password hash creators.
    /// The algorithm and password constraints of `config` are not applied to
    /// `password_manager`.
    pub fn with_password_manager(
        config: &SecurityConfig,
        password_manager: Arc<PasswordHashCreatorManager>,
        auditor: Arc<dyn Auditor>,
    ) -> Result<Self> {
        config.validate()?;

        let user_manager = UserManager::with_auto_save(
            config.users_path(),
            config.create_defaults,
            config.auto_save,
            password_manager,
            auditor.clone(),
        )?;
        let role_manager = RoleManager::with_auto_save(
            config.roles_path(),
            config.create_defaults,
            config.auto_save,
            auditor.clone(),
        )?;
        let user_group_manager = UserGroupManager::with_auto_save(
            config.user_groups_path(),
            config.create_defaults,
            config.auto_save,
            &user_manager,
            &role_manager,
            auditor,
        )?;

        info!(
            "Access manager ready: {} users, {} roles, {} user groups",
            user_manager.user_count(),
            role_manager.role_count(),
            user_group_manager.user_group_count()
        );
        Ok(Self {
            user_manager,
            role_manager,
            user_group_manager,
        })
    }

    /// The user manager.
    pub fn user_manager(&self) -> &UserManager {
        &self.user_manager
    }

    /// The role manager.
    pub fn role_manager(&self) -> &RoleManager {
        &self.role_manager
    }

    /// The user group manager.
    pub fn user_group_manager(&self) -> &UserGroupManager {
        &self.user_group_manager
    }

    // User API

    /// Create a new user. See [`UserManager::create_new_user`].
    pub fn create_new_user(&self, data: UserData, plain_text_password: &str) -> Result<Option<User>> {
        self.user_manager.create_new_user(data, plain_text_password)
    }

    /// Create a new user with a predefined ID.
    pub fn create_predefined_user(
        &self,
        id: &str,
        data: UserData,
        plain_text_password: &str,
    ) -> Result<Option<User>> {
        self.user_manager
            .create_predefined_user(id, data, plain_text_password)
    }

    /// Soft delete a user and remove it from all user groups.
    pub fn delete_user(&self, user_id: &str) -> Change {
        if self.user_manager.delete_user(user_id).is_unchanged() {
            return Change::Unchanged;
        }
        let _ = self.user_group_manager.unassign_user_from_all_user_groups(user_id);
        Change::Changed
    }

    /// Revert a soft delete. Group memberships are not restored.
    pub fn undelete_user(&self, user_id: &str) -> Change {
        self.user_manager.undelete_user(user_id)
    }

    /// Disable a user.
    pub fn disable_user(&self, user_id: &str) -> Change {
        self.user_manager.disable_user(user_id)
    }

    /// Enable a user.
    pub fn enable_user(&self, user_id: &str) -> Change {
        self.user_manager.enable_user(user_id)
    }

    /// Whether a user with the given ID exists.
    pub fn contains_user_with_id(&self, user_id: &str) -> bool {
        self.user_manager.contains_user_with_id(user_id)
    }

    /// Get the user with the given ID.
    pub fn get_user_of_id(&self, user_id: &str) -> Option<User> {
        self.user_manager.get_user_of_id(user_id)
    }

    /// Get the user with the given login name.
    pub fn get_user_of_login_name(&self, login_name: &str) -> Option<User> {
        self.user_manager.get_user_of_login_name(login_name)
    }

    /// Get the user with the given email address.
    pub fn get_user_of_email_address(&self, email_address: &str) -> Option<User> {
        self.user_manager.get_user_of_email_address(email_address)
    }

    /// Get all users.
    pub fn get_all_users(&self) -> Vec<User> {
        self.user_manager.get_all_users()
    }

    /// Replace the profile data of a user.
    pub fn set_user_data(&self, user_id: &str, data: UserData) -> Change {
        self.user_manager.set_user_data(user_id, data)
    }

    /// Set a new password for a user.
    pub fn set_user_password(&self, user_id: &str, new_plain_text_password: &str) -> Change {
        self.user_manager
            .set_user_password(user_id, new_plain_text_password)
    }

    /// Check the credentials of a user given by ID.
    pub fn are_user_id_and_password_valid(&self, user_id: &str, plain_text_password: &str) -> bool {
        self.user_manager
            .are_user_id_and_password_valid(user_id, plain_text_password)
    }

    /// Check the credentials of a user whose login name is an email address.
    pub fn are_user_email_and_password_valid(&self, email_address: &str, plain_text_password: &str) -> bool {
        match self.user_manager.get_user_of_login_name(email_address) {
            Some(user) => self
                .user_manager
                .are_user_id_and_password_valid(user.id(), plain_text_password),
            None => false,
        }
    }

    // User group API

    /// Create a new user group.
    pub fn create_new_user_group(&self, name: &str) -> Result<UserGroup> {
        self.user_group_manager.create_new_user_group(name)
    }

    /// Create a new user group with a predefined ID.
    pub fn create_predefined_user_group(&self, id: &str, name: &str) -> Result<UserGroup> {
        self.user_group_manager.create_predefined_user_group(id, name)
    }

    /// Delete a user group.
    pub fn delete_user_group(&self, user_group_id: &str) -> Change {
        self.user_group_manager.delete_user_group(user_group_id)
    }

    /// Whether a user group with the given ID exists.
    pub fn contains_user_group_with_id(&self, user_group_id: &str) -> bool {
        self.user_group_manager
            .contains_user_group_with_id(user_group_id)
    }

    /// Whether every given ID resolves to a user group.
    pub fn contains_all_user_groups_with_id<'a>(
        &self,
        user_group_ids: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        self.user_group_manager
            .contains_all_user_groups_with_id(user_group_ids)
    }

    /// Get the user group with the given ID.
    pub fn get_user_group_of_id(&self, user_group_id: &str) -> Option<UserGroup> {
        self.user_group_manager.get_user_group_of_id(user_group_id)
    }

    /// Get all user groups.
    pub fn get_all_user_groups(&self) -> Vec<UserGroup> {
        self.user_group_manager.get_all_user_groups()
    }

    /// Rename a user group.
    pub fn rename_user_group(&self, user_group_id: &str, new_name: &str) -> Change {
        self.user_group_manager
            .rename_user_group(user_group_id, new_name)
    }

    /// Assign a user to a user group.
    pub fn assign_user_to_user_group(&self, user_group_id: &str, user_id: &str) -> Change {
        self.user_group_manager
            .assign_user_to_user_group(user_group_id, user_id)
    }

    /// Remove a user from a user group.
    pub fn unassign_user_from_user_group(&self, user_group_id: &str, user_id: &str) -> Change {
        self.user_group_manager
            .unassign_user_from_user_group(user_group_id, user_id)
    }

    /// Remove a user from all user groups.
    pub fn unassign_user_from_all_user_groups(&self, user_id: &str) -> Change {
        self.user_group_manager
            .unassign_user_from_all_user_groups(user_id)
    }

    /// Whether the user is assigned to the user group.
    pub fn is_user_assigned_to_user_group(&self, user_group_id: &str, user_id: &str) -> bool {
        self.user_group_manager
            .is_user_assigned_to_user_group(user_group_id, user_id)
    }

    /// All user groups the user is assigned to.
    pub fn get_all_user_groups_with_assigned_user(&self, user_id: &str) -> Vec<UserGroup> {
        self.user_group_manager
            .get_all_user_groups_with_assigned_user(user_id)
    }

    /// IDs of all user groups the user is assigned to.
    pub fn get_all_user_group_ids_with_assigned_user(&self, user_id: &str) -> Vec<String> {
        self.user_group_manager
            .get_all_user_group_ids_with_assigned_user(user_id)
    }

    /// Assign a role to a user group.
    pub fn assign_role_to_user_group(&self, user_group_id: &str, role_id: &str) -> Change {
        self.user_group_manager
            .assign_role_to_user_group(user_group_id, role_id)
    }

    /// Remove a role from a user group.
    pub fn unassign_role_from_user_group(&self, user_group_id: &str, role_id: &str) -> Change {
        self.user_group_manager
            .unassign_role_from_user_group(user_group_id, role_id)
    }

    /// Remove a role from all user groups.
    pub fn unassign_role_from_all_user_groups(&self, role_id: &str) -> Change {
        self.user_group_manager
            .unassign_role_from_all_user_groups(role_id)
    }

    /// All user groups the role is assigned to.
    pub fn get_all_user_groups_with_assigned_role(&self, role_id: &str) -> Vec<UserGroup> {
        self.user_group_manager
            .get_all_user_groups_with_assigned_role(role_id)
    }

    /// IDs of all user groups the role is assigned to.
    pub fn get_all_user_group_ids_with_assigned_role(&self, role_id: &str) -> Vec<String> {
        self.user_group_manager
            .get_all_user_group_ids_with_assigned_role(role_id)
    }

    // Role API

    /// Create a new role.
    pub fn create_new_role(&self, name: &str) -> Result<Role> {
        self.role_manager.create_new_role(name)
    }

    /// Create a new role with a predefined ID.
    pub fn create_predefined_role(&self, id: &str, name: &str) -> Result<Role> {
        self.role_manager.create_predefined_role(id, name)
    }

    /// Delete a role and remove it from all user groups.
    pub fn delete_role(&self, role_id: &str) -> Change {
        if self.role_manager.delete_role(role_id).is_unchanged() {
            return Change::Unchanged;
        }
        let _ = self.user_group_manager.unassign_role_from_all_user_groups(role_id);
        Change::Changed
    }

    /// Whether a role with the given ID exists.
    pub fn contains_role_with_id(&self, role_id: &str) -> bool {
        self.role_manager.contains_role_with_id(role_id)
    }

    /// Whether every given ID resolves to a role.
    pub fn contains_all_roles_with_id<'a>(&self, role_ids: impl IntoIterator<Item = &'a str>) -> bool {
        self.role_manager.contains_all_roles_with_id(role_ids)
    }

    /// Get the role with the given ID.
    pub fn get_role_of_id(&self, role_id: &str) -> Option<Role> {
        self.role_manager.get_role_of_id(role_id)
    }

    /// Get all roles.
    pub fn get_all_roles(&self) -> Vec<Role> {
        self.role_manager.get_all_roles()
    }

    /// Rename a role.
    pub fn rename_role(&self, role_id: &str, new_name: &str) -> Change {
        self.role_manager.rename_role(role_id, new_name)
    }

    // Combined queries

    /// Whether any user group of the user grants the role.
    pub fn has_user_role(&self, user_id: &str, role_id: &str) -> bool {
        self.user_group_manager
            .get_all_user_groups_with_assigned_user(user_id)
            .iter()
            .any(|group| group.contains_role_id(role_id))
    }

    /// IDs of all roles granted to the user by its user groups.
    pub fn get_all_user_role_ids(&self, user_id: &str) -> BTreeSet<String> {
        self.user_group_manager
            .get_all_user_groups_with_assigned_user(user_id)
            .into_iter()
            .flat_map(|group| group.role_ids().clone())
            .collect()
    }

    /// All roles granted to the user. Role IDs that do not resolve are
    /// skipped.
    pub fn get_all_user_roles(&self, user_id: &str) -> Vec<Role> {
        self.get_all_user_role_ids(user_id)
            .into_iter()
            .filter_map(|role_id| {
                let role = self.role_manager.get_role_of_id(&role_id);
                if role.is_none() {
                    warn!("Failed to resolve role with ID '{role_id}'");
                }
                role
            })
            .collect()
    }

    /// Remove user and role references from user groups that no longer
    /// resolve. Deleted users count as unresolved. Running it again has no
    /// effect.
    pub fn repair_dangling_references(&self) -> Change {
        let user_exists = |id: &str| self.user_manager.contains_not_deleted_user_with_id(id);
        let role_exists = |id: &str| self.role_manager.contains_role_with_id(id);
        self.user_group_manager
            .remove_dangling_references(&user_exists, &role_exists)
    }

    /// Write all managers with pending changes.
    pub fn write_to_file_on_pending_changes(&self) -> Result<()> {
        self.user_manager.write_to_file_on_pending_changes()?;
        self.role_manager.write_to_file_on_pending_changes()?;
        self.user_group_manager.write_to_file_on_pending_changes()
    }

    /// Whether any manager has changes that are not yet written.
    pub fn has_pending_changes(&self) -> bool {
        self.user_manager.has_pending_changes()
            || self.role_manager.has_pending_changes()
            || self.user_group_manager.has_pending_changes()
    }
}
