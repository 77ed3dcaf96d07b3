//! User management with XML persistence.

use crate::{
    audit::{Auditor, ObjectType},
    change::Change,
    dao::{DaoData, XmlDao, DEFAULT_AUTO_SAVE_ENABLED},
    defaults::*,
    error::{require_text, Error, Result},
    macros::impl_dao_controls,
    password::{PasswordHash, PasswordHashCreatorManager},
    user::{User, UserData},
    xml::{XmlConverter, XmlDocument, XmlElement},
};
use log::{error, info, warn};
use std::{collections::HashMap, path::PathBuf, sync::Arc};

const ELEMENT_ROOT: &str = "users";
const ELEMENT_USER: &str = "user";

struct UserStore {
    users: HashMap<String, User>,
    create_defaults: bool,
    password_manager: Arc<PasswordHashCreatorManager>,
}

impl UserStore {
    fn add(&mut self, user: User) -> Result<()> {
        if self.users.contains_key(user.id()) {
            return Err(Error::id_in_use("user", user.id()));
        }
        self.users.insert(user.id().to_string(), user);
        Ok(())
    }

    fn find(&self, predicate: impl Fn(&User) -> bool) -> Option<&User> {
        self.users.values().find(|u| predicate(*u))
    }

    fn filtered(&self, predicate: impl Fn(&User) -> bool) -> Vec<User> {
        self.users.values().filter(|u| predicate(*u)).cloned().collect()
    }
}

impl DaoData for UserStore {
    fn on_init(&mut self) -> Change {
        if !self.create_defaults {
            return Change::Unchanged;
        }

        let defaults = [
            (
                USER_ADMINISTRATOR_ID,
                USER_ADMINISTRATOR_LOGIN,
                USER_ADMINISTRATOR_EMAIL,
                USER_ADMINISTRATOR_PASSWORD,
                USER_ADMINISTRATOR_NAME,
            ),
            (USER_USER_ID, USER_USER_LOGIN, USER_USER_EMAIL, USER_USER_PASSWORD, USER_USER_NAME),
            (USER_GUEST_ID, USER_GUEST_LOGIN, USER_GUEST_EMAIL, USER_GUEST_PASSWORD, USER_GUEST_NAME),
        ];
        let mut change = Change::Unchanged;
        for (id, login, email, password, name) in defaults {
            match self.password_manager.create_user_default_password_hash(password) {
                Ok(hash) => {
                    let data = UserData::new(login, email).with_first_name(name);
                    self.users.insert(id.to_string(), User::with_id(id, data, hash));
                    change = Change::Changed;
                }
                Err(e) => error!("Failed to create default user '{id}': {e}"),
            }
        }
        change
    }

    fn on_read(&mut self, doc: &XmlDocument) -> Result<Change> {
        for element in doc.document_element().child_elements(ELEMENT_USER) {
            self.add(User::from_xml_element(element)?)?;
        }
        Ok(Change::Unchanged)
    }

    fn create_write_data(&self) -> XmlDocument {
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by(|a, b| a.id().cmp(b.id()));

        let mut root = XmlElement::new(ELEMENT_ROOT);
        for user in users {
            root.append_child(user.to_xml_element(ELEMENT_USER));
        }
        XmlDocument::new(root)
    }
}

enum AddOutcome {
    Added,
    IdInUse,
    LoginNameInUse,
    EmailAddressInUse,
}

/// Manages all users.
pub struct UserManager {
    dao: XmlDao<UserStore>,
    password_manager: Arc<PasswordHashCreatorManager>,
    auditor: Arc<dyn Auditor>,
}

impl UserManager {
    /// Create a user manager bound to `file`. When the file does not exist
    /// yet and `create_defaults` is set, the default users are created.
    pub fn new(
        file: Option<PathBuf>,
        create_defaults: bool,
        password_manager: Arc<PasswordHashCreatorManager>,
        auditor: Arc<dyn Auditor>,
    ) -> Result<Self> {
        Self::with_auto_save(
            file,
            create_defaults,
            DEFAULT_AUTO_SAVE_ENABLED,
            password_manager,
            auditor,
        )
    }

    /// Like [`new`](Self::new) with an explicit auto-save setting, which
    /// also applies to the default users.
    pub fn with_auto_save(
        file: Option<PathBuf>,
        create_defaults: bool,
        auto_save: bool,
        password_manager: Arc<PasswordHashCreatorManager>,
        auditor: Arc<dyn Auditor>,
    ) -> Result<Self> {
        let store = UserStore {
            users: HashMap::new(),
            create_defaults,
            password_manager: password_manager.clone(),
        };
        Ok(Self {
            dao: XmlDao::with_auto_save(file, store, auto_save)?,
            password_manager,
            auditor,
        })
    }

    /// The password hash creators used for this manager's users.
    pub fn password_manager(&self) -> &Arc<PasswordHashCreatorManager> {
        &self.password_manager
    }

    /// Create a new user with a generated ID.
    ///
    /// Returns `Ok(None)` if the login name or the email address is already
    /// used by another user. Fails with [`Error::PasswordConstraintViolation`]
    /// if the password does not satisfy the password constraints.
    pub fn create_new_user(&self, data: UserData, plain_text_password: &str) -> Result<Option<User>> {
        require_text(&data.login_name, "login_name")?;
        let hash = self.create_checked_password_hash(&data.login_name, plain_text_password)?;
        self.add_user(User::new(data, hash), false)
    }

    /// Create a new user with a predefined ID.
    ///
    /// Fails with [`Error::IdInUse`] if the ID is taken and returns `Ok(None)`
    /// if the login name or the email address is already used.
    pub fn create_predefined_user(
        &self,
        id: &str,
        data: UserData,
        plain_text_password: &str,
    ) -> Result<Option<User>> {
        require_text(id, "id")?;
        require_text(&data.login_name, "login_name")?;
        let hash = self.create_checked_password_hash(&data.login_name, plain_text_password)?;
        self.add_user(User::with_id(id, data, hash), true)
    }

    fn create_checked_password_hash(
        &self,
        login_name: &str,
        plain_text_password: &str,
    ) -> Result<PasswordHash> {
        if let Err(e) = self.password_manager.check_password_constraints(plain_text_password) {
            self.auditor.on_create_failure(
                ObjectType::USER,
                &["password-constraints-violated", login_name],
            );
            return Err(e);
        }
        self.password_manager
            .create_user_default_password_hash(plain_text_password)
    }

    fn add_user(&self, user: User, predefined: bool) -> Result<Option<User>> {
        let mut outcome = AddOutcome::Added;
        let _ = self.dao.modify(|store| {
            outcome = if store.users.contains_key(user.id()) {
                AddOutcome::IdInUse
            } else if store.find(|u| u.login_name() == user.login_name()).is_some() {
                AddOutcome::LoginNameInUse
            } else if !user.email_address().is_empty()
                && store.find(|u| u.email_address() == user.email_address()).is_some()
            {
                AddOutcome::EmailAddressInUse
            } else {
                store.users.insert(user.id().to_string(), user.clone());
                return Change::Changed;
            };
            Change::Unchanged
        });

        match outcome {
            AddOutcome::Added => {}
            AddOutcome::IdInUse => {
                self.auditor
                    .on_create_failure(ObjectType::USER, &[user.id(), "id-already-in-use"]);
                return Err(Error::id_in_use("user", user.id()));
            }
            AddOutcome::LoginNameInUse => {
                self.auditor.on_create_failure(
                    ObjectType::USER,
                    &["login-name-already-in-use", user.login_name()],
                );
                return Ok(None);
            }
            AddOutcome::EmailAddressInUse => {
                self.auditor.on_create_failure(
                    ObjectType::USER,
                    &["email-address-already-in-use", user.email_address()],
                );
                return Ok(None);
            }
        }

        info!("Created user '{}' ({})", user.login_name(), user.id());
        let disabled = user.is_disabled().to_string();
        let mut args = vec![user.id()];
        if predefined {
            args.push("predefined-user");
        }
        args.extend([user.login_name(), user.email_address(), disabled.as_str()]);
        self.auditor.on_create_success(ObjectType::USER, &args);
        Ok(Some(user))
    }

    /// Get a snapshot of the user with the given ID.
    pub fn get_user_of_id(&self, user_id: &str) -> Option<User> {
        self.dao.read(|store| store.users.get(user_id).cloned())
    }

    /// Get a snapshot of the user with the given login name.
    pub fn get_user_of_login_name(&self, login_name: &str) -> Option<User> {
        if login_name.is_empty() {
            return None;
        }
        self.dao
            .read(|store| store.find(|u| u.login_name() == login_name).cloned())
    }

    /// Get a snapshot of the user with the given email address.
    pub fn get_user_of_email_address(&self, email_address: &str) -> Option<User> {
        if email_address.is_empty() {
            return None;
        }
        self.dao
            .read(|store| store.find(|u| u.email_address() == email_address).cloned())
    }

    /// Get snapshots of all users, including deleted ones.
    pub fn get_all_users(&self) -> Vec<User> {
        self.dao.read(|store| store.filtered(|_| true))
    }

    /// All users that are neither deleted nor disabled.
    pub fn get_all_active_users(&self) -> Vec<User> {
        self.dao.read(|store| store.filtered(User::is_active))
    }

    /// All disabled users that are not deleted.
    pub fn get_all_disabled_users(&self) -> Vec<User> {
        self.dao
            .read(|store| store.filtered(|u| !u.is_deleted() && u.is_disabled()))
    }

    /// All users that are not deleted.
    pub fn get_all_not_deleted_users(&self) -> Vec<User> {
        self.dao.read(|store| store.filtered(|u| !u.is_deleted()))
    }

    /// All deleted users.
    pub fn get_all_deleted_users(&self) -> Vec<User> {
        self.dao.read(|store| store.filtered(User::is_deleted))
    }

    /// Number of users, including deleted ones.
    pub fn user_count(&self) -> usize {
        self.dao.read(|store| store.users.len())
    }

    /// Whether a user with the given ID exists. Deleted users exist.
    pub fn contains_user_with_id(&self, user_id: &str) -> bool {
        self.dao.read(|store| store.users.contains_key(user_id))
    }

    /// Whether a user with the given ID exists and is not deleted.
    pub fn contains_not_deleted_user_with_id(&self, user_id: &str) -> bool {
        self.dao
            .read(|store| store.users.get(user_id).is_some_and(|u| !u.is_deleted()))
    }

    /// Whether every given ID resolves to a user. True for no IDs.
    pub fn contains_all_users_with_id<'a>(&self, user_ids: impl IntoIterator<Item = &'a str>) -> bool {
        self.dao
            .read(|store| user_ids.into_iter().all(|id| store.users.contains_key(id)))
    }

    // Returns None if the user does not exist
    fn modify_user(&self, user_id: &str, f: impl FnOnce(&mut User) -> Change) -> Option<Change> {
        let mut found = false;
        let change = self.dao.modify(|store| match store.users.get_mut(user_id) {
            Some(user) => {
                found = true;
                f(user)
            }
            None => Change::Unchanged,
        });
        found.then_some(change)
    }

    /// Replace the profile data of a user.
    pub fn set_user_data(&self, user_id: &str, data: UserData) -> Change {
        if data.login_name.trim().is_empty() {
            self.auditor
                .on_modify_failure(ObjectType::USER, "all", &[user_id, "empty-login-name"]);
            return Change::Unchanged;
        }

        let args = [
            user_id.to_string(),
            data.login_name.clone(),
            data.email_address.clone(),
            data.disabled.to_string(),
        ];
        let result = self.modify_user(user_id, |user| {
            let change = user.set_data(data);
            if change.is_changed() {
                user.update_last_modified();
            }
            change
        });

        match result {
            None => {
                self.auditor
                    .on_modify_failure(ObjectType::USER, "all", &[user_id, "no-such-user-id"]);
                Change::Unchanged
            }
            Some(change) => {
                if change.is_changed() {
                    let args: Vec<&str> = args.iter().map(String::as_str).collect();
                    self.auditor.on_modify_success(ObjectType::USER, "all", &args);
                }
                change
            }
        }
    }

    /// Set a new password for a user. A password violating the password
    /// constraints is rejected.
    pub fn set_user_password(&self, user_id: &str, new_plain_text_password: &str) -> Change {
        if !self.contains_user_with_id(user_id) {
            self.auditor
                .on_modify_failure(ObjectType::USER, "password", &[user_id, "no-such-user-id"]);
            return Change::Unchanged;
        }
        if let Err(e) = self
            .password_manager
            .check_password_constraints(new_plain_text_password)
        {
            warn!("Rejected new password of user {user_id}: {e}");
            self.auditor.on_modify_failure(
                ObjectType::USER,
                "password",
                &[user_id, "password-constraints-violated"],
            );
            return Change::Unchanged;
        }

        let hash = match self
            .password_manager
            .create_user_default_password_hash(new_plain_text_password)
        {
            Ok(hash) => hash,
            Err(e) => {
                error!("Failed to hash new password of user {user_id}: {e}");
                self.auditor
                    .on_modify_failure(ObjectType::USER, "password", &[user_id, "hash-failed"]);
                return Change::Unchanged;
            }
        };

        let result = self.modify_user(user_id, |user| {
            let change = user.set_password_hash(hash);
            if change.is_changed() {
                user.update_last_modified();
            }
            change
        });
        match result {
            None => {
                self.auditor
                    .on_modify_failure(ObjectType::USER, "password", &[user_id, "no-such-user-id"]);
                Change::Unchanged
            }
            Some(change) => {
                if change.is_changed() {
                    self.auditor.on_modify_success(ObjectType::USER, "password", &[user_id]);
                }
                change
            }
        }
    }

    /// Soft delete a user. The user stays resolvable by ID.
    pub fn delete_user(&self, user_id: &str) -> Change {
        match self.modify_user(user_id, |user| user.set_deleted(true)) {
            None => {
                self.auditor
                    .on_delete_failure(ObjectType::USER, &[user_id, "no-such-user-id"]);
                Change::Unchanged
            }
            Some(Change::Unchanged) => Change::Unchanged,
            Some(Change::Changed) => {
                info!("Deleted user {user_id}");
                self.auditor.on_delete_success(ObjectType::USER, &[user_id]);
                Change::Changed
            }
        }
    }

    /// Revert a soft delete.
    pub fn undelete_user(&self, user_id: &str) -> Change {
        match self.modify_user(user_id, |user| user.set_deleted(false)) {
            None => {
                self.auditor
                    .on_undelete_failure(ObjectType::USER, &[user_id, "no-such-user-id"]);
                Change::Unchanged
            }
            Some(Change::Unchanged) => Change::Unchanged,
            Some(Change::Changed) => {
                info!("Undeleted user {user_id}");
                self.auditor.on_undelete_success(ObjectType::USER, &[user_id]);
                Change::Changed
            }
        }
    }

    /// Disable a user.
    pub fn disable_user(&self, user_id: &str) -> Change {
        self.set_disabled(user_id, true, "disable")
    }

    /// Enable a disabled user.
    pub fn enable_user(&self, user_id: &str) -> Change {
        self.set_disabled(user_id, false, "enable")
    }

    fn set_disabled(&self, user_id: &str, disabled: bool, what: &str) -> Change {
        match self.modify_user(user_id, |user| user.set_disabled(disabled)) {
            None => {
                self.auditor
                    .on_modify_failure(ObjectType::USER, what, &[user_id, "no-such-user-id"]);
                Change::Unchanged
            }
            Some(change) => {
                if change.is_changed() {
                    self.auditor.on_modify_success(ObjectType::USER, what, &[user_id]);
                }
                change
            }
        }
    }

    /// Check a plain text password against the stored hash of a user.
    pub fn are_user_id_and_password_valid(&self, user_id: &str, plain_text_password: &str) -> bool {
        let Some(user) = self.get_user_of_id(user_id) else {
            return false;
        };
        match self
            .password_manager
            .verify(user.password_hash(), plain_text_password)
        {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Cannot verify password of user {user_id}: {e}");
                false
            }
        }
    }
}

impl_dao_controls!(UserManager);
