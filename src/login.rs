//! Login bookkeeping.
//!
//! A [`LoginSession`] stands for one client session and holds at most one
//! user. The [`LoggedInUserManager`] makes sure a user is logged in through
//! at most one session at a time.

use crate::{
    access_manager::AccessManager,
    audit::{Auditor, CurrentUserIdProvider},
    change::Change,
    id::new_id,
    user::User,
};
use log::info;
use parking_lot::RwLock;
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

/// Outcome of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum LoginResult {
    /// The user is now logged in.
    Success,
    /// No user with the given login name exists.
    UserNotExisting,
    /// The user is deleted.
    UserIsDeleted,
    /// The user is disabled.
    UserIsDisabled,
    /// The password does not match.
    InvalidPassword,
    /// The user is already logged in through another session.
    UserAlreadyLoggedIn,
    /// The session already belongs to another user.
    SessionAlreadyHasUser,
}

impl LoginResult {
    /// Whether the login succeeded.
    pub fn is_success(self) -> bool {
        self == LoginResult::Success
    }

    /// Whether the login failed.
    pub fn is_failure(self) -> bool {
        !self.is_success()
    }

    /// Stable identifier, used in audit entries.
    pub fn id(self) -> &'static str {
        match self {
            LoginResult::Success => "success",
            LoginResult::UserNotExisting => "user-not-existing",
            LoginResult::UserIsDeleted => "user-is-deleted",
            LoginResult::UserIsDisabled => "user-is-disabled",
            LoginResult::InvalidPassword => "invalid-password",
            LoginResult::UserAlreadyLoggedIn => "user-already-logged-in",
            LoginResult::SessionAlreadyHasUser => "session-already-has-user",
        }
    }
}

impl fmt::Display for LoginResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A client session that may have a logged-in user.
#[derive(Debug)]
pub struct LoginSession {
    id: String,
    user_id: RwLock<Option<String>>,
}

impl LoginSession {
    /// Create a session without a user.
    pub fn new() -> Self {
        Self {
            id: new_id(),
            user_id: RwLock::new(None),
        }
    }

    /// The session ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The ID of the user logged in through this session.
    pub fn user_id(&self) -> Option<String> {
        self.user_id.read().clone()
    }

    /// Whether a user is logged in through this session.
    pub fn has_user(&self) -> bool {
        self.user_id.read().is_some()
    }

    fn set_user_id(&self, user_id: &str) -> Change {
        let mut current = self.user_id.write();
        if current.is_some() {
            return Change::Unchanged;
        }
        *current = Some(user_id.to_string());
        Change::Changed
    }

    fn reset_user_id(&self) {
        *self.user_id.write() = None;
    }
}

impl Default for LoginSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CurrentUserIdProvider for LoginSession {
    fn current_user_id(&self) -> Option<String> {
        self.user_id()
    }
}

/// Tracks which users are logged in and through which session.
pub struct LoggedInUserManager {
    access_manager: Arc<AccessManager>,
    auditor: Arc<dyn Auditor>,
    // Key: user ID
    logged_in_users: RwLock<HashMap<String, Arc<LoginSession>>>,
}

impl LoggedInUserManager {
    /// Create a manager checking credentials against `access_manager`.
    pub fn new(access_manager: Arc<AccessManager>, auditor: Arc<dyn Auditor>) -> Self {
        Self {
            access_manager,
            auditor,
            logged_in_users: RwLock::new(HashMap::new()),
        }
    }

    /// Log the user with the given login name into `session`.
    pub fn login_user(
        &self,
        session: &Arc<LoginSession>,
        login_name: &str,
        plain_text_password: &str,
    ) -> LoginResult {
        let result = self.try_login(session, login_name, plain_text_password);
        match result {
            LoginResult::Success => {
                self.auditor.on_execute_success("login", &[login_name]);
            }
            failure => {
                self.auditor
                    .on_execute_failure("login", &[login_name, failure.id()]);
            }
        }
        result
    }

    fn try_login(&self, session: &Arc<LoginSession>, login_name: &str, plain_text_password: &str) -> LoginResult {
        let Some(user) = self.access_manager.get_user_of_login_name(login_name) else {
            return LoginResult::UserNotExisting;
        };
        if user.is_deleted() {
            return LoginResult::UserIsDeleted;
        }
        if user.is_disabled() {
            return LoginResult::UserIsDisabled;
        }
        if !self
            .access_manager
            .are_user_id_and_password_valid(user.id(), plain_text_password)
        {
            return LoginResult::InvalidPassword;
        }

        let mut logged_in = self.logged_in_users.write();
        if logged_in.contains_key(user.id()) {
            return LoginResult::UserAlreadyLoggedIn;
        }
        if session.set_user_id(user.id()).is_unchanged() {
            return LoginResult::SessionAlreadyHasUser;
        }
        logged_in.insert(user.id().to_string(), Arc::clone(session));
        drop(logged_in);

        info!("Logged in user '{}' in session {}", user.id(), session.id());
        LoginResult::Success
    }

    /// Log out the given user and reset its session.
    pub fn logout_user(&self, user_id: &str) -> Change {
        let Some(session) = self.logged_in_users.write().remove(user_id) else {
            return Change::Unchanged;
        };
        session.reset_user_id();

        info!("Logged out user '{user_id}'");
        self.auditor.on_execute_success("logout", &[user_id]);
        Change::Changed
    }

    /// Log out the user of the given session.
    pub fn logout_session(&self, session: &LoginSession) -> Change {
        match session.user_id() {
            Some(user_id) => self.logout_user(&user_id),
            None => Change::Unchanged,
        }
    }

    /// Whether the user is logged in.
    pub fn is_user_logged_in(&self, user_id: &str) -> bool {
        self.logged_in_users.read().contains_key(user_id)
    }

    /// IDs of all logged-in users, sorted.
    pub fn get_all_logged_in_user_ids(&self) -> BTreeSet<String> {
        self.logged_in_users.read().keys().cloned().collect()
    }

    /// Number of logged-in users.
    pub fn get_logged_in_user_count(&self) -> usize {
        self.logged_in_users.read().len()
    }

    /// The user logged in through `session`.
    pub fn get_current_user(&self, session: &LoginSession) -> Option<User> {
        session
            .user_id()
            .and_then(|user_id| self.access_manager.get_user_of_id(&user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audit::NoopAuditor, config::SecurityConfig, defaults::*, password::Sha256PasswordHashCreator,
    };

    fn login_manager() -> LoggedInUserManager {
        let config = SecurityConfig {
            password_hash_algorithm: Sha256PasswordHashCreator::ALGORITHM.to_string(),
            ..Default::default()
        };
        let access = AccessManager::new(&config, Arc::new(NoopAuditor)).unwrap();
        LoggedInUserManager::new(Arc::new(access), Arc::new(NoopAuditor))
    }

    #[test]
    fn test_login_and_logout() {
        let manager = login_manager();
        let session = Arc::new(LoginSession::new());

        let result = manager.login_user(&session, USER_ADMINISTRATOR_LOGIN, USER_ADMINISTRATOR_PASSWORD);
        assert_eq!(result, LoginResult::Success);
        assert_eq!(session.current_user_id().as_deref(), Some(USER_ADMINISTRATOR_ID));
        assert!(manager.is_user_logged_in(USER_ADMINISTRATOR_ID));
        assert_eq!(manager.get_logged_in_user_count(), 1);
        assert_eq!(
            manager.get_current_user(&session).map(|u| u.id().to_string()),
            Some(USER_ADMINISTRATOR_ID.to_string())
        );

        assert!(manager.logout_session(&session).is_changed());
        assert!(!session.has_user());
        assert!(manager.logout_user(USER_ADMINISTRATOR_ID).is_unchanged());
        assert_eq!(manager.get_logged_in_user_count(), 0);
    }

    #[test]
    fn test_login_failures() {
        let manager = login_manager();
        let session = Arc::new(LoginSession::new());

        assert_eq!(manager.login_user(&session, "nobody", "x"), LoginResult::UserNotExisting);
        assert_eq!(
            manager.login_user(&session, USER_USER_LOGIN, "wrong"),
            LoginResult::InvalidPassword
        );
        assert!(!session.has_user());
    }

    #[test]
    fn test_one_session_per_user_and_user_per_session() {
        let manager = login_manager();
        let first = Arc::new(LoginSession::new());
        let second = Arc::new(LoginSession::new());

        assert!(manager.login_user(&first, USER_USER_LOGIN, USER_USER_PASSWORD).is_success());
        assert_eq!(
            manager.login_user(&second, USER_USER_LOGIN, USER_USER_PASSWORD),
            LoginResult::UserAlreadyLoggedIn
        );
        assert_eq!(
            manager.login_user(&first, USER_GUEST_LOGIN, USER_GUEST_PASSWORD),
            LoginResult::SessionAlreadyHasUser
        );
        assert!(!manager.is_user_logged_in(USER_GUEST_ID));
        assert_eq!(
            manager.get_all_logged_in_user_ids(),
            BTreeSet::from([USER_USER_ID.to_string()])
        );
    }

    #[test]
    fn test_result_ids() {
        assert_eq!(LoginResult::InvalidPassword.to_string(), "invalid-password");
        assert!(LoginResult::UserIsDisabled.is_failure());
    }
}
