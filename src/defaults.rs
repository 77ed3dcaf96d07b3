//! Well-known IDs and the default objects seeded into empty managers.

/// The user ID recorded for actions without a logged-in user.
pub const GUEST_USER_ID: &str = "guest";

/// Object type name of users in audit entries.
pub const TYPE_USER: &str = "user";
/// Object type name of roles in audit entries.
pub const TYPE_ROLE: &str = "role";
/// Object type name of user groups in audit entries.
pub const TYPE_USER_GROUP: &str = "usergroup";

/// ID of the administrator role.
pub const ROLE_ADMINISTRATOR_ID: &str = "radmin";
/// Name of the administrator role.
pub const ROLE_ADMINISTRATOR_NAME: &str = "Administrator";
/// ID of the regular user role.
pub const ROLE_USER_ID: &str = "ruser";
/// Name of the regular user role.
pub const ROLE_USER_NAME: &str = "User";

/// ID of the administrator user.
pub const USER_ADMINISTRATOR_ID: &str = "admin";
/// Login name of the administrator user.
pub const USER_ADMINISTRATOR_LOGIN: &str = "admin";
/// Email address of the administrator user.
pub const USER_ADMINISTRATOR_EMAIL: &str = "admin@localhost";
/// Initial password of the administrator user.
pub const USER_ADMINISTRATOR_PASSWORD: &str = "password";
/// First name of the administrator user.
pub const USER_ADMINISTRATOR_NAME: &str = "Administrator";

/// ID of the regular user.
pub const USER_USER_ID: &str = "user";
/// Login name of the regular user.
pub const USER_USER_LOGIN: &str = "user";
/// Email address of the regular user.
pub const USER_USER_EMAIL: &str = "user@localhost";
/// Initial password of the regular user.
pub const USER_USER_PASSWORD: &str = "user";
/// First name of the regular user.
pub const USER_USER_NAME: &str = "User";

/// ID of the guest user.
pub const USER_GUEST_ID: &str = GUEST_USER_ID;
/// Login name of the guest user.
pub const USER_GUEST_LOGIN: &str = "guest";
/// Email address of the guest user.
pub const USER_GUEST_EMAIL: &str = "guest@localhost";
/// Initial password of the guest user.
pub const USER_GUEST_PASSWORD: &str = "guest";
/// First name of the guest user.
pub const USER_GUEST_NAME: &str = "Guest";

/// ID of the administrators user group.
pub const USERGROUP_ADMINISTRATORS_ID: &str = "ugadmin";
/// Name of the administrators user group.
pub const USERGROUP_ADMINISTRATORS_NAME: &str = "Administrators";
/// ID of the users user group.
pub const USERGROUP_USERS_ID: &str = "ugusers";
/// Name of the users user group.
pub const USERGROUP_USERS_NAME: &str = "Users";
/// ID of the guests user group.
pub const USERGROUP_GUESTS_ID: &str = "ugguest";
/// Name of the guests user group.
pub const USERGROUP_GUESTS_NAME: &str = "Guests";
