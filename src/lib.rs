//! # Access System
//!
//! This crate manages users, roles and user groups for an application, persists them as XML
//! files and records every change in an audit log.
//!
//! ## Features
//!
//! - Users with login name, email address, salted password hash and profile data
//! - Roles and user groups with custom attributes
//! - Role assignment through user group membership
//! - Soft deletion and disabling of users
//! - XML persistence with auto-save or explicit flushing
//! - Pluggable auditing with a size-capped audit log
//! - Login bookkeeping and edit locks
//! - Thread-safe implementation
//!
//! ## Quick Start
//!
//! ```rust
//! use access_system::{AccessManager, NoopAuditor, SecurityConfig, UserData};
//! use std::sync::Arc;
//!
//! // Keep everything in memory and seed the default objects
//! let config = SecurityConfig::default();
//! let access = AccessManager::new(&config, Arc::new(NoopAuditor))?;
//!
//! // Create a user and a group granting the "User" role
//! let user = access
//!     .create_new_user(UserData::new("jane", "jane@example.org"), "secret")?
//!     .expect("login name and email address are unused");
//! let group = access.create_new_user_group("Editors")?;
//! let _ = access.assign_user_to_user_group(group.id(), user.id());
//! let _ = access.assign_role_to_user_group(group.id(), "ruser");
//!
//! assert!(access.has_user_role(user.id(), "ruser"));
//! assert!(access.are_user_id_and_password_valid(user.id(), "secret"));
//! # Ok::<(), access_system::Error>(())
//! ```
//!
//! ## Logging
//!
//! All managers log through the `log` facade. With the `logger` feature enabled (the default)
//! an `env_logger` backend can be installed:
//!
//! ```rust
//! use access_system::init_logger;
//!
//! // Initialize logging (must be called early in program execution)
//! init_logger();
//!
//! // Configure log level through RUST_LOG environment variable:
//! // RUST_LOG=info,audit=info,access_system=debug
//! ```
//!
//! The `LoggingAuditor` writes audit events to the `audit` log target.

/// Initialize `env_logger` from `RUST_LOG`. Calling it again has no effect.
#[cfg(feature = "logger")]
pub fn init_logger() {
    let _ = env_logger::try_init();
}

pub mod access_manager;
pub mod audit;
pub mod audit_manager;
pub mod bulk_import;
pub mod change;
pub mod config;
pub mod dao;
pub mod defaults;
pub mod error;
pub mod id;
pub mod lock;
pub mod login;
pub mod macros;
pub mod password;
pub mod role;
pub mod role_manager;
pub mod user;
pub mod user_group;
pub mod user_group_manager;
pub mod user_manager;
pub mod xml;

#[cfg(test)]
mod property_tests;

// Re-export main types for convenience
pub use crate::{
    access_manager::AccessManager,
    audit::{
        AuditActionType, AuditFormat, AuditItem, AuditItemHandler, Auditor, CurrentUserIdProvider,
        ItemAuditor, LoggingAuditor, NoCurrentUser, NoopAuditor, ObjectType,
    },
    audit_manager::{AuditItemList, AuditManager},
    bulk_import::BulkImportResult,
    change::Change,
    config::{AuditConfig, PasswordConstraintsConfig, SecurityConfig},
    error::{Error, Result},
    id::HasId,
    lock::{LockInfo, LockManager, Locked},
    login::{LoggedInUserManager, LoginResult, LoginSession},
    password::{
        PasswordConstraint, PasswordConstraintList, PasswordHash, PasswordHashCreator,
        PasswordHashCreatorManager,
    },
    role::Role,
    role_manager::RoleManager,
    user::{User, UserData},
    user_group::UserGroup,
    user_group_manager::UserGroupManager,
    user_manager::UserManager,
};
