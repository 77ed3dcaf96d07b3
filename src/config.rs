//! Configuration for the access system.

use crate::{
    audit::AuditFormat,
    audit_manager::{DEFAULT_AUDIT_AUTO_SAVE_ENABLED, DEFAULT_MAX_AUDIT_ITEMS},
    error::{Error, Result},
    password::{
        Argon2PasswordHashCreator, CharacterClass, MaxLengthConstraint, MinLengthConstraint,
        MustContainConstraint, PasswordConstraintList,
    },
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Maximum number of stored audit items.
    pub max_items: usize,
    /// How actions are rendered.
    pub format: AuditFormat,
    /// Directory of the daily audit files, relative to the base directory.
    pub directory: PathBuf,
    /// Whether each item is written immediately. Otherwise items are written
    /// when the audit manager is stopped, dropped or the day changes.
    pub auto_save: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_AUDIT_ITEMS,
            format: AuditFormat::Json,
            directory: PathBuf::from("audit"),
            auto_save: DEFAULT_AUDIT_AUTO_SAVE_ENABLED,
        }
    }
}

/// Rules for new passwords. Zero counts and missing lengths add no
/// constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PasswordConstraintsConfig {
    /// Minimum number of characters.
    pub min_length: Option<usize>,
    /// Maximum number of characters.
    pub max_length: Option<usize>,
    /// Minimum number of digits.
    pub min_digits: usize,
    /// Minimum number of upper case letters.
    pub min_upper_case: usize,
    /// Minimum number of lower case letters.
    pub min_lower_case: usize,
    /// Minimum number of characters that are neither letters nor digits.
    pub min_special: usize,
}

impl PasswordConstraintsConfig {
    /// Build the constraint list.
    pub fn to_constraint_list(&self) -> PasswordConstraintList {
        let mut list = PasswordConstraintList::new();
        if let Some(min) = self.min_length {
            list = list.with(MinLengthConstraint(min));
        }
        if let Some(max) = self.max_length {
            list = list.with(MaxLengthConstraint(max));
        }
        let classes = [
            (CharacterClass::Digit, self.min_digits),
            (CharacterClass::UpperCase, self.min_upper_case),
            (CharacterClass::LowerCase, self.min_lower_case),
            (CharacterClass::Special, self.min_special),
        ];
        for (class, min_count) in classes {
            if min_count > 0 {
                list = list.with(MustContainConstraint::new(class, min_count));
            }
        }
        list
    }
}

/// Configuration of the security managers.
///
/// Without a base directory all managers keep their state in memory only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Directory all other paths are resolved against.
    pub base_dir: Option<PathBuf>,
    /// File of the user manager.
    pub users_file: PathBuf,
    /// File of the role manager.
    pub roles_file: PathBuf,
    /// File of the user group manager.
    pub user_groups_file: PathBuf,
    /// Whether empty managers are seeded with default objects.
    pub create_defaults: bool,
    /// Whether each change is written immediately.
    pub auto_save: bool,
    /// Algorithm used to hash new passwords.
    pub password_hash_algorithm: String,
    /// Rules for new passwords.
    pub password_constraints: PasswordConstraintsConfig,
    /// Audit configuration.
    pub audit: AuditConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            users_file: PathBuf::from("security/users.xml"),
            roles_file: PathBuf::from("security/roles.xml"),
            user_groups_file: PathBuf::from("security/usergroups.xml"),
            create_defaults: true,
            auto_save: true,
            password_hash_algorithm: Argon2PasswordHashCreator::ALGORITHM.to_string(),
            password_constraints: PasswordConstraintsConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl SecurityConfig {
    /// Create the default configuration persisting below `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        let files = [
            ("users_file", &self.users_file),
            ("roles_file", &self.roles_file),
            ("user_groups_file", &self.user_groups_file),
        ];
        for (name, file) in files {
            if file.as_os_str().is_empty() {
                return Err(Error::InvalidConfiguration(format!("{name} must not be empty")));
            }
        }
        if self.users_file == self.roles_file
            || self.users_file == self.user_groups_file
            || self.roles_file == self.user_groups_file
        {
            return Err(Error::InvalidConfiguration(
                "users, roles and user groups need distinct files".to_string(),
            ));
        }
        if self.password_hash_algorithm.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "password_hash_algorithm must not be empty".to_string(),
            ));
        }
        let constraints = &self.password_constraints;
        if let (Some(min), Some(max)) = (constraints.min_length, constraints.max_length) {
            if min > max {
                return Err(Error::InvalidConfiguration(format!(
                    "password min_length {min} exceeds max_length {max}"
                )));
            }
        }
        if self.audit.max_items == 0 {
            return Err(Error::InvalidConfiguration(
                "audit.max_items must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a path against the base directory.
    pub fn resolve(&self, relative: &Path) -> Option<PathBuf> {
        self.base_dir.as_ref().map(|base| base.join(relative))
    }

    /// The resolved user file.
    pub fn users_path(&self) -> Option<PathBuf> {
        self.resolve(&self.users_file)
    }

    /// The resolved role file.
    pub fn roles_path(&self) -> Option<PathBuf> {
        self.resolve(&self.roles_file)
    }

    /// The resolved user group file.
    pub fn user_groups_path(&self) -> Option<PathBuf> {
        self.resolve(&self.user_groups_file)
    }

    /// The resolved audit directory.
    pub fn audit_dir(&self) -> Option<PathBuf> {
        self.resolve(&self.audit.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SecurityConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.users_path().is_none());
        assert!(config.create_defaults);
        assert_eq!(config.audit.max_items, 10_000);
        assert!(!config.audit.auto_save);
    }

    #[test]
    fn test_paths_resolve_against_base_dir() {
        let config = SecurityConfig::with_base_dir("/data");
        assert_eq!(config.users_path(), Some(PathBuf::from("/data/security/users.xml")));
        assert_eq!(config.audit_dir(), Some(PathBuf::from("/data/audit")));
    }

    #[test]
    fn test_partial_json() {
        let config = SecurityConfig::from_json_str(
            r#"{ "base_dir": "/srv/app", "create_defaults": false, "audit": { "format": "legacy" } }"#,
        )
        .unwrap();
        assert_eq!(config.base_dir, Some(PathBuf::from("/srv/app")));
        assert!(!config.create_defaults);
        assert_eq!(config.audit.format, AuditFormat::Legacy);
        assert_eq!(config.audit.max_items, 10_000);
        assert_eq!(config.roles_file, PathBuf::from("security/roles.xml"));
    }

    #[test]
    fn test_invalid_config() {
        let result = SecurityConfig::from_json_str(r#"{ "audit": { "max_items": 0 } }"#);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));

        let result = SecurityConfig::from_json_str(
            r#"{ "users_file": "a.xml", "roles_file": "a.xml" }"#,
        );
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));

        assert!(matches!(
            SecurityConfig::from_json_str("{ not json"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_password_constraints_from_json() {
        let config = SecurityConfig::from_json_str(
            r#"{ "password_constraints": { "min_length": 10, "min_digits": 1, "min_special": 2 } }"#,
        )
        .unwrap();
        let list = config.password_constraints.to_constraint_list();
        assert_eq!(list.len(), 3);
        assert!(list.is_password_valid("abcdefg-1!"));
        assert!(!list.is_password_valid("abcdefgh-1"));

        assert!(SecurityConfig::default()
            .password_constraints
            .to_constraint_list()
            .is_empty());

        let result = SecurityConfig::from_json_str(
            r#"{ "password_constraints": { "min_length": 10, "max_length": 5 } }"#,
        );
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.json");
        std::fs::write(&path, r#"{ "auto_save": false }"#).unwrap();

        let config = SecurityConfig::from_json_file(&path).unwrap();
        assert!(!config.auto_save);
        assert!(SecurityConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
