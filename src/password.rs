//! Password hashing.
//!
//! A [`PasswordHash`] remembers the algorithm that produced it, so stored
//! users keep verifying after the default algorithm changes. New passwords
//! are checked against a [`PasswordConstraintList`] before they are hashed.

use crate::error::{Error, Result};
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use log::{info, warn};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::{collections::HashMap, fmt, sync::Arc};

/// A password hash together with the name of the algorithm that created it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PasswordHash {
    algorithm: String,
    hash: String,
}

impl PasswordHash {
    /// Create a password hash from its parts.
    pub fn new(algorithm: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            hash: hash.into(),
        }
    }

    /// The algorithm name.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// The encoded hash.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Creates and verifies password hashes for one algorithm.
pub trait PasswordHashCreator: Send + Sync {
    /// The unique algorithm name stored next to every hash.
    fn algorithm_name(&self) -> &str;

    /// Hash a plain text password.
    fn create_password_hash(&self, plain_text_password: &str) -> Result<String>;

    /// Check a plain text password against a hash created by this creator.
    ///
    /// The default implementation recomputes the hash, which only works for
    /// deterministic algorithms.
    fn verify_password(&self, plain_text_password: &str, hash: &str) -> Result<bool> {
        Ok(self.create_password_hash(plain_text_password)? == hash)
    }
}

/// Salted Argon2id hashes in PHC string format.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2PasswordHashCreator;

impl Argon2PasswordHashCreator {
    /// The algorithm name.
    pub const ALGORITHM: &'static str = "argon2";
}

impl PasswordHashCreator for Argon2PasswordHashCreator {
    fn algorithm_name(&self) -> &str {
        Self::ALGORITHM
    }

    fn create_password_hash(&self, plain_text_password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain_text_password.as_bytes(), &salt)
            .map_err(|e| Error::PasswordHash(format!("Failed to hash password: {e}")))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, plain_text_password: &str, hash: &str) -> Result<bool> {
        let parsed = argon2::PasswordHash::new(hash)
            .map_err(|e| Error::PasswordHash(format!("Failed to parse password hash: {e}")))?;
        match Argon2::default().verify_password(plain_text_password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::PasswordHash(format!(
                "Password verification failed: {e}"
            ))),
        }
    }
}

/// Unsalted hex encoded SHA-256. Kept for reading old user files.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256PasswordHashCreator;

impl Sha256PasswordHashCreator {
    /// The algorithm name.
    pub const ALGORITHM: &'static str = "sha256";
}

impl PasswordHashCreator for Sha256PasswordHashCreator {
    fn algorithm_name(&self) -> &str {
        Self::ALGORITHM
    }

    fn create_password_hash(&self, plain_text_password: &str) -> Result<String> {
        Ok(hex::encode(Sha256::digest(plain_text_password.as_bytes())))
    }
}

/// A rule every new password must satisfy.
pub trait PasswordConstraint: Send + Sync + fmt::Debug {
    /// Whether the password satisfies the rule.
    fn is_password_valid(&self, plain_text_password: &str) -> bool;

    /// Describes the rule, e.g. for error messages.
    fn description(&self) -> String;
}

/// The password must have at least this many characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinLengthConstraint(pub usize);

impl PasswordConstraint for MinLengthConstraint {
    fn is_password_valid(&self, plain_text_password: &str) -> bool {
        plain_text_password.chars().count() >= self.0
    }

    fn description(&self) -> String {
        format!("at least {} characters", self.0)
    }
}

/// The password must have at most this many characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxLengthConstraint(pub usize);

impl PasswordConstraint for MaxLengthConstraint {
    fn is_password_valid(&self, plain_text_password: &str) -> bool {
        plain_text_password.chars().count() <= self.0
    }

    fn description(&self) -> String {
        format!("at most {} characters", self.0)
    }
}

/// Character classes for [`MustContainConstraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterClass {
    /// ASCII and Unicode digits.
    Digit,
    /// Upper case letters.
    UpperCase,
    /// Lower case letters.
    LowerCase,
    /// Anything that is neither a letter nor a digit.
    Special,
}

impl CharacterClass {
    fn matches(self, c: char) -> bool {
        match self {
            CharacterClass::Digit => c.is_numeric(),
            CharacterClass::UpperCase => c.is_uppercase(),
            CharacterClass::LowerCase => c.is_lowercase(),
            CharacterClass::Special => !c.is_alphanumeric(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            CharacterClass::Digit => "digit",
            CharacterClass::UpperCase => "upper case letter",
            CharacterClass::LowerCase => "lower case letter",
            CharacterClass::Special => "special character",
        }
    }
}

/// The password must contain at least `min_count` characters of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MustContainConstraint {
    /// The required character class.
    pub class: CharacterClass,
    /// How many characters of the class are required.
    pub min_count: usize,
}

impl MustContainConstraint {
    /// Require `min_count` characters of `class`.
    pub fn new(class: CharacterClass, min_count: usize) -> Self {
        Self { class, min_count }
    }
}

impl PasswordConstraint for MustContainConstraint {
    fn is_password_valid(&self, plain_text_password: &str) -> bool {
        plain_text_password
            .chars()
            .filter(|c| self.class.matches(*c))
            .count()
            >= self.min_count
    }

    fn description(&self) -> String {
        let plural = if self.min_count == 1 { "" } else { "s" };
        format!("at least {} {}{plural}", self.min_count, self.class.name())
    }
}

/// An ordered set of password constraints. An empty list accepts every
/// password.
#[derive(Debug, Clone, Default)]
pub struct PasswordConstraintList {
    constraints: Vec<Arc<dyn PasswordConstraint>>,
}

impl PasswordConstraintList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint, builder style.
    pub fn with(mut self, constraint: impl PasswordConstraint + 'static) -> Self {
        self.add(Arc::new(constraint));
        self
    }

    /// Add a constraint.
    pub fn add(&mut self, constraint: Arc<dyn PasswordConstraint>) {
        self.constraints.push(constraint);
    }

    /// Whether any constraint is defined.
    pub fn has_constraints(&self) -> bool {
        !self.constraints.is_empty()
    }

    /// Number of constraints.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Whether the password satisfies every constraint.
    pub fn is_password_valid(&self, plain_text_password: &str) -> bool {
        self.constraints
            .iter()
            .all(|c| c.is_password_valid(plain_text_password))
    }

    /// Descriptions of all constraints the password violates, in list order.
    pub fn get_invalid_password_descriptions(&self, plain_text_password: &str) -> Vec<String> {
        self.constraints
            .iter()
            .filter(|c| !c.is_password_valid(plain_text_password))
            .map(|c| c.description())
            .collect()
    }
}

impl fmt::Display for PasswordConstraintList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descriptions: Vec<String> = self.constraints.iter().map(|c| c.description()).collect();
        write!(f, "[{}]", descriptions.join(", "))
    }
}

struct Registry {
    creators: HashMap<String, Arc<dyn PasswordHashCreator>>,
    default_algorithm: String,
}

/// Registry of password hash creators with one default algorithm used for
/// new passwords, together with the constraints new passwords must satisfy.
pub struct PasswordHashCreatorManager {
    registry: RwLock<Registry>,
    constraints: RwLock<PasswordConstraintList>,
}

impl PasswordHashCreatorManager {
    /// Create a manager with the Argon2 (default) and SHA-256 creators.
    pub fn new() -> Self {
        let mut creators: HashMap<String, Arc<dyn PasswordHashCreator>> = HashMap::new();
        creators.insert(
            Argon2PasswordHashCreator::ALGORITHM.to_string(),
            Arc::new(Argon2PasswordHashCreator),
        );
        creators.insert(
            Sha256PasswordHashCreator::ALGORITHM.to_string(),
            Arc::new(Sha256PasswordHashCreator),
        );
        Self {
            registry: RwLock::new(Registry {
                creators,
                default_algorithm: Argon2PasswordHashCreator::ALGORITHM.to_string(),
            }),
            constraints: RwLock::new(PasswordConstraintList::new()),
        }
    }

    /// Register an additional creator. Algorithm names must be unique.
    pub fn register(&self, creator: Arc<dyn PasswordHashCreator>) -> Result<()> {
        let algorithm = creator.algorithm_name().to_string();
        if algorithm.trim().is_empty() {
            return Err(Error::EmptyArgument("algorithm"));
        }

        let mut registry = self.registry.write();
        if registry.creators.contains_key(&algorithm) {
            return Err(Error::HashAlgorithmInUse(algorithm));
        }
        registry.creators.insert(algorithm.clone(), creator);
        drop(registry);

        info!("Registered password hash creator algorithm '{algorithm}'");
        Ok(())
    }

    /// Get the creator of an algorithm.
    pub fn creator_of_algorithm(&self, algorithm: &str) -> Option<Arc<dyn PasswordHashCreator>> {
        self.registry.read().creators.get(algorithm).cloned()
    }

    /// Change the algorithm used for new passwords.
    pub fn set_default_algorithm(&self, algorithm: &str) -> Result<()> {
        let mut registry = self.registry.write();
        if !registry.creators.contains_key(algorithm) {
            return Err(Error::UnknownHashAlgorithm(algorithm.to_string()));
        }
        registry.default_algorithm = algorithm.to_string();
        drop(registry);

        info!("Default password hash algorithm set to '{algorithm}'");
        Ok(())
    }

    /// The algorithm used for new passwords.
    pub fn default_algorithm(&self) -> String {
        self.registry.read().default_algorithm.clone()
    }

    /// Hash a password with the default algorithm.
    pub fn create_user_default_password_hash(&self, plain_text_password: &str) -> Result<PasswordHash> {
        let algorithm = self.default_algorithm();
        self.create_user_password_hash(&algorithm, plain_text_password)
    }

    /// Hash a password with a specific algorithm.
    pub fn create_user_password_hash(
        &self,
        algorithm: &str,
        plain_text_password: &str,
    ) -> Result<PasswordHash> {
        let creator = self
            .creator_of_algorithm(algorithm)
            .ok_or_else(|| Error::UnknownHashAlgorithm(algorithm.to_string()))?;
        let hash = creator.create_password_hash(plain_text_password)?;
        Ok(PasswordHash::new(algorithm, hash))
    }

    /// A copy of the current password constraints.
    pub fn password_constraints(&self) -> PasswordConstraintList {
        self.constraints.read().clone()
    }

    /// Replace the password constraints.
    pub fn set_password_constraints(&self, constraints: PasswordConstraintList) {
        info!("Set password constraints to {constraints}");
        *self.constraints.write() = constraints;
    }

    /// Whether any password constraint is defined.
    pub fn is_any_password_constraint_defined(&self) -> bool {
        self.constraints.read().has_constraints()
    }

    /// Fails with [`Error::PasswordConstraintViolation`] listing every
    /// violated constraint.
    pub fn check_password_constraints(&self, plain_text_password: &str) -> Result<()> {
        let violations = self
            .constraints
            .read()
            .get_invalid_password_descriptions(plain_text_password);
        if violations.is_empty() {
            return Ok(());
        }
        warn!("Password violates {} constraint(s)", violations.len());
        Err(Error::PasswordConstraintViolation(violations))
    }

    /// Check a plain text password against a stored hash, using the
    /// algorithm recorded in the hash.
    pub fn verify(&self, password_hash: &PasswordHash, plain_text_password: &str) -> Result<bool> {
        let creator = self
            .creator_of_algorithm(password_hash.algorithm())
            .ok_or_else(|| Error::UnknownHashAlgorithm(password_hash.algorithm().to_string()))?;
        creator.verify_password(plain_text_password, password_hash.hash())
    }
}

impl Default for PasswordHashCreatorManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PasswordHashCreatorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        let mut algorithms: Vec<&String> = registry.creators.keys().collect();
        algorithms.sort();
        f.debug_struct("PasswordHashCreatorManager")
            .field("algorithms", &algorithms)
            .field("default", &registry.default_algorithm)
            .field("constraints", &self.constraints.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reversed;

    impl PasswordHashCreator for Reversed {
        fn algorithm_name(&self) -> &str {
            "reversed"
        }

        fn create_password_hash(&self, plain_text_password: &str) -> Result<String> {
            Ok(plain_text_password.chars().rev().collect())
        }
    }

    #[test]
    fn test_argon2_hash_and_verify() {
        let creator = Argon2PasswordHashCreator;
        let hash = creator.create_password_hash("secret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert_ne!(hash, creator.create_password_hash("secret").unwrap());

        assert!(creator.verify_password("secret", &hash).unwrap());
        assert!(!creator.verify_password("Secret", &hash).unwrap());
        assert!(creator.verify_password("secret", "not-a-hash").is_err());
    }

    #[test]
    fn test_sha256_is_deterministic() {
        let creator = Sha256PasswordHashCreator;
        let hash = creator.create_password_hash("password").unwrap();
        assert_eq!(
            hash,
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
        assert!(creator.verify_password("password", &hash).unwrap());
        assert!(!creator.verify_password("passwort", &hash).unwrap());
    }

    #[test]
    fn test_manager_defaults() {
        let manager = PasswordHashCreatorManager::new();
        assert_eq!(manager.default_algorithm(), "argon2");

        let hash = manager.create_user_default_password_hash("pw").unwrap();
        assert_eq!(hash.algorithm(), "argon2");
        assert!(manager.verify(&hash, "pw").unwrap());
        assert!(!manager.verify(&hash, "wp").unwrap());
    }

    #[test]
    fn test_register_and_switch_default() {
        let manager = PasswordHashCreatorManager::new();
        manager.register(Arc::new(Reversed)).unwrap();
        assert!(matches!(
            manager.register(Arc::new(Reversed)),
            Err(Error::HashAlgorithmInUse(_))
        ));

        manager.set_default_algorithm("reversed").unwrap();
        let hash = manager.create_user_default_password_hash("abc").unwrap();
        assert_eq!(hash, PasswordHash::new("reversed", "cba"));

        assert!(matches!(
            manager.set_default_algorithm("md5"),
            Err(Error::UnknownHashAlgorithm(_))
        ));
        assert_eq!(manager.default_algorithm(), "reversed");
    }

    #[test]
    fn test_constraint_list() {
        let constraints = PasswordConstraintList::new()
            .with(MinLengthConstraint(8))
            .with(MaxLengthConstraint(16))
            .with(MustContainConstraint::new(CharacterClass::Digit, 2))
            .with(MustContainConstraint::new(CharacterClass::UpperCase, 1))
            .with(MustContainConstraint::new(CharacterClass::Special, 1));
        assert!(constraints.has_constraints());
        assert_eq!(constraints.len(), 5);

        assert!(constraints.is_password_valid("Secret-42"));
        assert_eq!(
            constraints.get_invalid_password_descriptions("abc1"),
            vec![
                "at least 8 characters".to_string(),
                "at least 2 digits".to_string(),
                "at least 1 upper case letter".to_string(),
                "at least 1 special character".to_string(),
            ]
        );
        assert_eq!(
            constraints.get_invalid_password_descriptions("Much-too-long-password-12"),
            vec!["at most 16 characters".to_string()]
        );
    }

    #[test]
    fn test_empty_constraint_list_accepts_everything() {
        let constraints = PasswordConstraintList::new();
        assert!(constraints.is_empty());
        assert!(constraints.is_password_valid(""));
        assert_eq!(constraints.to_string(), "[]");
    }

    #[test]
    fn test_length_counts_characters() {
        assert!(MinLengthConstraint(4).is_password_valid("äöüß"));
        assert!(MaxLengthConstraint(4).is_password_valid("äöüß"));
        assert!(MustContainConstraint::new(CharacterClass::LowerCase, 4).is_password_valid("äöüß"));
    }

    #[test]
    fn test_manager_checks_constraints() {
        let manager = PasswordHashCreatorManager::new();
        assert!(!manager.is_any_password_constraint_defined());
        assert!(manager.check_password_constraints("").is_ok());

        manager.set_password_constraints(PasswordConstraintList::new().with(MinLengthConstraint(6)));
        assert!(manager.is_any_password_constraint_defined());
        assert!(manager.check_password_constraints("secret").is_ok());
        match manager.check_password_constraints("pw") {
            Err(Error::PasswordConstraintViolation(violations)) => {
                assert_eq!(violations, vec!["at least 6 characters".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(manager.password_constraints().len(), 1);
    }

    #[test]
    fn test_verify_unknown_algorithm() {
        let manager = PasswordHashCreatorManager::new();
        let hash = PasswordHash::new("md5", "x");
        assert!(matches!(
            manager.verify(&hash, "x"),
            Err(Error::UnknownHashAlgorithm(_))
        ));
    }
}
