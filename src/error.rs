//! Error types for the access system.
//!
//! Lookups that do not resolve are never errors: they yield `None`, `false`
//! or [`Change::Unchanged`](crate::change::Change::Unchanged). The variants
//! below signal contract violations and I/O or format problems.

use thiserror::Error;

/// The main error type for access system operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An entity with the given ID is already stored in its manager.
    #[error("{kind} ID '{id}' is already in use")]
    IdInUse {
        /// The kind of entity ("role", "user", "user group").
        kind: &'static str,
        /// The conflicting ID.
        id: String,
    },

    /// A required argument was empty.
    #[error("Required argument '{0}' is empty")]
    EmptyArgument(&'static str),

    /// Low level XML reader/writer failure.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted document does not have the expected structure.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Creating or verifying a password hash failed.
    #[error("Password hash error: {0}")]
    PasswordHash(String),

    /// No password hash creator is registered for the algorithm.
    #[error("No password hash creator registered for algorithm '{0}'")]
    UnknownHashAlgorithm(String),

    /// Another password hash creator already uses the algorithm name.
    #[error("Another password hash creator for algorithm '{0}' is already registered")]
    HashAlgorithmInUse(String),

    /// A new password violates the configured password constraints.
    #[error("Password violates constraints: {}", .0.join(", "))]
    PasswordConstraintViolation(Vec<String>),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shortcut for [`Error::IdInUse`].
    pub(crate) fn id_in_use(kind: &'static str, id: impl Into<String>) -> Self {
        Error::IdInUse {
            kind,
            id: id.into(),
        }
    }

    /// Shortcut for [`Error::MalformedDocument`].
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedDocument(message.into())
    }
}

/// Result type alias for access system operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fails with [`Error::EmptyArgument`] when `value` has no text.
pub(crate) fn require_text(value: &str, name: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::EmptyArgument(name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert!(require_text("admin", "name").is_ok());
        assert!(matches!(require_text("", "name"), Err(Error::EmptyArgument("name"))));
        assert!(matches!(require_text("   ", "id"), Err(Error::EmptyArgument("id"))));
    }

    #[test]
    fn test_error_messages() {
        let err = Error::id_in_use("role", "radmin");
        assert_eq!(err.to_string(), "role ID 'radmin' is already in use");

        let err = Error::malformed("missing root element");
        assert_eq!(err.to_string(), "Malformed document: missing root element");
    }
}
