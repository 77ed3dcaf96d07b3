//! Entity identifiers.

use uuid::Uuid;

/// An entity with a stable string identifier.
pub trait HasId {
    /// The unique identifier of this entity.
    fn id(&self) -> &str;
}

/// Creates a fresh, globally unique identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
