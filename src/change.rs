//! Two-valued result of mutating operations.

/// Whether a mutating operation modified any state.
///
/// Operations whose target does not resolve report [`Change::Unchanged`]
/// instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum Change {
    /// Something was modified.
    Changed,
    /// Nothing was modified.
    Unchanged,
}

impl Change {
    /// Returns true if something was modified.
    pub fn is_changed(self) -> bool {
        matches!(self, Change::Changed)
    }

    /// Returns true if nothing was modified.
    pub fn is_unchanged(self) -> bool {
        !self.is_changed()
    }

    /// Combines two results: changed if either one is changed.
    pub fn or(self, other: Change) -> Change {
        if self.is_changed() || other.is_changed() {
            Change::Changed
        } else {
            Change::Unchanged
        }
    }

    /// Combines two results: changed only if both are changed.
    pub fn and(self, other: Change) -> Change {
        if self.is_changed() && other.is_changed() {
            Change::Changed
        } else {
            Change::Unchanged
        }
    }
}

impl From<bool> for Change {
    fn from(changed: bool) -> Self {
        if changed {
            Change::Changed
        } else {
            Change::Unchanged
        }
    }
}

impl Default for Change {
    fn default() -> Self {
        Change::Unchanged
    }
}
