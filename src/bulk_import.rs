//! Bookkeeping for bulk imports.

use crate::id::HasId;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Default maximum number of stored warnings.
pub const DEFAULT_MAX_WARNINGS: usize = 1000;

struct ImportState<T> {
    success: bool,
    added: BTreeMap<String, T>,
    changed: BTreeMap<String, T>,
    failed: Vec<String>,
    warnings: Vec<String>,
    additional_warnings: usize,
}

/// Collects what happened during a bulk import of `T`s.
///
/// Warnings beyond the configured maximum are only counted. The result can be
/// shared between threads importing in parallel.
pub struct BulkImportResult<T> {
    max_warnings: usize,
    state: RwLock<ImportState<T>>,
}

impl<T: HasId + Clone> BulkImportResult<T> {
    /// Create a result storing at most [`DEFAULT_MAX_WARNINGS`] warnings.
    pub fn new() -> Self {
        Self::with_max_warnings(DEFAULT_MAX_WARNINGS)
    }

    /// Create a result storing at most `max_warnings` warnings.
    pub fn with_max_warnings(max_warnings: usize) -> Self {
        Self {
            max_warnings,
            state: RwLock::new(ImportState {
                success: true,
                added: BTreeMap::new(),
                changed: BTreeMap::new(),
                failed: Vec::new(),
                warnings: Vec::new(),
                additional_warnings: 0,
            }),
        }
    }

    /// Record an added object. An object with the same ID is replaced.
    pub fn register_added(&self, object: T) {
        self.state
            .write()
            .added
            .insert(object.id().to_string(), object);
    }

    /// Added objects, ordered by ID.
    pub fn get_added(&self) -> Vec<T> {
        self.state.read().added.values().cloned().collect()
    }

    /// Number of added objects.
    pub fn get_added_count(&self) -> usize {
        self.state.read().added.len()
    }

    /// Whether an object with the ID was added.
    pub fn contains_added(&self, id: &str) -> bool {
        self.state.read().added.contains_key(id)
    }

    /// Record a changed object. An object with the same ID is replaced.
    pub fn register_changed(&self, object: T) {
        self.state
            .write()
            .changed
            .insert(object.id().to_string(), object);
    }

    /// Changed objects, ordered by ID.
    pub fn get_changed(&self) -> Vec<T> {
        self.state.read().changed.values().cloned().collect()
    }

    /// Number of changed objects.
    pub fn get_changed_count(&self) -> usize {
        self.state.read().changed.len()
    }

    /// Whether an object with the ID was changed.
    pub fn contains_changed(&self, id: &str) -> bool {
        self.state.read().changed.contains_key(id)
    }

    /// Record the ID of an object that could not be imported.
    pub fn register_failed(&self, id: impl Into<String>) {
        self.state.write().failed.push(id.into());
    }

    /// IDs of failed objects in registration order.
    pub fn get_failed(&self) -> Vec<String> {
        self.state.read().failed.clone()
    }

    /// Number of failed objects.
    pub fn get_failed_count(&self) -> usize {
        self.state.read().failed.len()
    }

    /// Whether the ID was registered as failed.
    pub fn contains_failed(&self, id: &str) -> bool {
        self.state.read().failed.iter().any(|failed| failed == id)
    }

    /// Add a warning. Once the maximum is reached the warning is only counted.
    pub fn add_warning(&self, message: impl Into<String>) {
        let mut state = self.state.write();
        if state.warnings.len() < self.max_warnings {
            state.warnings.push(message.into());
        } else {
            state.additional_warnings += 1;
        }
    }

    /// The stored warnings.
    pub fn get_warnings(&self) -> Vec<String> {
        self.state.read().warnings.clone()
    }

    /// Number of all warnings, including those that were not stored.
    pub fn get_warnings_count(&self) -> usize {
        let state = self.state.read();
        state.warnings.len() + state.additional_warnings
    }

    /// Number of warnings that were counted but not stored.
    pub fn get_additional_warnings_count(&self) -> usize {
        self.state.read().additional_warnings
    }

    /// How many warnings are stored at most.
    pub fn max_warnings(&self) -> usize {
        self.max_warnings
    }

    /// Mark the whole import as succeeded or failed.
    pub fn set_success(&self, success: bool) {
        self.state.write().success = success;
    }

    /// Whether the import succeeded.
    pub fn is_success(&self) -> bool {
        self.state.read().success
    }

    /// Whether the import failed.
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }
}

impl<T: HasId + Clone> Default for BulkImportResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    #[test]
    fn test_warning_cap() {
        let result: BulkImportResult<Role> = BulkImportResult::with_max_warnings(2);
        for i in 0..5 {
            result.add_warning(format!("warning {i}"));
        }
        assert_eq!(result.get_warnings(), vec!["warning 0", "warning 1"]);
        assert_eq!(result.get_warnings_count(), 5);
        assert_eq!(result.get_additional_warnings_count(), 3);
    }

    #[test]
    fn test_added_and_changed_are_ordered_by_id() {
        let result = BulkImportResult::new();
        result.register_added(Role::with_id("b", "B"));
        result.register_added(Role::with_id("a", "A"));
        result.register_added(Role::with_id("b", "B2"));
        result.register_changed(Role::with_id("c", "C"));

        let added: Vec<String> = result.get_added().iter().map(|r| r.id().to_string()).collect();
        assert_eq!(added, vec!["a", "b"]);
        assert_eq!(result.get_added()[1].name(), "B2");
        assert!(result.contains_added("a"));
        assert!(!result.contains_added("c"));
        assert!(result.contains_changed("c"));
        assert_eq!(result.get_changed_count(), 1);
    }

    #[test]
    fn test_failed_and_success() {
        let result: BulkImportResult<Role> = BulkImportResult::default();
        assert!(result.is_success());
        result.register_failed("x");
        result.register_failed("y");
        result.set_success(false);

        assert!(result.is_failure());
        assert_eq!(result.get_failed(), vec!["x", "y"]);
        assert!(result.contains_failed("y"));
        assert_eq!(result.get_failed_count(), 2);
        assert_eq!(result.max_warnings(), DEFAULT_MAX_WARNINGS);
    }
}
