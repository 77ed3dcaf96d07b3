//! Convenience macros for the access system.

/// Macro for building a custom attribute map with a clean syntax.
///
/// # Examples
///
/// ```rust
/// use access_system::custom_attributes;
///
/// let attrs = custom_attributes! {
///     "department" => "Sales",
///     "floor" => "3",
/// };
/// assert_eq!(attrs.get("floor").map(String::as_str), Some("3"));
/// ```
#[macro_export]
macro_rules! custom_attributes {
    ($($key:expr => $value:expr),* $(,)?) => {
        {
            #[allow(unused_mut)]
            let mut attrs = ::std::collections::BTreeMap::<String, String>::new();
            $(
                attrs.insert(::std::string::ToString::to_string(&$key), ::std::string::ToString::to_string(&$value));
            )*
            attrs
        }
    };
}

/// Implements the persistence controls every manager forwards to its DAO.
macro_rules! impl_dao_controls {
    ($manager:ty) => {
        impl $manager {
            /// Whether changes have been made that are not yet written.
            pub fn has_pending_changes(&self) -> bool {
                self.dao.has_pending_changes()
            }

            /// Whether every change is written immediately.
            pub fn is_auto_save_enabled(&self) -> bool {
                self.dao.is_auto_save_enabled()
            }

            /// Enable or disable auto-save.
            pub fn set_auto_save_enabled(&self, auto_save: bool) -> $crate::change::Change {
                self.dao.set_auto_save_enabled(auto_save)
            }

            /// Write the state if there are pending changes.
            pub fn write_to_file_on_pending_changes(&self) -> $crate::error::Result<()> {
                self.dao.write_to_file_on_pending_changes()
            }

            /// Run `f` with auto-save disabled and write once afterwards.
            pub fn perform_without_auto_save<R>(&self, f: impl FnOnce() -> R) -> $crate::error::Result<R> {
                self.dao.perform_without_auto_save(f)
            }

            /// The backing file, if any.
            pub fn file(&self) -> Option<&::std::path::Path> {
                self.dao.file()
            }
        }
    };
}

pub(crate) use impl_dao_controls;

#[cfg(test)]
mod tests {
    #[test]
    fn test_custom_attributes_macro() {
        let attrs = custom_attributes! {
            "a" => "1",
            "b" => 2,
        };
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["b"], "2");

        let empty = custom_attributes! {};
        assert!(empty.is_empty());
    }
}
