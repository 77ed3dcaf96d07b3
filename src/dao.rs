//! XML file backed data access objects.
//!
//! An [`XmlDao`] owns the in-memory state of one manager together with the
//! manager-wide reader/writer lock. State is loaded once at construction
//! (`initial_read`) and written back whenever a mutation marks it as changed,
//! either immediately (auto-save) or on an explicit flush.

use crate::{
    change::Change,
    error::{Error, Result},
    xml::XmlDocument,
};
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

/// Whether auto-save is enabled for new DAOs.
pub const DEFAULT_AUTO_SAVE_ENABLED: bool = true;

/// The hooks a manager's state implements to be persisted by an [`XmlDao`].
pub trait DaoData: Send + Sync {
    /// Called when no backing file exists yet. Returns whether anything was
    /// created, in which case the file is written right away.
    fn on_init(&mut self) -> Change {
        Change::Unchanged
    }

    /// Fill the state from a previously written document.
    fn on_read(&mut self, doc: &XmlDocument) -> Result<Change>;

    /// Serialize the complete state into a fresh document.
    fn create_write_data(&self) -> XmlDocument;
}

struct DaoState<T> {
    data: T,
    pending_changes: bool,
    auto_save: bool,
}

/// A data access object persisting its state as an XML file.
///
/// Without a file the DAO is purely in-memory: writes always succeed and
/// nothing touches the disk.
pub struct XmlDao<T: DaoData> {
    file: Option<PathBuf>,
    state: RwLock<DaoState<T>>,
}

impl<T: DaoData> XmlDao<T> {
    /// Create a DAO bound to `file` and perform the initial read.
    pub fn new(file: Option<PathBuf>, data: T) -> Result<Self> {
        Self::with_auto_save(file, data, DEFAULT_AUTO_SAVE_ENABLED)
    }

    /// Create a DAO with an explicit auto-save setting. Without auto-save,
    /// state created by [`DaoData::on_init`] stays pending until the next
    /// flush.
    pub fn with_auto_save(file: Option<PathBuf>, data: T, auto_save: bool) -> Result<Self> {
        if let Some(path) = &file {
            if path.exists() {
                if !path.is_file() {
                    return Err(Error::InvalidConfiguration(format!(
                        "'{}' is a directory and not a file",
                        path.display()
                    )));
                }
            } else if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let dao = Self {
            file,
            state: RwLock::new(DaoState {
                data,
                pending_changes: false,
                auto_save,
            }),
        };
        dao.initial_read()?;
        Ok(dao)
    }

    /// Create a DAO that never touches the disk.
    pub fn in_memory(data: T) -> Result<Self> {
        Self::new(None, data)
    }

    fn initial_read(&self) -> Result<()> {
        let mut state = self.state.write();

        let changed = match self.file.as_deref().filter(|p| p.exists()) {
            None => state.data.on_init(),
            Some(path) => {
                debug!("Reading {}", path.display());
                let doc = XmlDocument::read_from_file(path)?;
                state.data.on_read(&doc)?
            }
        };

        if changed.is_changed() {
            if !state.auto_save {
                state.pending_changes = true;
                return Ok(());
            }
            if let Err(e) = self.write_to_file(&state.data) {
                warn!("File has pending changes after initialization: {e}");
                state.pending_changes = true;
                return Ok(());
            }
        }
        state.pending_changes = false;
        Ok(())
    }

    fn write_to_file(&self, data: &T) -> Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };

        let doc = data.create_write_data().with_comment(format!(
            "This file was generated automatically - do NOT modify!\nWritten at {}",
            chrono::Utc::now().to_rfc3339()
        ));
        doc.write_to_file(path).map_err(|e| {
            error!("Failed to write data to {}: {e}", path.display());
            e
        })
    }

    // Must be called with the write lock held
    fn mark_as_changed(&self, state: &mut DaoState<T>) {
        if !state.auto_save {
            state.pending_changes = true;
            return;
        }
        match self.write_to_file(&state.data) {
            Ok(()) => state.pending_changes = false,
            Err(e) => {
                warn!("File still has pending changes after mark_as_changed: {e}");
                state.pending_changes = true;
            }
        }
    }

    /// Run `f` under the shared read lock.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let state = self.state.read();
        f(&state.data)
    }

    /// Run a mutation under the exclusive write lock. The DAO is marked as
    /// changed if `f` reports a change.
    pub fn modify(&self, f: impl FnOnce(&mut T) -> Change) -> Change {
        let mut state = self.state.write();
        let change = f(&mut state.data);
        if change.is_changed() {
            self.mark_as_changed(&mut state);
        }
        change
    }

    /// Run a fallible mutation under the exclusive write lock. The DAO is
    /// marked as changed if `f` succeeds.
    pub fn try_modify<R>(&self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let mut state = self.state.write();
        let value = f(&mut state.data)?;
        self.mark_as_changed(&mut state);
        Ok(value)
    }

    /// Mutate the in-memory state without writing it. Pending changes are
    /// discarded.
    pub(crate) fn reset(&self, f: impl FnOnce(&mut T)) {
        let mut state = self.state.write();
        f(&mut state.data);
        state.pending_changes = false;
    }

    /// The backing file, if any.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Whether changes have been made that are not yet written.
    pub fn has_pending_changes(&self) -> bool {
        self.state.read().pending_changes
    }

    /// Whether every change is written immediately.
    pub fn is_auto_save_enabled(&self) -> bool {
        self.state.read().auto_save
    }

    /// Enable or disable auto-save.
    pub fn set_auto_save_enabled(&self, auto_save: bool) -> Change {
        let mut state = self.state.write();
        if state.auto_save == auto_save {
            return Change::Unchanged;
        }
        state.auto_save = auto_save;
        Change::Changed
    }

    /// Write the state if there are pending changes.
    pub fn write_to_file_on_pending_changes(&self) -> Result<()> {
        let mut state = self.state.write();
        if !state.pending_changes {
            return Ok(());
        }
        self.write_to_file(&state.data)?;
        state.pending_changes = false;
        if let Some(path) = &self.file {
            info!("Flushed pending changes to {}", path.display());
        }
        Ok(())
    }

    /// Run `f` with auto-save disabled and write all pending changes
    /// afterwards, so that a batch of mutations results in a single write.
    ///
    /// The auto-save flag is restored before the flush. Other threads
    /// mutating the same DAO meanwhile are batched as well.
    pub fn perform_without_auto_save<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let old_auto_save = {
            let mut state = self.state.write();
            std::mem::replace(&mut state.auto_save, false)
        };
        let value = f();
        self.state.write().auto_save = old_auto_save;
        self.write_to_file_on_pending_changes()?;
        Ok(value)
    }
}
