//! In-memory audit log with optional daily XML files.

use crate::{
    audit::{AuditItem, AuditItemHandler, CurrentUserIdProvider, ItemAuditor},
    change::Change,
    config::{AuditConfig, SecurityConfig},
    dao::{DaoData, XmlDao},
    error::Result,
    xml::{XmlConverter, XmlDocument, XmlElement},
};
use chrono::{NaiveDate, Utc};
use log::{error, info, warn};
use parking_lot::RwLock;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Default maximum number of items kept in an [`AuditItemList`].
pub const DEFAULT_MAX_AUDIT_ITEMS: usize = 10_000;

const ELEMENT_ROOT: &str = "audititems";
const ELEMENT_ITEM: &str = "item";

/// An append-only list of audit items with a fixed capacity.
///
/// Once the capacity is reached new items are not stored; only the overflow
/// counter is incremented. Existing items are never evicted.
#[derive(Debug, Clone)]
pub struct AuditItemList {
    items: Vec<AuditItem>,
    max_items: usize,
    overflow_count: u64,
}

impl AuditItemList {
    /// Create an empty list holding at most `max_items` items.
    pub fn new(max_items: usize) -> Self {
        Self {
            items: Vec::new(),
            max_items,
            overflow_count: 0,
        }
    }

    /// Append an item. Returns [`Change::Unchanged`] if the list is full.
    pub fn add(&mut self, item: AuditItem) -> Change {
        if self.items.len() >= self.max_items {
            self.overflow_count += 1;
            return Change::Unchanged;
        }
        self.items.push(item);
        Change::Changed
    }

    /// All stored items in insertion order.
    pub fn get_all_items(&self) -> Vec<AuditItem> {
        self.items.clone()
    }

    /// The `count` most recent items, newest first.
    pub fn get_last_items(&self, count: usize) -> Vec<AuditItem> {
        let mut items: Vec<AuditItem> = self.items.iter().rev().cloned().collect();
        // Stable: items with equal timestamps stay newest first
        items.sort_by(|a, b| b.date_time().cmp(&a.date_time()));
        items.truncate(count);
        items
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no item is stored.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The capacity.
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Number of items dropped because the list was full.
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    /// Stored plus dropped items.
    pub fn total_count(&self) -> u64 {
        self.items.len() as u64 + self.overflow_count
    }

    fn clear(&mut self) {
        self.items.clear();
        self.overflow_count = 0;
    }
}

impl Default for AuditItemList {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AUDIT_ITEMS)
    }
}

impl DaoData for AuditItemList {
    fn on_read(&mut self, doc: &XmlDocument) -> Result<Change> {
        for element in doc.document_element().child_elements(ELEMENT_ITEM) {
            let _ = self.add(AuditItem::from_xml_element(element)?);
        }
        Ok(Change::Unchanged)
    }

    fn create_write_data(&self) -> XmlDocument {
        let mut root = XmlElement::new(ELEMENT_ROOT);
        for item in &self.items {
            root.append_child(item.to_xml_element(ELEMENT_ITEM));
        }
        XmlDocument::new(root)
    }
}

/// Whether audit files are written after every item by default. Without
/// auto-save, items are flushed by [`AuditManager::write_to_file`],
/// [`AuditManager::stop`], on a date change and on drop.
pub const DEFAULT_AUDIT_AUTO_SAVE_ENABLED: bool = false;

type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

struct CurrentFile {
    date: NaiveDate,
    dao: XmlDao<AuditItemList>,
}

/// Stores audit items in memory and, with a base directory, in one XML file
/// per day (`<base_dir>/<YYYY-MM-DD>.xml`).
///
/// The date is checked on every new item. When it changed, pending items
/// are written to the old file and a fresh list is started for the new day.
/// Items already present in a day's file are read back.
pub struct AuditManager {
    base_dir: Option<PathBuf>,
    max_items: usize,
    clock: Clock,
    current: RwLock<CurrentFile>,
}

impl AuditManager {
    /// Create an audit manager. Without a base directory it is in-memory only.
    pub fn new(base_dir: Option<&Path>, max_items: usize) -> Result<Self> {
        Self::with_clock(base_dir, max_items, || Utc::now().date_naive())
    }

    /// Create an audit manager taking the current date from `clock`.
    pub fn with_clock(
        base_dir: Option<&Path>,
        max_items: usize,
        clock: impl Fn() -> NaiveDate + Send + Sync + 'static,
    ) -> Result<Self> {
        let base_dir = base_dir.map(Path::to_path_buf);
        let date = clock();
        let dao = open_daily_file(base_dir.as_deref(), date, max_items, DEFAULT_AUDIT_AUTO_SAVE_ENABLED)?;
        Ok(Self {
            base_dir,
            max_items,
            clock: Box::new(clock),
            current: RwLock::new(CurrentFile { date, dao }),
        })
    }

    /// Create an in-memory audit manager with the default capacity.
    pub fn in_memory() -> Result<Self> {
        Self::new(None, DEFAULT_MAX_AUDIT_ITEMS)
    }

    /// Create an audit manager from the `audit` section of `config`. The
    /// audit directory is resolved against the base directory.
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        config.validate()?;
        let manager = Self::new(config.audit_dir().as_deref(), config.audit.max_items)?;
        let _ = manager.set_auto_save_enabled(config.audit.auto_save);
        Ok(manager)
    }

    /// Create an auditor feeding this manager, rendering actions in the
    /// configured format.
    pub fn create_auditor(
        self: &Arc<Self>,
        config: &AuditConfig,
        user_id_provider: Arc<dyn CurrentUserIdProvider>,
    ) -> ItemAuditor<Arc<AuditManager>> {
        ItemAuditor::new(self.clone(), user_id_provider).with_format(config.format)
    }

    /// The capacity of each day's list.
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// The current audit file, if any.
    pub fn file(&self) -> Option<PathBuf> {
        self.current.read().dao.file().map(Path::to_path_buf)
    }

    /// All stored items of the current day in insertion order.
    pub fn get_all_items(&self) -> Vec<AuditItem> {
        self.current.read().dao.read(AuditItemList::get_all_items)
    }

    /// The `count` most recent items, newest first.
    pub fn get_last_items(&self, count: usize) -> Vec<AuditItem> {
        self.current.read().dao.read(|list| list.get_last_items(count))
    }

    /// Number of stored items.
    pub fn item_count(&self) -> usize {
        self.current.read().dao.read(AuditItemList::len)
    }

    /// Number of items dropped because the list was full.
    pub fn overflow_count(&self) -> u64 {
        self.current.read().dao.read(AuditItemList::overflow_count)
    }

    /// Whether the file is written after every item.
    pub fn is_auto_save_enabled(&self) -> bool {
        self.current.read().dao.is_auto_save_enabled()
    }

    /// Enable or disable writing the file after every item.
    pub fn set_auto_save_enabled(&self, auto_save: bool) -> Change {
        self.current.read().dao.set_auto_save_enabled(auto_save)
    }

    /// Write items that are not yet persisted.
    pub fn write_to_file(&self) -> Result<()> {
        self.current.read().dao.write_to_file_on_pending_changes()
    }

    /// Flush all pending items and clear the in-memory list.
    pub fn stop(&self) -> Result<()> {
        let current = self.current.read();
        current.dao.write_to_file_on_pending_changes()?;
        current.dao.reset(AuditItemList::clear);
        Ok(())
    }

    fn roll_over_on_date_change(&self) {
        let Some(base_dir) = self.base_dir.as_deref() else {
            return;
        };
        let today = (self.clock)();
        if self.current.read().date == today {
            return;
        }

        let mut current = self.current.write();
        if current.date == today {
            return;
        }
        if let Err(e) = current.dao.write_to_file_on_pending_changes() {
            error!("Failed to write audit items of {}: {e}", current.date);
        }
        let auto_save = current.dao.is_auto_save_enabled();
        match open_daily_file(Some(base_dir), today, self.max_items, auto_save) {
            Ok(dao) => *current = CurrentFile { date: today, dao },
            Err(e) => error!("Failed to switch to the audit file of {today}: {e}"),
        }
    }
}

impl AuditItemHandler for AuditManager {
    fn handle_audit_item(&self, item: AuditItem) {
        self.roll_over_on_date_change();
        if self.current.read().dao.modify(|list| list.add(item)).is_unchanged() {
            warn!("Audit item list is full, item dropped");
        }
    }
}

impl Drop for AuditManager {
    fn drop(&mut self) {
        if let Err(e) = self.current.get_mut().dao.write_to_file_on_pending_changes() {
            error!("Failed to write pending audit items: {e}");
        }
    }
}

fn open_daily_file(
    base_dir: Option<&Path>,
    date: NaiveDate,
    max_items: usize,
    auto_save: bool,
) -> Result<XmlDao<AuditItemList>> {
    let file = base_dir.map(|dir| dir.join(format!("{}.xml", date.format("%Y-%m-%d"))));
    if let Some(path) = &file {
        info!("Writing audit items to {}", path.display());
    }
    XmlDao::with_auto_save(file, AuditItemList::new(max_items), auto_save)
}
