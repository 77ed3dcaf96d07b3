//! Role management with XML persistence.

use crate::{
    audit::{Auditor, ObjectType},
    change::Change,
    dao::{DaoData, XmlDao, DEFAULT_AUTO_SAVE_ENABLED},
    defaults::{ROLE_ADMINISTRATOR_ID, ROLE_ADMINISTRATOR_NAME, ROLE_USER_ID, ROLE_USER_NAME},
    error::{require_text, Error, Result},
    macros::impl_dao_controls,
    role::Role,
    xml::{XmlConverter, XmlDocument, XmlElement},
};
use log::info;
use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::Arc,
};

const ELEMENT_ROOT: &str = "roles";
const ELEMENT_ROLE: &str = "role";

#[derive(Default)]
struct RoleStore {
    roles: HashMap<String, Role>,
    create_defaults: bool,
}

impl RoleStore {
    fn add(&mut self, role: Role) -> Result<()> {
        if self.roles.contains_key(role.id()) {
            return Err(Error::id_in_use("role", role.id()));
        }
        self.roles.insert(role.id().to_string(), role);
        Ok(())
    }
}

impl DaoData for RoleStore {
    fn on_init(&mut self) -> Change {
        if !self.create_defaults {
            return Change::Unchanged;
        }
        for (id, name) in [
            (ROLE_ADMINISTRATOR_ID, ROLE_ADMINISTRATOR_NAME),
            (ROLE_USER_ID, ROLE_USER_NAME),
        ] {
            self.roles.insert(id.to_string(), Role::with_id(id, name));
        }
        Change::Changed
    }

    fn on_read(&mut self, doc: &XmlDocument) -> Result<Change> {
        for element in doc.document_element().child_elements(ELEMENT_ROLE) {
            self.add(Role::from_xml_element(element)?)?;
        }
        Ok(Change::Unchanged)
    }

    fn create_write_data(&self) -> XmlDocument {
        let mut roles: Vec<&Role> = self.roles.values().collect();
        roles.sort_by(|a, b| a.id().cmp(b.id()));

        let mut root = XmlElement::new(ELEMENT_ROOT);
        for role in roles {
            root.append_child(role.to_xml_element(ELEMENT_ROLE));
        }
        XmlDocument::new(root)
    }
}

/// Manages all roles.
pub struct RoleManager {
    dao: XmlDao<RoleStore>,
    auditor: Arc<dyn Auditor>,
}

impl RoleManager {
    /// Create a role manager bound to `file`. When the file does not exist
    /// yet and `create_defaults` is set, the default roles are created.
    pub fn new(file: Option<PathBuf>, create_defaults: bool, auditor: Arc<dyn Auditor>) -> Result<Self> {
        Self::with_auto_save(file, create_defaults, DEFAULT_AUTO_SAVE_ENABLED, auditor)
    }

    /// Like [`new`](Self::new) with an explicit auto-save setting, which
    /// also applies to the default roles.
    pub fn with_auto_save(
        file: Option<PathBuf>,
        create_defaults: bool,
        auto_save: bool,
        auditor: Arc<dyn Auditor>,
    ) -> Result<Self> {
        let store = RoleStore {
            create_defaults,
            ..Default::default()
        };
        Ok(Self {
            dao: XmlDao::with_auto_save(file, store, auto_save)?,
            auditor,
        })
    }

    /// Create a new role with a generated ID.
    pub fn create_new_role(&self, name: &str) -> Result<Role> {
        self.create_new_role_with_attributes(name, BTreeMap::new())
    }

    /// Create a new role with a generated ID and custom attributes.
    pub fn create_new_role_with_attributes(
        &self,
        name: &str,
        custom_attributes: BTreeMap<String, String>,
    ) -> Result<Role> {
        require_text(name, "name")?;
        self.add_role(Role::new(name).with_custom_attributes(custom_attributes), false)
    }

    /// Create a new role with a predefined ID.
    pub fn create_predefined_role(&self, id: &str, name: &str) -> Result<Role> {
        require_text(id, "id")?;
        require_text(name, "name")?;
        self.add_role(Role::with_id(id, name), true)
    }

    fn add_role(&self, role: Role, predefined: bool) -> Result<Role> {
        let result = self.dao.try_modify(|store| store.add(role.clone()));
        if let Err(e) = result {
            self.auditor
                .on_create_failure(ObjectType::ROLE, &[role.id(), "id-already-in-use"]);
            return Err(e);
        }

        info!("Created role '{}' ({})", role.name(), role.id());
        if predefined {
            self.auditor
                .on_create_success(ObjectType::ROLE, &[role.id(), "predefined-role", role.name()]);
        } else {
            self.auditor.on_create_success(ObjectType::ROLE, &[role.id(), role.name()]);
        }
        Ok(role)
    }

    /// Delete the role with the given ID.
    ///
    /// User group assignments are not touched; use
    /// [`AccessManager::delete_role`](crate::access_manager::AccessManager::delete_role)
    /// to remove them as well.
    pub fn delete_role(&self, role_id: &str) -> Change {
        let change = self.dao.modify(|store| store.roles.remove(role_id).is_some().into());
        if change.is_unchanged() {
            self.auditor
                .on_delete_failure(ObjectType::ROLE, &[role_id, "no-such-role-id"]);
            return Change::Unchanged;
        }

        info!("Deleted role {role_id}");
        self.auditor.on_delete_success(ObjectType::ROLE, &[role_id]);
        Change::Changed
    }

    /// Rename a role. An empty name is rejected.
    pub fn rename_role(&self, role_id: &str, new_name: &str) -> Change {
        if new_name.trim().is_empty() {
            self.auditor
                .on_modify_failure(ObjectType::ROLE, "name", &[role_id, "empty-name"]);
            return Change::Unchanged;
        }

        let mut found = false;
        let change = self.dao.modify(|store| match store.roles.get_mut(role_id) {
            Some(role) => {
                found = true;
                role.set_name(new_name)
            }
            None => Change::Unchanged,
        });
        if !found {
            self.auditor
                .on_modify_failure(ObjectType::ROLE, "name", &[role_id, "no-such-role-id"]);
            return Change::Unchanged;
        }
        if change.is_changed() {
            self.auditor
                .on_modify_success(ObjectType::ROLE, "name", &[role_id, new_name]);
        }
        change
    }

    /// Get a snapshot of the role with the given ID.
    pub fn get_role_of_id(&self, role_id: &str) -> Option<Role> {
        self.dao.read(|store| store.roles.get(role_id).cloned())
    }

    /// Get snapshots of all roles.
    pub fn get_all_roles(&self) -> Vec<Role> {
        self.dao.read(|store| store.roles.values().cloned().collect())
    }

    /// Number of roles.
    pub fn role_count(&self) -> usize {
        self.dao.read(|store| store.roles.len())
    }

    /// Whether a role with the given ID exists.
    pub fn contains_role_with_id(&self, role_id: &str) -> bool {
        self.dao.read(|store| store.roles.contains_key(role_id))
    }

    /// Whether every given ID resolves to a role. True for no IDs.
    pub fn contains_all_roles_with_id<'a>(&self, role_ids: impl IntoIterator<Item = &'a str>) -> bool {
        self.dao
            .read(|store| role_ids.into_iter().all(|id| store.roles.contains_key(id)))
    }
}

impl_dao_controls!(RoleManager);
