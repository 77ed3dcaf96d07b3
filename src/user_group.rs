//! User groups link users to roles.

use crate::{
    change::Change,
    error::Result,
    id::{new_id, HasId},
    role::{read_custom_attributes, write_custom_attributes},
    xml::{XmlConverter, XmlElement},
};
use std::collections::{BTreeMap, BTreeSet};

const ATTR_ID: &str = "id";
const ATTR_NAME: &str = "name";
const ELEMENT_USER: &str = "user";
const ELEMENT_ROLE: &str = "role";

/// A named group of users. Every role assigned to the group is granted to
/// every user assigned to it. Users and roles are referenced by ID only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserGroup {
    id: String,
    name: String,
    custom_attributes: BTreeMap<String, String>,
    user_ids: BTreeSet<String>,
    role_ids: BTreeSet<String>,
}

impl UserGroup {
    /// Create a new user group with a generated ID.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(new_id(), name)
    }

    /// Create a new user group with a specific ID.
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            custom_attributes: BTreeMap::new(),
            user_ids: BTreeSet::new(),
            role_ids: BTreeSet::new(),
        }
    }

    /// Add custom attributes to the group.
    pub fn with_custom_attributes(
        mut self,
        attributes: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.custom_attributes.extend(attributes);
        self
    }

    /// Get the group's unique identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the group's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get all custom attributes.
    pub fn custom_attributes(&self) -> &BTreeMap<String, String> {
        &self.custom_attributes
    }

    /// IDs of all assigned users.
    pub fn user_ids(&self) -> &BTreeSet<String> {
        &self.user_ids
    }

    /// IDs of all assigned roles.
    pub fn role_ids(&self) -> &BTreeSet<String> {
        &self.role_ids
    }

    /// Whether at least one user is assigned.
    pub fn has_users(&self) -> bool {
        !self.user_ids.is_empty()
    }

    /// Whether at least one role is assigned.
    pub fn has_roles(&self) -> bool {
        !self.role_ids.is_empty()
    }

    /// Whether the user is assigned.
    pub fn contains_user_id(&self, user_id: &str) -> bool {
        self.user_ids.contains(user_id)
    }

    /// Whether the role is assigned.
    pub fn contains_role_id(&self, role_id: &str) -> bool {
        self.role_ids.contains(role_id)
    }

    pub(crate) fn set_name(&mut self, name: &str) -> Change {
        if self.name == name {
            return Change::Unchanged;
        }
        self.name = name.to_string();
        Change::Changed
    }

    pub(crate) fn assign_user(&mut self, user_id: &str) -> Change {
        self.user_ids.insert(user_id.to_string()).into()
    }

    pub(crate) fn unassign_user(&mut self, user_id: &str) -> Change {
        self.user_ids.remove(user_id).into()
    }

    pub(crate) fn assign_role(&mut self, role_id: &str) -> Change {
        self.role_ids.insert(role_id.to_string()).into()
    }

    pub(crate) fn unassign_role(&mut self, role_id: &str) -> Change {
        self.role_ids.remove(role_id).into()
    }

    /// Drop every user and role reference rejected by the predicates.
    pub(crate) fn retain_references(
        &mut self,
        user_exists: &dyn Fn(&str) -> bool,
        role_exists: &dyn Fn(&str) -> bool,
    ) -> Change {
        let before = (self.user_ids.len(), self.role_ids.len());
        self.user_ids.retain(|id| user_exists(id.as_str()));
        self.role_ids.retain(|id| role_exists(id.as_str()));
        (before != (self.user_ids.len(), self.role_ids.len())).into()
    }
}

impl HasId for UserGroup {
    fn id(&self) -> &str {
        &self.id
    }
}

impl XmlConverter for UserGroup {
    fn to_xml_element(&self, tag_name: &str) -> XmlElement {
        let mut element = XmlElement::new(tag_name)
            .with_attribute(ATTR_ID, self.id.as_str())
            .with_attribute(ATTR_NAME, self.name.as_str());
        write_custom_attributes(&mut element, &self.custom_attributes);
        for user_id in &self.user_ids {
            element.append_element(ELEMENT_USER).set_attribute(ATTR_ID, user_id.as_str());
        }
        for role_id in &self.role_ids {
            element.append_element(ELEMENT_ROLE).set_attribute(ATTR_ID, role_id.as_str());
        }
        element
    }

    fn from_xml_element(element: &XmlElement) -> Result<Self> {
        let mut group = UserGroup::with_id(
            element.required_attribute(ATTR_ID)?,
            element.required_attribute(ATTR_NAME)?,
        );
        group.custom_attributes = read_custom_attributes(element)?;
        for user in element.child_elements(ELEMENT_USER) {
            group.user_ids.insert(user.required_attribute(ATTR_ID)?.to_string());
        }
        for role in element.child_elements(ELEMENT_ROLE) {
            group.role_ids.insert(role.required_attribute(ATTR_ID)?.to_string());
        }
        Ok(group)
    }
}
