//! Role definitions.

use crate::{
    change::Change,
    error::{Error, Result},
    id::{new_id, HasId},
    xml::{XmlConverter, XmlElement},
};
use std::collections::BTreeMap;

const ATTR_ID: &str = "id";
const ATTR_NAME: &str = "name";
const ELEMENT_CUSTOM: &str = "custom";

/// A named role. Roles carry no permissions themselves; they are granted to
/// users through user groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    /// Unique identifier for the role.
    id: String,
    /// Human-readable name of the role.
    name: String,
    /// Custom attributes associated with the role.
    custom_attributes: BTreeMap<String, String>,
}

impl Role {
    /// Create a new role with the given name and a generated ID.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(new_id(), name)
    }

    /// Create a new role with a specific ID.
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            custom_attributes: BTreeMap::new(),
        }
    }

    /// Add custom attributes to the role.
    pub fn with_custom_attributes(
        mut self,
        attributes: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.custom_attributes.extend(attributes);
        self
    }

    /// Get the role's unique identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the role's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a custom attribute.
    pub fn custom_attribute(&self, key: &str) -> Option<&str> {
        self.custom_attributes.get(key).map(String::as_str)
    }

    /// Get all custom attributes.
    pub fn custom_attributes(&self) -> &BTreeMap<String, String> {
        &self.custom_attributes
    }

    pub(crate) fn set_name(&mut self, name: &str) -> Change {
        if self.name == name {
            return Change::Unchanged;
        }
        self.name = name.to_string();
        Change::Changed
    }
}

impl HasId for Role {
    fn id(&self) -> &str {
        &self.id
    }
}

impl XmlConverter for Role {
    fn to_xml_element(&self, tag_name: &str) -> XmlElement {
        let mut element = XmlElement::new(tag_name)
            .with_attribute(ATTR_ID, self.id.as_str())
            .with_attribute(ATTR_NAME, self.name.as_str());
        write_custom_attributes(&mut element, &self.custom_attributes);
        element
    }

    fn from_xml_element(element: &XmlElement) -> Result<Self> {
        let id = element.required_attribute(ATTR_ID)?;
        let name = element.required_attribute(ATTR_NAME)?;
        let custom_attributes = read_custom_attributes(element)?;
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            custom_attributes,
        })
    }
}

/// Reads all `<custom id="..">value</custom>` children of an element.
pub(crate) fn read_custom_attributes(element: &XmlElement) -> Result<BTreeMap<String, String>> {
    element
        .child_elements(ELEMENT_CUSTOM)
        .map(|custom| {
            let key = custom
                .attribute(ATTR_ID)
                .ok_or_else(|| Error::malformed(format!("<{ELEMENT_CUSTOM}> lacks an ID")))?;
            Ok((key.to_string(), custom.text().to_string()))
        })
        .collect()
}

/// Appends one `<custom>` child per attribute.
pub(crate) fn write_custom_attributes(element: &mut XmlElement, attributes: &BTreeMap<String, String>) {
    for (key, value) in attributes {
        element
            .append_element(ELEMENT_CUSTOM)
            .set_attribute(ATTR_ID, key.as_str())
            .append_text(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_creation() {
        let role = Role::new("Reviewer");
        assert_eq!(role.name(), "Reviewer");
        assert!(!role.id().is_empty());
        assert_ne!(Role::new("Reviewer").id(), role.id());

        let role = Role::with_id("radmin", "Administrator");
        assert_eq!(role.id(), "radmin");
        assert!(role.custom_attributes().is_empty());
    }

    #[test]
    fn test_set_name() {
        let mut role = Role::with_id("r1", "a");
        assert!(role.set_name("a").is_unchanged());
        assert!(role.set_name("b").is_changed());
        assert_eq!(role.name(), "b");
    }

    #[test]
    fn test_xml_conversion() {
        let role = Role::with_id("r1", "Editor")
            .with_custom_attributes([("color".to_string(), "blue".to_string())]);
        let element = role.to_xml_element("role");

        assert_eq!(element.name(), "role");
        assert_eq!(element.attribute("id"), Some("r1"));
        assert_eq!(element.attribute("name"), Some("Editor"));
        assert_eq!(element.child_text("custom"), Some("blue"));

        let restored = Role::from_xml_element(&element).unwrap();
        assert_eq!(restored, role);
        assert_eq!(restored.custom_attribute("color"), Some("blue"));
    }

    #[test]
    fn test_missing_name_is_malformed() {
        let element = XmlElement::new("role").with_attribute("id", "r1");
        assert!(matches!(
            Role::from_xml_element(&element),
            Err(Error::MalformedDocument(_))
        ));
    }
}
