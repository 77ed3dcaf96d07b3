//! User accounts.

use crate::{
    change::Change,
    error::{Error, Result},
    id::{new_id, HasId},
    password::PasswordHash,
    role::{read_custom_attributes, write_custom_attributes},
    xml::{XmlConverter, XmlElement},
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

const ATTR_ID: &str = "id";
const ATTR_CREATION_DT: &str = "creationdt";
const ATTR_LAST_MOD_DT: &str = "lastmoddt";
const ATTR_DELETION_DT: &str = "deletiondt";
const ATTR_DESIRED_LOCALE: &str = "desiredlocale";
const ATTR_DELETED: &str = "deleted";
const ATTR_DISABLED: &str = "disabled";
const ATTR_ALGORITHM: &str = "algorithm";
const ELEMENT_LOGIN_NAME: &str = "loginname";
const ELEMENT_EMAIL_ADDRESS: &str = "emailaddress";
const ELEMENT_PASSWORD_HASH: &str = "passwordhash";
const ELEMENT_FIRST_NAME: &str = "firstname";
const ELEMENT_LAST_NAME: &str = "lastname";

/// The mutable profile data of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserData {
    /// Unique login name.
    pub login_name: String,
    /// Email address.
    pub email_address: String,
    /// Optional first name.
    pub first_name: Option<String>,
    /// Optional last name.
    pub last_name: Option<String>,
    /// Optional locale such as `de_AT`.
    pub desired_locale: Option<String>,
    /// Custom attributes.
    pub custom_attributes: BTreeMap<String, String>,
    /// Whether the user may not log in.
    pub disabled: bool,
}

impl UserData {
    /// Create user data with the two mandatory fields.
    pub fn new(login_name: impl Into<String>, email_address: impl Into<String>) -> Self {
        Self {
            login_name: login_name.into(),
            email_address: email_address.into(),
            ..Default::default()
        }
    }

    /// Set the first name.
    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    /// Set the last name.
    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    /// Set the desired locale.
    pub fn with_desired_locale(mut self, locale: impl Into<String>) -> Self {
        self.desired_locale = Some(locale.into());
        self
    }

    /// Add a custom attribute.
    pub fn with_custom_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    /// Set the disabled flag.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: String,
    creation_date_time: DateTime<Utc>,
    last_modification_date_time: Option<DateTime<Utc>>,
    deletion_date_time: Option<DateTime<Utc>>,
    data: UserData,
    password_hash: PasswordHash,
    deleted: bool,
}

impl User {
    /// Create a new user with a generated ID.
    pub fn new(data: UserData, password_hash: PasswordHash) -> Self {
        Self::with_id(new_id(), data, password_hash)
    }

    /// Create a new user with a specific ID.
    pub fn with_id(id: impl Into<String>, data: UserData, password_hash: PasswordHash) -> Self {
        Self {
            id: id.into(),
            creation_date_time: Utc::now(),
            last_modification_date_time: None,
            deletion_date_time: None,
            data,
            password_hash,
            deleted: false,
        }
    }

    /// Get the user's unique identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the user was created.
    pub fn creation_date_time(&self) -> DateTime<Utc> {
        self.creation_date_time
    }

    /// When the user was last modified, if ever.
    pub fn last_modification_date_time(&self) -> Option<DateTime<Utc>> {
        self.last_modification_date_time
    }

    /// When the user was deleted, if deleted.
    pub fn deletion_date_time(&self) -> Option<DateTime<Utc>> {
        self.deletion_date_time
    }

    /// The login name.
    pub fn login_name(&self) -> &str {
        &self.data.login_name
    }

    /// The email address.
    pub fn email_address(&self) -> &str {
        &self.data.email_address
    }

    /// The stored password hash.
    pub fn password_hash(&self) -> &PasswordHash {
        &self.password_hash
    }

    /// The first name.
    pub fn first_name(&self) -> Option<&str> {
        self.data.first_name.as_deref()
    }

    /// The last name.
    pub fn last_name(&self) -> Option<&str> {
        self.data.last_name.as_deref()
    }

    /// First and last name separated by a space, skipping missing parts.
    pub fn display_name(&self) -> String {
        [self.first_name(), self.last_name()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The desired locale.
    pub fn desired_locale(&self) -> Option<&str> {
        self.data.desired_locale.as_deref()
    }

    /// Get a custom attribute.
    pub fn custom_attribute(&self, key: &str) -> Option<&str> {
        self.data.custom_attributes.get(key).map(String::as_str)
    }

    /// All custom attributes.
    pub fn custom_attributes(&self) -> &BTreeMap<String, String> {
        &self.data.custom_attributes
    }

    /// The complete mutable profile.
    pub fn data(&self) -> &UserData {
        &self.data
    }

    /// Whether the user is soft deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Whether the user is disabled.
    pub fn is_disabled(&self) -> bool {
        self.data.disabled
    }

    /// Neither deleted nor disabled.
    pub fn is_active(&self) -> bool {
        !self.deleted && !self.data.disabled
    }

    pub(crate) fn set_data(&mut self, data: UserData) -> Change {
        if self.data == data {
            return Change::Unchanged;
        }
        self.data = data;
        Change::Changed
    }

    pub(crate) fn set_password_hash(&mut self, password_hash: PasswordHash) -> Change {
        if self.password_hash == password_hash {
            return Change::Unchanged;
        }
        self.password_hash = password_hash;
        Change::Changed
    }

    pub(crate) fn set_deleted(&mut self, deleted: bool) -> Change {
        if self.deleted == deleted {
            return Change::Unchanged;
        }
        self.deleted = deleted;
        self.deletion_date_time = deleted.then(Utc::now);
        Change::Changed
    }

    pub(crate) fn set_disabled(&mut self, disabled: bool) -> Change {
        if self.data.disabled == disabled {
            return Change::Unchanged;
        }
        self.data.disabled = disabled;
        Change::Changed
    }

    pub(crate) fn update_last_modified(&mut self) {
        self.last_modification_date_time = Some(Utc::now());
    }
}

impl HasId for User {
    fn id(&self) -> &str {
        &self.id
    }
}

fn parse_date_time(element: &XmlElement, name: &str) -> Result<Option<DateTime<Utc>>> {
    element
        .attribute(name)
        .map(|value| {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::malformed(format!("invalid '{name}' timestamp '{value}': {e}")))
        })
        .transpose()
}

impl XmlConverter for User {
    fn to_xml_element(&self, tag_name: &str) -> XmlElement {
        let mut element = XmlElement::new(tag_name)
            .with_attribute(ATTR_ID, self.id.as_str())
            .with_attribute(ATTR_CREATION_DT, self.creation_date_time.to_rfc3339());
        if let Some(dt) = self.last_modification_date_time {
            element.set_attribute(ATTR_LAST_MOD_DT, dt.to_rfc3339());
        }
        if let Some(dt) = self.deletion_date_time {
            element.set_attribute(ATTR_DELETION_DT, dt.to_rfc3339());
        }
        if let Some(locale) = &self.data.desired_locale {
            element.set_attribute(ATTR_DESIRED_LOCALE, locale.as_str());
        }
        element.set_attribute(ATTR_DELETED, self.deleted.to_string());
        element.set_attribute(ATTR_DISABLED, self.data.disabled.to_string());

        element
            .append_element(ELEMENT_LOGIN_NAME)
            .append_text(&self.data.login_name);
        element
            .append_element(ELEMENT_EMAIL_ADDRESS)
            .append_text(&self.data.email_address);
        element
            .append_element(ELEMENT_PASSWORD_HASH)
            .set_attribute(ATTR_ALGORITHM, self.password_hash.algorithm())
            .append_text(self.password_hash.hash());
        if let Some(first_name) = &self.data.first_name {
            element.append_element(ELEMENT_FIRST_NAME).append_text(first_name);
        }
        if let Some(last_name) = &self.data.last_name {
            element.append_element(ELEMENT_LAST_NAME).append_text(last_name);
        }
        write_custom_attributes(&mut element, &self.data.custom_attributes);
        element
    }

    fn from_xml_element(element: &XmlElement) -> Result<Self> {
        let id = element.required_attribute(ATTR_ID)?.to_string();
        // Old files may lack a creation timestamp
        let creation_date_time = parse_date_time(element, ATTR_CREATION_DT)?.unwrap_or_else(Utc::now);

        let password_element = element
            .first_child(ELEMENT_PASSWORD_HASH)
            .ok_or_else(|| Error::malformed(format!("user '{id}' has no password hash")))?;
        let password_hash = PasswordHash::new(
            password_element.required_attribute(ATTR_ALGORITHM)?,
            password_element.text(),
        );

        let data = UserData {
            login_name: element.child_text(ELEMENT_LOGIN_NAME).unwrap_or_default().to_string(),
            email_address: element
                .child_text(ELEMENT_EMAIL_ADDRESS)
                .unwrap_or_default()
                .to_string(),
            first_name: element.child_text(ELEMENT_FIRST_NAME).map(str::to_string),
            last_name: element.child_text(ELEMENT_LAST_NAME).map(str::to_string),
            desired_locale: element.attribute(ATTR_DESIRED_LOCALE).map(str::to_string),
            custom_attributes: read_custom_attributes(element)?,
            disabled: element.attribute(ATTR_DISABLED) == Some("true"),
        };

        Ok(Self {
            creation_date_time,
            last_modification_date_time: parse_date_time(element, ATTR_LAST_MOD_DT)?,
            deletion_date_time: parse_date_time(element, ATTR_DELETION_DT)?,
            data,
            password_hash,
            deleted: element.attribute(ATTR_DELETED) == Some("true"),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let data = UserData::new("jdoe", "jdoe@example.org")
            .with_first_name("John")
            .with_last_name("Doe")
            .with_desired_locale("en_US")
            .with_custom_attribute("department", "R&D");
        User::with_id("u1", data, PasswordHash::new("sha256", "abc"))
    }

    #[test]
    fn test_user_accessors() {
        let user = sample_user();
        assert_eq!(user.id(), "u1");
        assert_eq!(user.login_name(), "jdoe");
        assert_eq!(user.display_name(), "John Doe");
        assert!(user.is_active());
        assert!(user.last_modification_date_time().is_none());

        let anonymous = User::new(UserData::new("x", "x@y"), PasswordHash::new("a", "b"));
        assert_eq!(anonymous.display_name(), "");
    }

    #[test]
    fn test_soft_delete_sets_timestamp() {
        let mut user = sample_user();
        assert!(user.set_deleted(true).is_changed());
        assert!(user.is_deleted());
        assert!(user.deletion_date_time().is_some());
        assert!(user.set_deleted(true).is_unchanged());

        assert!(user.set_deleted(false).is_changed());
        assert!(user.deletion_date_time().is_none());
    }

    #[test]
    fn test_disable() {
        let mut user = sample_user();
        assert!(user.set_disabled(true).is_changed());
        assert!(!user.is_active());
        assert!(user.set_disabled(true).is_unchanged());
    }

    #[test]
    fn test_xml_conversion() {
        let mut user = sample_user();
        user.update_last_modified();
        let _ = user.set_deleted(true);

        let element = user.to_xml_element("user");
        assert_eq!(element.attribute("deleted"), Some("true"));
        assert_eq!(element.attribute("disabled"), Some("false"));
        assert_eq!(element.attribute("desiredlocale"), Some("en_US"));
        assert_eq!(
            element.first_child("passwordhash").and_then(|e| e.attribute("algorithm")),
            Some("sha256")
        );

        let restored = User::from_xml_element(&element).unwrap();
        assert_eq!(restored, user);
    }

    #[test]
    fn test_optional_elements_absent() {
        let user = User::with_id("u2", UserData::new("a", "a@b"), PasswordHash::new("x", "y"));
        let element = user.to_xml_element("user");
        assert!(element.first_child("firstname").is_none());
        assert!(element.attribute("lastmoddt").is_none());

        let restored = User::from_xml_element(&element).unwrap();
        assert_eq!(restored.first_name(), None);
        assert_eq!(restored.desired_locale(), None);
    }

    #[test]
    fn test_missing_password_hash_is_malformed() {
        let element = XmlElement::new("user").with_attribute("id", "u3");
        assert!(User::from_xml_element(&element).is_err());
    }
}
