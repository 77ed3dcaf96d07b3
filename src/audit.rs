//! Audit events and auditors.
//!
//! Managers report every mutation to an [`Auditor`]. The [`ItemAuditor`]
//! turns events into immutable [`AuditItem`]s stamped with the current time
//! and user, and hands them to an [`AuditItemHandler`] such as the
//! [`AuditManager`](crate::audit_manager::AuditManager).

use crate::{
    defaults::{GUEST_USER_ID, TYPE_ROLE, TYPE_USER, TYPE_USER_GROUP},
    error::{Error, Result},
    xml::{XmlConverter, XmlElement},
};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::{fmt, sync::Arc};

/// The kind of action an audit item records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditActionType {
    /// An object was created.
    Create,
    /// An object was modified.
    Modify,
    /// An object was deleted.
    Delete,
    /// A deleted object was restored.
    Undelete,
    /// Something was executed, such as a login.
    Execute,
}

impl AuditActionType {
    /// The identifier used in persisted audit items.
    pub fn id(self) -> &'static str {
        match self {
            AuditActionType::Create => "create",
            AuditActionType::Modify => "modify",
            AuditActionType::Delete => "delete",
            AuditActionType::Undelete => "undelete",
            AuditActionType::Execute => "execute",
        }
    }

    /// Resolve an identifier created by [`id`](Self::id).
    pub fn from_id(id: &str) -> Option<Self> {
        [
            AuditActionType::Create,
            AuditActionType::Modify,
            AuditActionType::Delete,
            AuditActionType::Undelete,
            AuditActionType::Execute,
        ]
        .into_iter()
        .find(|t| t.id() == id)
    }
}

impl fmt::Display for AuditActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// The type of object an audit event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectType(&'static str);

impl ObjectType {
    /// Users.
    pub const USER: ObjectType = ObjectType(TYPE_USER);
    /// Roles.
    pub const ROLE: ObjectType = ObjectType(TYPE_ROLE);
    /// User groups.
    pub const USER_GROUP: ObjectType = ObjectType(TYPE_USER_GROUP);

    /// Create a custom object type.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The object type name.
    pub fn name(self) -> &'static str {
        self.0
    }
}

/// A single immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditItem {
    date_time: DateTime<Utc>,
    user_id: String,
    action_type: AuditActionType,
    success: bool,
    action: String,
}

impl AuditItem {
    /// Create an item stamped with the current time.
    pub fn new(
        user_id: impl Into<String>,
        action_type: AuditActionType,
        success: bool,
        action: impl Into<String>,
    ) -> Self {
        Self::with_date_time(Utc::now(), user_id, action_type, success, action)
    }

    /// Create an item with an explicit timestamp.
    pub fn with_date_time(
        date_time: DateTime<Utc>,
        user_id: impl Into<String>,
        action_type: AuditActionType,
        success: bool,
        action: impl Into<String>,
    ) -> Self {
        Self {
            date_time,
            user_id: user_id.into(),
            action_type,
            success,
            action: action.into(),
        }
    }

    /// When the action happened.
    pub fn date_time(&self) -> DateTime<Utc> {
        self.date_time
    }

    /// The acting user, or the guest user ID.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The kind of action.
    pub fn action_type(&self) -> AuditActionType {
        self.action_type
    }

    /// Whether the action succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// The action description.
    pub fn action(&self) -> &str {
        &self.action
    }
}

const ATTR_DT: &str = "dt";
const ATTR_USER_ID: &str = "userid";
const ATTR_TYPE: &str = "type";
const ATTR_SUCCESS: &str = "success";

impl XmlConverter for AuditItem {
    fn to_xml_element(&self, tag_name: &str) -> XmlElement {
        let mut element = XmlElement::new(tag_name)
            .with_attribute(ATTR_DT, self.date_time.to_rfc3339())
            .with_attribute(ATTR_USER_ID, self.user_id.as_str())
            .with_attribute(ATTR_TYPE, self.action_type.id())
            .with_attribute(ATTR_SUCCESS, self.success.to_string());
        element.append_text(&self.action);
        element
    }

    fn from_xml_element(element: &XmlElement) -> Result<Self> {
        let date_time = DateTime::parse_from_rfc3339(element.required_attribute(ATTR_DT)?)
            .map_err(|e| Error::malformed(format!("invalid audit timestamp: {e}")))?
            .with_timezone(&Utc);
        let type_id = element.required_attribute(ATTR_TYPE)?;
        let action_type = AuditActionType::from_id(type_id)
            .ok_or_else(|| Error::malformed(format!("unknown audit action type '{type_id}'")))?;
        Ok(Self {
            date_time,
            user_id: element.required_attribute(ATTR_USER_ID)?.to_string(),
            action_type,
            success: element.attribute(ATTR_SUCCESS) == Some("true"),
            action: element.text().to_string(),
        })
    }
}

/// Provides the ID of the user on whose behalf the current code runs.
pub trait CurrentUserIdProvider: Send + Sync {
    /// The current user ID, or `None` if nobody is logged in.
    fn current_user_id(&self) -> Option<String>;
}

impl<F> CurrentUserIdProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_user_id(&self) -> Option<String> {
        self()
    }
}

/// A provider that never knows a user, so every item is attributed to the
/// guest user.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCurrentUser;

impl CurrentUserIdProvider for NoCurrentUser {
    fn current_user_id(&self) -> Option<String> {
        None
    }
}

/// A single audit event as reported by a manager.
#[derive(Debug, Clone, Copy)]
pub struct AuditEvent<'a> {
    /// The kind of action.
    pub action_type: AuditActionType,
    /// Whether the action succeeded.
    pub success: bool,
    /// The affected object type, if any.
    pub object_type: Option<ObjectType>,
    /// What exactly was done, if the action type alone is not enough.
    pub what: Option<&'a str>,
    /// Additional arguments, usually the object ID first.
    pub args: &'a [&'a str],
}

impl AuditEvent<'_> {
    /// `type(arg1,arg2)` or `type(what,arg1,..)`.
    pub fn legacy_action(&self) -> String {
        let head = match (self.object_type, self.what) {
            (Some(object_type), _) => object_type.name(),
            (None, Some(what)) => what,
            (None, None) => "",
        };

        let mut parts: Vec<&str> = Vec::with_capacity(self.args.len() + 1);
        if let (Some(_), Some(what)) = (self.object_type, self.what) {
            parts.push(what);
        }
        parts.extend_from_slice(self.args);

        if parts.is_empty() {
            head.to_string()
        } else {
            format!("{head}({})", parts.join(","))
        }
    }

    /// `{"type":..,"what":..,"args":[..]}`.
    pub fn json_action(&self) -> String {
        #[derive(Serialize)]
        struct Action<'a> {
            #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
            object_type: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            what: Option<&'a str>,
            args: &'a [&'a str],
        }

        let action = Action {
            object_type: self.object_type.map(ObjectType::name),
            what: self.what,
            args: self.args,
        };
        serde_json::to_string(&action).unwrap_or_else(|_| self.legacy_action())
    }
}

/// Receives audit events.
///
/// Only [`on_event`](Self::on_event) is required; the remaining methods
/// describe the individual event kinds.
pub trait Auditor: Send + Sync {
    /// Handle a single event.
    fn on_event(&self, event: AuditEvent<'_>);

    /// An object was created.
    fn on_create_success(&self, object_type: ObjectType, args: &[&str]) {
        self.on_event(object_event(AuditActionType::Create, true, object_type, None, args));
    }

    /// Creating an object failed.
    fn on_create_failure(&self, object_type: ObjectType, args: &[&str]) {
        self.on_event(object_event(AuditActionType::Create, false, object_type, None, args));
    }

    /// An object was modified.
    fn on_modify_success(&self, object_type: ObjectType, what: &str, args: &[&str]) {
        self.on_event(object_event(AuditActionType::Modify, true, object_type, Some(what), args));
    }

    /// Modifying an object failed.
    fn on_modify_failure(&self, object_type: ObjectType, what: &str, args: &[&str]) {
        self.on_event(object_event(AuditActionType::Modify, false, object_type, Some(what), args));
    }

    /// An object was deleted.
    fn on_delete_success(&self, object_type: ObjectType, args: &[&str]) {
        self.on_event(object_event(AuditActionType::Delete, true, object_type, None, args));
    }

    /// Deleting an object failed.
    fn on_delete_failure(&self, object_type: ObjectType, args: &[&str]) {
        self.on_event(object_event(AuditActionType::Delete, false, object_type, None, args));
    }

    /// A deleted object was restored.
    fn on_undelete_success(&self, object_type: ObjectType, args: &[&str]) {
        self.on_event(object_event(AuditActionType::Undelete, true, object_type, None, args));
    }

    /// Restoring a deleted object failed.
    fn on_undelete_failure(&self, object_type: ObjectType, args: &[&str]) {
        self.on_event(object_event(AuditActionType::Undelete, false, object_type, None, args));
    }

    /// Something not bound to an object was executed.
    fn on_execute_success(&self, what: &str, args: &[&str]) {
        self.on_event(execute_event(true, what, args));
    }

    /// Executing something not bound to an object failed.
    fn on_execute_failure(&self, what: &str, args: &[&str]) {
        self.on_event(execute_event(false, what, args));
    }

    /// Something was executed on an object.
    fn on_execute_object_success(&self, object_type: ObjectType, what: &str, args: &[&str]) {
        self.on_event(object_event(AuditActionType::Execute, true, object_type, Some(what), args));
    }

    /// Executing something on an object failed.
    fn on_execute_object_failure(&self, object_type: ObjectType, what: &str, args: &[&str]) {
        self.on_event(object_event(AuditActionType::Execute, false, object_type, Some(what), args));
    }
}

fn object_event<'a>(
    action_type: AuditActionType,
    success: bool,
    object_type: ObjectType,
    what: Option<&'a str>,
    args: &'a [&'a str],
) -> AuditEvent<'a> {
    AuditEvent {
        action_type,
        success,
        object_type: Some(object_type),
        what,
        args,
    }
}

fn execute_event<'a>(success: bool, what: &'a str, args: &'a [&'a str]) -> AuditEvent<'a> {
    AuditEvent {
        action_type: AuditActionType::Execute,
        success,
        object_type: None,
        what: Some(what),
        args,
    }
}

impl<A: Auditor + ?Sized> Auditor for Arc<A> {
    fn on_event(&self, event: AuditEvent<'_>) {
        (**self).on_event(event)
    }
}

/// Consumes the audit items created by an [`ItemAuditor`].
pub trait AuditItemHandler: Send + Sync {
    /// Store or forward one item.
    fn handle_audit_item(&self, item: AuditItem);
}

impl<H: AuditItemHandler + ?Sized> AuditItemHandler for Arc<H> {
    fn handle_audit_item(&self, item: AuditItem) {
        (**self).handle_audit_item(item)
    }
}

/// How an [`ItemAuditor`] renders the action of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditFormat {
    /// A JSON object with `type`, `what` and `args`.
    #[default]
    Json,
    /// `type(arg1,arg2)` strings.
    Legacy,
}

/// An auditor that builds [`AuditItem`]s and forwards them to a handler.
pub struct ItemAuditor<H> {
    handler: H,
    user_id_provider: Arc<dyn CurrentUserIdProvider>,
    format: AuditFormat,
}

impl<H: AuditItemHandler> ItemAuditor<H> {
    /// Create an auditor writing JSON actions.
    pub fn new(handler: H, user_id_provider: Arc<dyn CurrentUserIdProvider>) -> Self {
        Self {
            handler,
            user_id_provider,
            format: AuditFormat::default(),
        }
    }

    /// Set the action format.
    pub fn with_format(mut self, format: AuditFormat) -> Self {
        self.format = format;
        self
    }

    /// Get the handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: AuditItemHandler> Auditor for ItemAuditor<H> {
    fn on_event(&self, event: AuditEvent<'_>) {
        let action = match self.format {
            AuditFormat::Json => event.json_action(),
            AuditFormat::Legacy => event.legacy_action(),
        };
        let user_id = self
            .user_id_provider
            .current_user_id()
            .unwrap_or_else(|| GUEST_USER_ID.to_string());
        self.handler
            .handle_audit_item(AuditItem::new(user_id, event.action_type, event.success, action));
    }
}

/// An auditor writing every event to the `audit` log target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingAuditor;

impl Auditor for LoggingAuditor {
    fn on_event(&self, event: AuditEvent<'_>) {
        info!(
            target: "audit",
            "{}.{}({})",
            event.action_type,
            if event.success { "success" } else { "failure" },
            event.legacy_action()
        );
    }
}

/// An auditor that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditor;

impl Auditor for NoopAuditor {
    fn on_event(&self, _event: AuditEvent<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<AuditItem>>);

    impl AuditItemHandler for Collect {
        fn handle_audit_item(&self, item: AuditItem) {
            self.0.lock().push(item);
        }
    }

    fn auditor(format: AuditFormat) -> ItemAuditor<Arc<Collect>> {
        ItemAuditor::new(Arc::new(Collect::default()), Arc::new(NoCurrentUser)).with_format(format)
    }

    #[test]
    fn test_action_type_ids() {
        for t in [
            AuditActionType::Create,
            AuditActionType::Modify,
            AuditActionType::Delete,
            AuditActionType::Undelete,
            AuditActionType::Execute,
        ] {
            assert_eq!(AuditActionType::from_id(t.id()), Some(t));
        }
        assert_eq!(AuditActionType::from_id("remove"), None);
    }

    #[test]
    fn test_legacy_format() {
        let auditor = auditor(AuditFormat::Legacy);
        auditor.on_create_success(ObjectType::ROLE, &["r1", "Editor"]);
        auditor.on_modify_failure(ObjectType::USER, "password", &["u1"]);
        auditor.on_delete_success(ObjectType::USER_GROUP, &[]);
        auditor.on_execute_success("login", &["u1"]);

        let items = auditor.handler().0.lock().clone();
        let actions: Vec<&str> = items.iter().map(AuditItem::action).collect();
        assert_eq!(
            actions,
            vec!["role(r1,Editor)", "user(password,u1)", "usergroup", "login(u1)"]
        );
        assert!(items[0].is_success());
        assert!(!items[1].is_success());
        assert_eq!(items[1].action_type(), AuditActionType::Modify);
        assert_eq!(items[3].action_type(), AuditActionType::Execute);
    }

    #[test]
    fn test_json_format() {
        let auditor = auditor(AuditFormat::Json);
        auditor.on_modify_success(ObjectType::ROLE, "name", &["r1", "New"]);
        auditor.on_execute_failure("logout", &[]);

        let items = auditor.handler().0.lock().clone();
        let first: serde_json::Value = serde_json::from_str(items[0].action()).unwrap();
        assert_eq!(first["type"], "role");
        assert_eq!(first["what"], "name");
        assert_eq!(first["args"], serde_json::json!(["r1", "New"]));

        let second: serde_json::Value = serde_json::from_str(items[1].action()).unwrap();
        assert!(second.get("type").is_none());
        assert_eq!(second["what"], "logout");
    }

    #[test]
    fn test_user_id_from_provider() {
        let auditor = auditor(AuditFormat::Legacy);
        auditor.on_create_success(ObjectType::USER, &["u1"]);
        assert_eq!(auditor.handler().0.lock()[0].user_id(), GUEST_USER_ID);

        let handler = Arc::new(Collect::default());
        let provider: Arc<dyn CurrentUserIdProvider> = Arc::new(|| Some("admin".to_string()));
        let auditor = ItemAuditor::new(handler.clone(), provider);
        auditor.on_undelete_success(ObjectType::USER, &["u1"]);
        assert_eq!(handler.0.lock()[0].user_id(), "admin");
        assert_eq!(handler.0.lock()[0].action_type(), AuditActionType::Undelete);
    }

    #[test]
    fn test_audit_item_xml_conversion() {
        let item = AuditItem::new("admin", AuditActionType::Delete, false, "role(r1)");
        let element = item.to_xml_element("item");
        assert_eq!(element.attribute("type"), Some("delete"));
        assert_eq!(element.attribute("success"), Some("false"));
        assert_eq!(element.text(), "role(r1)");

        let restored = AuditItem::from_xml_element(&element).unwrap();
        assert_eq!(restored, item);
    }
}
