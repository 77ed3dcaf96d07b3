//! Property-based testing for the access system.
//!
//! These tests use the `proptest` crate to check the invariants of the
//! containers and managers under a wide variety of inputs.

#[cfg(test)]
mod tests {
    use crate::{
        audit::{AuditActionType, AuditItem, NoopAuditor},
        audit_manager::AuditItemList,
        bulk_import::BulkImportResult,
        password::{PasswordHashCreator, Sha256PasswordHashCreator},
        role::Role,
        role_manager::RoleManager,
        user_group::UserGroup,
        xml::{XmlConverter, XmlDocument, XmlElement},
    };
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use std::{collections::BTreeSet, sync::Arc};

    /// Generate valid identifier strings.
    fn identifier_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_-]{0,31}").unwrap()
    }

    /// Generate names containing characters that need escaping in XML.
    fn name_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9<>&'\" äöü]{1,24}")
            .unwrap()
            .prop_filter("Must contain text", |s| !s.trim().is_empty())
    }

    #[derive(Debug, Clone)]
    enum MembershipOp {
        Assign(String),
        Unassign(String),
    }

    fn membership_op_strategy() -> impl Strategy<Value = MembershipOp> {
        // A small pool of IDs makes repeated assignments likely
        let id = prop::sample::select(vec!["u1", "u2", "u3", "u4"]).prop_map(String::from);
        prop_oneof![
            id.clone().prop_map(MembershipOp::Assign),
            id.prop_map(MembershipOp::Unassign),
        ]
    }

    proptest! {
        #[test]
        fn prop_audit_list_never_exceeds_capacity(max_items in 1usize..20, count in 0usize..50) {
            let mut list = AuditItemList::new(max_items);
            for i in 0..count {
                let _ = list.add(AuditItem::new("u", AuditActionType::Create, true, i.to_string()));
            }

            prop_assert_eq!(list.len(), count.min(max_items));
            prop_assert_eq!(list.overflow_count(), count.saturating_sub(max_items) as u64);
            prop_assert_eq!(list.total_count(), count as u64);

            // The first items are kept, not the most recent ones
            let kept: Vec<String> = list.get_all_items().iter().map(|i| i.action().to_string()).collect();
            let expected: Vec<String> = (0..count.min(max_items)).map(|i| i.to_string()).collect();
            prop_assert_eq!(kept, expected);
        }

        #[test]
        fn prop_last_items_are_newest_first(
            seconds in prop::collection::vec(0i64..1_000_000, 0..30),
            count in 0usize..40
        ) {
            let mut list = AuditItemList::new(100);
            for s in &seconds {
                let dt = Utc.timestamp_opt(1_600_000_000 + s, 0).unwrap();
                let _ = list.add(AuditItem::with_date_time(dt, "u", AuditActionType::Modify, true, "x"));
            }

            let last = list.get_last_items(count);
            prop_assert_eq!(last.len(), count.min(seconds.len()));
            for pair in last.windows(2) {
                prop_assert!(pair[0].date_time() >= pair[1].date_time());
            }
            if let Some(first) = last.first() {
                let newest = seconds.iter().max().copied().unwrap_or_default();
                prop_assert_eq!(first.date_time().timestamp(), 1_600_000_000 + newest);
            }
        }

        #[test]
        fn prop_warning_cap(max_warnings in 0usize..10, count in 0usize..30) {
            let result: BulkImportResult<Role> = BulkImportResult::with_max_warnings(max_warnings);
            for i in 0..count {
                result.add_warning(format!("w{i}"));
            }
            prop_assert_eq!(result.get_warnings().len(), count.min(max_warnings));
            prop_assert_eq!(result.get_warnings_count(), count);
        }

        #[test]
        fn prop_membership_behaves_like_a_set(ops in prop::collection::vec(membership_op_strategy(), 0..40)) {
            let mut group = UserGroup::with_id("g", "Group");
            let mut model = BTreeSet::new();

            for op in ops {
                match op {
                    MembershipOp::Assign(id) => {
                        let expected = model.insert(id.clone());
                        prop_assert_eq!(group.assign_user(&id).is_changed(), expected);
                    }
                    MembershipOp::Unassign(id) => {
                        let expected = model.remove(&id);
                        prop_assert_eq!(group.unassign_user(&id).is_changed(), expected);
                    }
                }
            }
            prop_assert_eq!(group.user_ids(), &model);
        }

        #[test]
        fn prop_role_names_survive_xml(id in identifier_strategy(), name in name_strategy(), value in name_strategy()) {
            let role = Role::with_id(id, name).with_custom_attributes([("key".to_string(), value)]);

            let mut root = XmlElement::new("roles");
            root.append_child(role.to_xml_element("role"));
            let xml = XmlDocument::new(root).to_xml_string().unwrap();

            let doc = XmlDocument::parse(&xml).unwrap();
            let element = doc.document_element().first_child("role").unwrap();
            prop_assert_eq!(Role::from_xml_element(element).unwrap(), role);
        }

        #[test]
        fn prop_created_role_ids_are_unique(names in prop::collection::vec(name_strategy(), 1..20)) {
            let manager = RoleManager::new(None, false, Arc::new(NoopAuditor)).unwrap();
            let ids: BTreeSet<String> = names
                .iter()
                .map(|name| manager.create_new_role(name).unwrap().id().to_string())
                .collect();

            prop_assert_eq!(ids.len(), names.len());
            prop_assert_eq!(manager.role_count(), names.len());
            prop_assert!(manager.contains_all_roles_with_id(ids.iter().map(String::as_str)));
        }

        #[test]
        fn prop_sha256_verifies_only_the_same_password(password in ".{0,32}", other in ".{0,32}") {
            let creator = Sha256PasswordHashCreator;
            let hash = creator.create_password_hash(&password).unwrap();
            prop_assert!(creator.verify_password(&password, &hash).unwrap());
            prop_assert_eq!(creator.verify_password(&other, &hash).unwrap(), other == password);
        }
    }
}
