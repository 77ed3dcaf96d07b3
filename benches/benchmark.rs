use access_system::{
    audit::{AuditActionType, AuditItem, NoopAuditor},
    audit_manager::AuditItemList,
    config::SecurityConfig,
    defaults::*,
    lock::LockManager,
    password::Sha256PasswordHashCreator,
    AccessManager,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

fn access_manager() -> AccessManager {
    let config = SecurityConfig {
        password_hash_algorithm: Sha256PasswordHashCreator::ALGORITHM.to_string(),
        ..Default::default()
    };
    AccessManager::new(&config, Arc::new(NoopAuditor)).unwrap()
}

fn bench_has_user_role(c: &mut Criterion) {
    let access = access_manager();

    c.bench_function("has_user_role", |b| {
        b.iter(|| black_box(access.has_user_role(USER_ADMINISTRATOR_ID, ROLE_ADMINISTRATOR_ID)))
    });
}

fn bench_role_lookup_with_many_groups(c: &mut Criterion) {
    let access = access_manager();

    // A user spread over many groups, each granting one role
    for i in 0..100 {
        let role = access.create_new_role(&format!("role{i}")).unwrap();
        let group = access.create_new_user_group(&format!("group{i}")).unwrap();
        let _ = access.assign_role_to_user_group(group.id(), role.id());
        let _ = access.assign_user_to_user_group(group.id(), USER_USER_ID);
    }

    c.bench_function("get_all_user_roles", |b| {
        b.iter(|| black_box(access.get_all_user_roles(USER_USER_ID)))
    });
}

fn bench_password_check(c: &mut Criterion) {
    let access = access_manager();

    c.bench_function("password_check_sha256", |b| {
        b.iter(|| {
            black_box(access.are_user_id_and_password_valid(USER_USER_ID, USER_USER_PASSWORD))
        })
    });
}

fn bench_assignment(c: &mut Criterion) {
    let access = access_manager();

    c.bench_function("assign_unassign_user", |b| {
        b.iter(|| {
            let _ = access.assign_user_to_user_group(USERGROUP_GUESTS_ID, "visitor");
            let _ = access.unassign_user_from_user_group(USERGROUP_GUESTS_ID, "visitor");
        })
    });
}

fn bench_audit_list(c: &mut Criterion) {
    let mut list = AuditItemList::new(10_000);
    for i in 0..10_000 {
        let _ = list.add(AuditItem::new("user", AuditActionType::Modify, true, i.to_string()));
    }

    c.bench_function("audit_last_items", |b| {
        b.iter(|| black_box(list.get_last_items(20)))
    });
}

fn bench_locking(c: &mut Criterion) {
    let locks = LockManager::default();

    c.bench_function("lock_unlock", |b| {
        b.iter(|| {
            let _ = locks.lock_object("doc1", "user");
            let _ = locks.unlock_object("user", "doc1");
        })
    });
}

criterion_group!(
    benches,
    bench_has_user_role,
    bench_role_lookup_with_many_groups,
    bench_password_check,
    bench_assignment,
    bench_audit_list,
    bench_locking
);
criterion_main!(benches);
