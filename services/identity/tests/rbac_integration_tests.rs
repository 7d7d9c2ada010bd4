//! Integration tests for the privilege/role/user graph.

use identity_service::rbac::{
    NewPrivilege, NewRole, NewUser, PrivilegeUpdate, RbacGraph, RoleUpdate, UserUpdate,
};
use identity_service::IdentityError;

fn labels<'a>(items: impl IntoIterator<Item = &'a String>) -> Vec<&'a str> {
    let mut out: Vec<&str> = items.into_iter().map(String::as_str).collect();
    out.sort_unstable();
    out
}

fn violation(err: IdentityError) -> String {
    match err {
        IdentityError::ConstraintViolation(msg) => msg,
        other => panic!("expected constraint violation, got {other:?}"),
    }
}

/// A new default privilege lands in every existing role.
#[tokio::test]
async fn test_default_privilege_propagates_to_roles() {
    let rbac = RbacGraph::in_memory();
    let base = rbac.privileges.create(NewPrivilege::new("base", false)).await.unwrap();
    let r1 = rbac.roles.create(NewRole::new("r1", false, Some(vec![base.id.clone()]))).await.unwrap();
    let r2 = rbac.roles.create(NewRole::new("r2", false, Some(vec![base.id.clone()]))).await.unwrap();

    let p = rbac.privileges.create(NewPrivilege::new("P", true)).await.unwrap();
    assert_eq!(p.label, "p");

    for role_id in [&r1.id, &r2.id] {
        let role = rbac.roles.find_by_id(role_id).await.unwrap();
        assert!(role.privileges.iter().any(|x| x.id == p.id));
    }
}

/// Demotion and deletion detach a privilege from every role.
#[tokio::test]
async fn test_privilege_demotion_and_deletion() {
    let rbac = RbacGraph::in_memory();
    let base = rbac.privileges.create(NewPrivilege::new("base", false)).await.unwrap();
    let role = rbac.roles.create(NewRole::new("r1", false, Some(vec![base.id.clone()]))).await.unwrap();
    let p = rbac.privileges.create(NewPrivilege::new("audit", true)).await.unwrap();
    assert_eq!(rbac.roles.find_by_id(&role.id).await.unwrap().privileges.len(), 2);

    rbac.privileges
        .update(&p.id, PrivilegeUpdate::new("audit", false))
        .await
        .unwrap();
    let after_demotion = rbac.roles.find_by_id(&role.id).await.unwrap();
    assert!(after_demotion.privileges.iter().all(|x| x.id != p.id));

    rbac.privileges
        .update(&p.id, PrivilegeUpdate::new("audit", true))
        .await
        .unwrap();
    assert_eq!(rbac.roles.find_by_id(&role.id).await.unwrap().privileges.len(), 2);

    rbac.privileges.delete_by_id(&p.id).await.unwrap();
    assert!(!rbac.privileges.exists_by_id(&p.id).await);
    let after_delete = rbac.roles.find_by_id(&role.id).await.unwrap();
    assert_eq!(labels(after_delete.privileges.iter().map(|x| &x.label)), vec!["base"]);
}

/// New roles receive the default privileges plus the requested ones.
#[tokio::test]
async fn test_role_create_merges_defaults() {
    let rbac = RbacGraph::in_memory();
    rbac.privileges.create(NewPrivilege::new("read", true)).await.unwrap();
    let write = rbac.privileges.create(NewPrivilege::new("write", false)).await.unwrap();

    let role = rbac
        .roles
        .create(NewRole::new("editor", false, Some(vec![write.id.clone(), "unknown".to_string()])))
        .await
        .unwrap();
    assert_eq!(labels(role.privileges.iter().map(|p| &p.label)), vec!["read", "write"]);

    let defaults_only = rbac.roles.create(NewRole::new("viewer", false, None)).await.unwrap();
    assert_eq!(labels(defaults_only.privileges.iter().map(|p| &p.label)), vec!["read"]);
}

/// A role needs at least one privilege.
#[tokio::test]
async fn test_role_requires_privileges() {
    let rbac = RbacGraph::in_memory();
    let err = rbac.roles.create(NewRole::new("empty", false, None)).await.unwrap_err();
    assert_eq!(violation(err), "privileges must not be empty");
    assert_eq!(rbac.roles.count().await, 0);

    let p = rbac.privileges.create(NewPrivilege::new("read", false)).await.unwrap();
    let role = rbac.roles.create(NewRole::new("r", false, Some(vec![p.id.clone()]))).await.unwrap();

    let err = rbac
        .roles
        .update(
            &role.id,
            RoleUpdate {
                label: "r".to_string(),
                is_default: false,
                privileges: vec![],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(violation(err), "privileges must not be empty");
    assert_eq!(rbac.roles.find_by_id(&role.id).await.unwrap(), role);
}

/// Role update replaces the privilege set with the known requested ids.
#[tokio::test]
async fn test_role_update_replaces_privileges() {
    let rbac = RbacGraph::in_memory();
    let read = rbac.privileges.create(NewPrivilege::new("read", false)).await.unwrap();
    let write = rbac.privileges.create(NewPrivilege::new("write", false)).await.unwrap();
    let role = rbac.roles.create(NewRole::new("r", false, Some(vec![read.id.clone()]))).await.unwrap();

    let updated = rbac
        .roles
        .update(
            &role.id,
            RoleUpdate {
                label: "Renamed".to_string(),
                is_default: false,
                privileges: vec![write.id.clone(), "ghost".to_string()],
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.label, "renamed");
    assert_eq!(labels(updated.privileges.iter().map(|p| &p.label)), vec!["write"]);
}

/// Labels are unique regardless of case.
#[tokio::test]
async fn test_label_uniqueness_is_case_insensitive() {
    let rbac = RbacGraph::in_memory();
    rbac.privileges.create(NewPrivilege::new("Admin", false)).await.unwrap();

    let err = rbac.privileges.create(NewPrivilege::new("admin", false)).await.unwrap_err();
    assert_eq!(violation(err), "label must be unique");
    assert_eq!(rbac.privileges.count().await, 1);
}

/// Every violated rule is reported, sorted.
#[tokio::test]
async fn test_violations_are_aggregated() {
    let rbac = RbacGraph::in_memory();

    let err = rbac.roles.create(NewRole::new("", false, None)).await.unwrap_err();
    assert_eq!(
        violation(err),
        "label must not be blank. label must not be empty. privileges must not be empty"
    );

    let err = rbac.users.create(NewUser::new("", " ", None)).await.unwrap_err();
    assert_eq!(
        violation(err),
        "email must not be blank. email must not be empty. password must not be blank or empty"
    );
}

/// A batch colliding with itself creates nothing.
#[tokio::test]
async fn test_create_many_rejects_batch_collisions() {
    let rbac = RbacGraph::in_memory();
    let err = rbac
        .privileges
        .create_many(vec![
            NewPrivilege::new("read", false),
            NewPrivilege::new("READ", false),
            NewPrivilege::new("write", false),
        ])
        .await
        .unwrap_err();
    assert_eq!(violation(err), "label must be unique");
    assert_eq!(rbac.privileges.count().await, 0);

    let created = rbac
        .privileges
        .create_many(vec![NewPrivilege::new("read", false), NewPrivilege::new("write", true)])
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(rbac.privileges.find_all_defaults().await.len(), 1);
}

/// Default roles propagate to users in both directions.
#[tokio::test]
async fn test_default_role_propagates_to_users() {
    let rbac = RbacGraph::in_memory();
    let p = rbac.privileges.create(NewPrivilege::new("read", false)).await.unwrap();
    let user = rbac.users.create(NewUser::new("a@mail.com", "secret1", None)).await.unwrap();
    assert!(user.roles.is_empty());

    let role = rbac
        .roles
        .create(NewRole::new("member", true, Some(vec![p.id.clone()])))
        .await
        .unwrap();
    let user = rbac.users.find_by_id(&user.id).await.unwrap();
    assert_eq!(labels(user.roles.iter().map(|r| &r.label)), vec!["member"]);

    let later = rbac.users.create(NewUser::new("b@mail.com", "secret2", None)).await.unwrap();
    assert_eq!(labels(later.roles.iter().map(|r| &r.label)), vec!["member"]);

    rbac.roles
        .update(
            &role.id,
            RoleUpdate {
                label: "member".to_string(),
                is_default: false,
                privileges: vec![p.id.clone()],
            },
        )
        .await
        .unwrap();
    assert!(rbac.users.find_by_id(&user.id).await.unwrap().roles.is_empty());
    assert!(rbac.roles.find_all_defaults().await.is_empty());
}

/// Deleting a role keeps its privileges and users.
#[tokio::test]
async fn test_role_delete_cascades_join_rows_only() {
    let rbac = RbacGraph::in_memory();
    let p = rbac.privileges.create(NewPrivilege::new("read", false)).await.unwrap();
    let role = rbac.roles.create(NewRole::new("r", false, Some(vec![p.id.clone()]))).await.unwrap();
    let user = rbac
        .users
        .create(NewUser::new("a@mail.com", "secret", Some(vec![role.id.clone()])))
        .await
        .unwrap();
    assert_eq!(user.roles.len(), 1);

    rbac.roles.delete_by_id(&role.id).await.unwrap();

    assert!(rbac.privileges.exists_by_id(&p.id).await);
    assert!(rbac.users.find_by_id(&user.id).await.unwrap().roles.is_empty());
    assert!(matches!(
        rbac.roles.delete_by_id(&role.id).await,
        Err(IdentityError::NotFound(_))
    ));
}

/// Users: uniqueness, lookup, password re-hash and deletion.
#[tokio::test]
async fn test_user_lifecycle() {
    let rbac = RbacGraph::in_memory();
    let user = rbac.users.create(NewUser::new("a@mail.com", "first-pass", None)).await.unwrap();
    assert!(user.password_hash.starts_with("$argon2id$"));

    let err = rbac.users.create(NewUser::new("A@mail.com", "x", None)).await.unwrap_err();
    assert_eq!(violation(err), "email must be unique");

    let err = rbac.users.create(NewUser::new("nope", "x", None)).await.unwrap_err();
    assert_eq!(violation(err), "email not valid");

    let found = rbac.users.find_by_email("a@mail.com").await.unwrap();
    assert_eq!(found.id, user.id);
    let err = rbac.users.find_by_email("b@mail.com").await.unwrap_err();
    assert_eq!(err.to_string(), "User with email: b@mail.com not found");

    let updated = rbac
        .users
        .update(&user.id, UserUpdate::new("a@mail.com", "second-pass", vec![]))
        .await
        .unwrap();
    assert_ne!(updated.password_hash, user.password_hash);
    assert!(rbac.users.verify_password("second-pass", &updated.password_hash));
    assert!(!rbac.users.verify_password("first-pass", &updated.password_hash));

    let err = rbac
        .users
        .update(&user.id, UserUpdate::new("a@mail.com", "", vec![]))
        .await
        .unwrap_err();
    assert_eq!(violation(err), "password must not be blank or empty");

    rbac.users.delete_by_id(&user.id).await.unwrap();
    assert_eq!(rbac.users.count().await, 0);
    let err = rbac.users.find_by_id(&user.id).await.unwrap_err();
    assert_eq!(err.to_string(), format!("User with id: {} not found", user.id));
}

/// Batch lookups skip unknown ids.
#[tokio::test]
async fn test_find_many_by_ids_is_tolerant() {
    let rbac = RbacGraph::in_memory();
    let p = rbac.privileges.create(NewPrivilege::new("read", false)).await.unwrap();

    assert!(rbac.privileges.find_many_by_ids(None).await.is_empty());
    let ids = vec![p.id.clone(), "missing".to_string()];
    let found = rbac.privileges.find_many_by_ids(Some(ids.as_slice())).await;
    assert_eq!(found, vec![p]);

    let err = rbac.privileges.find_by_id("missing").await.unwrap_err();
    assert_eq!(err.to_string(), "Privilege with id: missing not found");
}

/// Bulk deletion clears join rows with the entities.
#[tokio::test]
async fn test_delete_all() {
    let rbac = RbacGraph::in_memory();
    let p = rbac.privileges.create(NewPrivilege::new("read", false)).await.unwrap();
    let role = rbac.roles.create(NewRole::new("r", false, Some(vec![p.id.clone()]))).await.unwrap();
    rbac.users
        .create(NewUser::new("a@mail.com", "secret", Some(vec![role.id.clone()])))
        .await
        .unwrap();

    assert_eq!(rbac.privileges.delete_all().await.unwrap(), 1);
    assert!(rbac.roles.find_by_id(&role.id).await.unwrap().privileges.is_empty());

    assert_eq!(rbac.roles.delete_all().await.unwrap(), 1);
    assert!(rbac.users.find_all().await[0].roles.is_empty());

    assert_eq!(rbac.users.delete_all().await.unwrap(), 1);
    assert_eq!(rbac.users.count().await, 0);
}

/// Authorities are role labels then privilege labels, de-duplicated.
#[tokio::test]
async fn test_user_details_authorities() {
    let rbac = RbacGraph::in_memory();
    let read = rbac.privileges.create(NewPrivilege::new("read", false)).await.unwrap();
    let write = rbac.privileges.create(NewPrivilege::new("write", false)).await.unwrap();
    let admin = rbac
        .roles
        .create(NewRole::new("admin", false, Some(vec![read.id.clone(), write.id.clone()])))
        .await
        .unwrap();
    let user_role = rbac
        .roles
        .create(NewRole::new("user", false, Some(vec![read.id.clone()])))
        .await
        .unwrap();
    rbac.users
        .create(NewUser::new("admin@mail.com", "pw-admin", Some(vec![admin.id, user_role.id])))
        .await
        .unwrap();

    let details = rbac.user_details();
    let loaded = details.load_user_by_username("admin@mail.com").await.unwrap();
    assert_eq!(loaded.username, "admin@mail.com");
    assert_eq!(loaded.authorities, vec!["admin", "user", "read", "write"]);
    assert!(details.verify_password(&loaded, "pw-admin"));
    assert!(!details.verify_password(&loaded, "wrong"));

    assert!(matches!(
        details.load_user_by_username("ghost@mail.com").await,
        Err(IdentityError::NotFound(_))
    ));
}
