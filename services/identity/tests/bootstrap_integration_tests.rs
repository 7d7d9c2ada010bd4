//! Integration tests for first-start initialization.

use identity_service::bootstrap::SeedConfig;
use identity_service::crypto::TextEncryptor;
use identity_service::rbac::NewUser;
use identity_service::IdentityCore;
use secrecy::{ExposeSecret, SecretString};

const SEED: &str = r#"{
    "privileges": [
        {"label": "privA", "isDefault": false},
        {"label": "privB", "isDefault": false}
    ],
    "roles": [
        {"label": "roleX", "isDefault": false, "privileges": ["privA"]},
        {"label": "roleY", "isDefault": false, "privileges": ["privB"]}
    ],
    "users": [
        {"email": "a@mail.com", "password": "pw-a", "roles": ["roleX", "roleY"]},
        {"email": "b@mail.com", "roles": ["roleX"]}
    ]
}"#;

fn core() -> IdentityCore {
    let encryptor =
        TextEncryptor::new(&SecretString::from("bootstrap-secret"), "5c0744940b5c369b").unwrap();
    IdentityCore::in_memory(encryptor)
}

fn role_labels(user: &identity_service::rbac::User) -> Vec<&str> {
    let mut labels: Vec<&str> = user.roles.iter().map(|r| r.label.as_str()).collect();
    labels.sort_unstable();
    labels
}

/// Empty stores end up with one key and exactly the seeded memberships.
#[tokio::test]
async fn test_bootstrap_from_empty_store() {
    let core = core();
    let seed = SeedConfig::from_json(SEED).unwrap();

    let report = core.bootstrap().run(Some(&seed)).await.unwrap();

    assert!(report.key.generated());
    assert_eq!(core.keys.count().await.unwrap(), 1);

    let summary = report.seeded.expect("seed should run on an empty store");
    assert_eq!(summary.privileges.len(), 2);
    assert_eq!(summary.roles.len(), 2);
    assert_eq!(summary.users.len(), 2);

    let a = core.rbac.users.find_by_email("a@mail.com").await.unwrap();
    let b = core.rbac.users.find_by_email("b@mail.com").await.unwrap();
    assert_eq!(role_labels(&a), vec!["rolex", "roley"]);
    assert_eq!(role_labels(&b), vec!["rolex"]);

    let rolex = a.roles.iter().find(|r| r.label == "rolex").unwrap();
    let privileges: Vec<_> = rolex.privileges.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(privileges, vec!["priva"]);
}

/// Users without a password get a generated one they can log in with.
#[tokio::test]
async fn test_generated_password_is_usable() {
    let core = core();
    let seed = SeedConfig::from_json(SEED).unwrap();
    let summary = core.bootstrap().run(Some(&seed)).await.unwrap().seeded.unwrap();

    let given = summary.credentials.iter().find(|c| c.email == "a@mail.com").unwrap();
    assert!(!given.generated);
    assert_eq!(given.password.expose_secret(), "pw-a");

    let generated = summary.credentials.iter().find(|c| c.email == "b@mail.com").unwrap();
    assert!(generated.generated);
    assert_eq!(generated.password.expose_secret().len(), 10);

    let details = core.user_details.load_user_by_username("b@mail.com").await.unwrap();
    assert!(core.user_details.verify_password(&details, generated.password.expose_secret()));
}

/// A second run neither generates another key nor re-seeds.
#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    let core = core();
    let seed = SeedConfig::from_json(SEED).unwrap();
    let first = core.bootstrap().run(Some(&seed)).await.unwrap();

    let second = core.bootstrap().run(Some(&seed)).await.unwrap();
    assert!(!second.key.generated());
    assert_eq!(second.key.kid(), first.key.kid());
    assert!(second.seeded.is_none());
    assert_eq!(core.keys.count().await.unwrap(), 1);
    assert_eq!(core.rbac.users.count().await, 2);
}

/// Existing users suppress seeding; no seed only ensures the key.
#[tokio::test]
async fn test_seed_skipped_when_users_exist() {
    let core = core();
    core.rbac
        .users
        .create(NewUser::new("existing@mail.com", "pw", None))
        .await
        .unwrap();
    let seed = SeedConfig::from_json(SEED).unwrap();

    let report = core.bootstrap().run(Some(&seed)).await.unwrap();
    assert!(report.seeded.is_none());
    assert_eq!(core.rbac.privileges.count().await, 0);

    let bare = self::core();
    let report = bare.bootstrap().run(None).await.unwrap();
    assert!(report.key.generated());
    assert!(report.seeded.is_none());
}

/// Seed references resolve by the stored form of non-ASCII labels too.
#[tokio::test]
async fn test_seed_resolves_non_ascii_labels() {
    let core = core();
    let seed = SeedConfig::from_json(
        r#"{
            "privileges": [{"label": "Éditer"}],
            "roles": [{"label": "Rédacteur", "privileges": ["ÉDITER"]}],
            "users": [{"email": "c@mail.com", "password": "pw-c", "roles": ["RÉDACTEUR"]}]
        }"#,
    )
    .unwrap();

    let summary = core.bootstrap().run(Some(&seed)).await.unwrap().seeded.unwrap();
    assert_eq!(summary.roles.len(), 1);

    let user = core.rbac.users.find_by_email("c@mail.com").await.unwrap();
    assert_eq!(role_labels(&user), vec!["rédacteur"]);
    let privileges: Vec<_> = user.roles[0].privileges.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(privileges, vec!["éditer"]);
}
