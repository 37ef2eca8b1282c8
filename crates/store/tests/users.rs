use chrono::{Duration, Utc};
use store::{ErrorKind, NewUser, RepositoryError, UserPatch, UserRole, UserStatus};
use uuid::Uuid;

mod common;

#[tokio::test]
async fn register_normalizes_and_guards_the_email() {
    let store = common::store().await;

    let user = store
        .users()
        .register(NewUser {
            email: "  Alice@Example.COM ".to_string(),
            password_hash: "argon2$hash".to_string(),
            first_name: Some("Alice".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.status, UserStatus::Active);
    assert_eq!(user.role, UserRole::User);

    let found = store.users().find_by_email("ALICE@example.com").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.id));

    let err = store
        .users()
        .register(NewUser {
            email: "alice@example.com".to_string(),
            password_hash: "other".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Validation(_)), "{err}");

    assert!(store.users().is_email_taken("alice@example.com", None).await.unwrap());
    assert!(
        !store
            .users()
            .is_email_taken("alice@example.com", Some(user.id))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn invalid_registrations_never_reach_storage() {
    let store = common::store().await;

    for input in [
        NewUser {
            email: "not-an-email".to_string(),
            password_hash: "hash".to_string(),
            ..Default::default()
        },
        NewUser {
            email: "bob@example.com".to_string(),
            password_hash: "  ".to_string(),
            ..Default::default()
        },
    ] {
        let err = store.users().register(input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert!(store.users().find_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn status_and_role_filters() {
    let store = common::store().await;
    let alice = common::user(&store, "alice@example.com").await;
    let bob = common::user(&store, "bob@example.com").await;
    common::user(&store, "carol@example.com").await;

    store
        .users()
        .update(
            bob.id,
            UserPatch {
                status: Some(UserStatus::Suspended),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    store
        .users()
        .update(
            alice.id,
            UserPatch {
                role: Some(UserRole::Admin),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(store.users().find_active().await.unwrap().len(), 2);
    let suspended = store.users().find_by_status(UserStatus::Suspended).await.unwrap();
    assert_eq!(suspended.iter().map(|u| u.id).collect::<Vec<_>>(), vec![bob.id]);
    let admins = store.users().find_by_role(UserRole::Admin).await.unwrap();
    assert_eq!(admins.iter().map(|u| u.id).collect::<Vec<_>>(), vec![alice.id]);

    let counts = store.users().count_by_status().await.unwrap();
    assert!(counts.contains(&(UserStatus::Active, 2)));
    assert!(counts.contains(&(UserStatus::Suspended, 1)));
}

#[tokio::test]
async fn search_matches_names_and_email() {
    let store = common::store().await;
    store
        .users()
        .register(NewUser {
            email: "jd@example.com".to_string(),
            password_hash: "hash".to_string(),
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    common::user(&store, "someone@example.com").await;

    let page = store.users().search("DOE", 1, 10).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].email, "jd@example.com");

    let page = store.users().search("example", 1, 1).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.data.len(), 1);

    let page = store.users().search("100%", 1, 10).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn email_verification_consumes_the_token() {
    let store = common::store().await;
    let user = common::user(&store, "alice@example.com").await;
    assert!(user.email_verified_at.is_none());

    assert!(
        store
            .users()
            .set_email_verification_token(user.id, "verify-123")
            .await
            .unwrap()
    );
    let verified = store.users().verify_email("verify-123").await.unwrap().unwrap();
    assert!(verified.email_verified_at.is_some());

    assert!(store.users().verify_email("verify-123").await.unwrap().is_none());
    assert!(
        !store
            .users()
            .set_email_verification_token(Uuid::new_v4(), "x")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn password_reset_requires_an_unexpired_token() {
    let store = common::store().await;
    let user = common::user(&store, "alice@example.com").await;

    assert!(
        store
            .users()
            .set_password_reset_token(
                "alice@example.com",
                "expired",
                Utc::now() - Duration::hours(1),
            )
            .await
            .unwrap()
    );
    assert!(store.users().reset_password("expired", "new-hash").await.unwrap().is_none());

    assert!(
        store
            .users()
            .set_password_reset_token(
                "ALICE@example.com",
                "reset-1",
                Utc::now() + Duration::hours(1),
            )
            .await
            .unwrap()
    );
    let found = store
        .users()
        .find_by_password_reset_token("reset-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, user.id);

    let reset = store
        .users()
        .reset_password("reset-1", "new-hash")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reset.password_hash, "new-hash");
    assert!(store.users().reset_password("reset-1", "again").await.unwrap().is_none());

    assert!(
        !store
            .users()
            .set_password_reset_token("nobody@example.com", "t", Utc::now())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn login_touch_updates_the_timestamp() {
    let store = common::store().await;
    let user = common::user(&store, "alice@example.com").await;

    assert!(store.users().touch_last_login(user.id).await.unwrap());
    let user = store.users().find_by_id(user.id).await.unwrap().unwrap();
    assert!(user.last_login_at.is_some());
    assert!(!store.users().touch_last_login(Uuid::new_v4()).await.unwrap());
}
