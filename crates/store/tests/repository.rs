use std::collections::HashSet;

use sea_orm::{ColumnTrait, Condition, Order};
use store::{
    AccountPatch, AccountType, CategoryType, ErrorKind, FindOptions, MoneyCents, NewAccount,
    NewCategory, RepositoryError, schema::accounts,
};
use uuid::Uuid;

mod common;

#[tokio::test]
async fn create_then_find_returns_the_stored_record() {
    let store = common::store().await;
    let owner = common::user(&store, "alice@example.com").await;

    let created = store
        .accounts()
        .create(NewAccount::manual(owner.id, "Checking", AccountType::Checking))
        .await
        .unwrap();

    let found = store.accounts().find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(found, created);
    assert!(found.updated_at >= found.created_at);
    assert_eq!(found.user_id, owner.id);
}

#[tokio::test]
async fn update_returns_what_a_later_read_sees() {
    let store = common::store().await;
    let owner = common::user(&store, "alice@example.com").await;
    let account = common::account(&store, owner.id, "Checking").await;

    let updated = store
        .accounts()
        .update(
            account.id,
            AccountPatch {
                name: Some("Everyday".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.name, "Everyday");
    assert!(updated.updated_at >= account.updated_at);
    assert_eq!(updated.created_at, account.created_at);
    let read = store.accounts().find_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(read, updated);
}

#[tokio::test]
async fn missing_ids_are_not_errors() {
    let store = common::store().await;
    let missing = Uuid::new_v4();

    assert!(store.accounts().find_by_id(missing).await.unwrap().is_none());
    assert!(
        store
            .accounts()
            .update(missing, AccountPatch::default())
            .await
            .unwrap()
            .is_none()
    );
    assert!(!store.accounts().delete(missing).await.unwrap());
}

#[tokio::test]
async fn pages_cover_every_match_exactly_once() {
    let store = common::store().await;
    let owner = common::user(&store, "alice@example.com").await;
    let mut expected = HashSet::new();
    for n in 0..7 {
        expected.insert(common::account(&store, owner.id, &format!("Account {n}")).await.id);
    }

    let mut seen = HashSet::new();
    for page in 1..=3 {
        let result = store
            .accounts()
            .find_with_pagination(
                page,
                3,
                FindOptions::new().order_by(accounts::Column::Name, Order::Asc),
            )
            .await
            .unwrap();
        assert_eq!(result.total, 7);
        assert_eq!(result.data.len(), if page < 3 { 3 } else { 1 });
        for account in result.data {
            assert!(seen.insert(account.id), "account listed twice");
        }
    }
    assert_eq!(seen, expected);

    let err = store
        .accounts()
        .find_with_pagination(0, 3, FindOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn save_updates_existing_rows_and_inserts_new_ones() {
    let store = common::store().await;
    let owner = common::user(&store, "alice@example.com").await;
    let mut account = common::account(&store, owner.id, "Checking").await;

    account.name = "Renamed".to_string();
    let saved = store.accounts().save(&account).await.unwrap();
    assert_eq!(saved.name, "Renamed");
    assert_eq!(saved.created_at, account.created_at);

    let mut copy = saved.clone();
    copy.id = Uuid::new_v4();
    copy.name = "Copy".to_string();
    let inserted = store.accounts().save(&copy).await.unwrap();
    assert_eq!(inserted.id, copy.id);

    let owned = Condition::all().add(accounts::Column::UserId.eq(owner.id));
    assert_eq!(store.accounts().count(owned).await.unwrap(), 2);
}

#[tokio::test]
async fn page_bounds_are_validated_not_computed_blindly() {
    let store = common::store().await;
    let owner = common::user(&store, "alice@example.com").await;
    for n in 0..2 {
        common::account(&store, owner.id, &format!("Account {n}")).await;
    }

    for (page, limit) in [(0, 3), (1, 0), (u64::MAX, 2), (1, u64::MAX), (2, 1 << 63)] {
        let err = store
            .accounts()
            .find_with_pagination(page, limit, FindOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "page {page} limit {limit}");
    }

    let past_the_end = store
        .accounts()
        .find_with_pagination(5, 10, FindOptions::new())
        .await
        .unwrap();
    assert!(past_the_end.data.is_empty());
    assert_eq!(past_the_end.total, 2);
    assert_eq!(past_the_end.page, 5);
}

#[tokio::test]
async fn save_validates_the_whole_record() {
    let store = common::store().await;
    let owner = common::user(&store, "alice@example.com").await;
    let account = common::account(&store, owner.id, "Checking").await;

    let mut blank = account.clone();
    blank.name = "   ".to_string();
    let err = store.accounts().save(&blank).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Validation(_)), "{err}");

    let mut negative = account.clone();
    negative.credit_limit = Some(MoneyCents::new(-1));
    let err = store.accounts().save(&negative).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut fresh = blank;
    fresh.id = Uuid::new_v4();
    let err = store.accounts().save(&fresh).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let stored = store.accounts().find_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Checking");
    assert_eq!(stored.credit_limit, account.credit_limit);
    assert!(store.accounts().find_by_id(fresh.id).await.unwrap().is_none());
}

#[tokio::test]
async fn bulk_insert_is_all_or_nothing() {
    let store = common::store().await;

    let err = store
        .categories()
        .bulk_insert(vec![
            NewCategory::named("Food", CategoryType::Expense),
            NewCategory::named("Food", CategoryType::Expense),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::Conflict { .. }), "{err}");
    assert_eq!(store.categories().count(Condition::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn unique_violations_surface_as_conflicts() {
    let store = common::store().await;
    common::category(&store, "Food").await;

    // The generic create skips the slug pre-check, so the index decides.
    let err = store
        .categories()
        .create(NewCategory::named("Food", CategoryType::Expense))
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::Conflict { .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert!(err.to_string().starts_with("Failed to create category"));
}

#[tokio::test]
async fn delete_by_and_exists_use_the_same_criteria() {
    let store = common::store().await;
    let owner = common::user(&store, "alice@example.com").await;
    common::account(&store, owner.id, "One").await;
    common::account(&store, owner.id, "Two").await;

    let named_one = Condition::all().add(accounts::Column::Name.eq("One"));
    assert!(store.accounts().exists(named_one.clone()).await.unwrap());
    assert_eq!(store.accounts().delete_by(named_one.clone()).await.unwrap(), 1);
    assert!(!store.accounts().exists(named_one).await.unwrap());
    assert_eq!(store.accounts().count(Condition::all()).await.unwrap(), 1);
}

#[tokio::test]
async fn raw_queries_bind_parameters() {
    let store = common::store().await;
    let owner = common::user(&store, "alice@example.com").await;
    common::account(&store, owner.id, "Checking").await;

    let rows = store
        .accounts()
        .query(
            "SELECT COUNT(*) AS n FROM accounts WHERE name = ?",
            vec!["Checking".into()],
        )
        .await
        .unwrap();

    let n: i64 = rows[0].try_get("", "n").unwrap();
    assert_eq!(n, 1);
}
