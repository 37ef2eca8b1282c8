#![allow(dead_code)]

use chrono::NaiveDate;
use migration::MigratorTrait;
use sea_orm::{ConnectionTrait, Database, Statement, Value};
use store::{
    Account, AccountType, Category, CategoryRules, CategoryType, MoneyCents, NewAccount,
    NewCategory, NewTransaction, NewUser, Store, Transaction, User,
};
use uuid::Uuid;

pub async fn store() -> Store {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Store::builder().database(db).build().await.unwrap()
}

pub async fn user(store: &Store, email: &str) -> User {
    store
        .users()
        .register(NewUser {
            email: email.to_string(),
            password_hash: "argon2$hash".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
}

pub async fn account(store: &Store, user_id: Uuid, name: &str) -> Account {
    store
        .accounts()
        .create(NewAccount::manual(user_id, name, AccountType::Checking))
        .await
        .unwrap()
}

pub async fn category(store: &Store, name: &str) -> Category {
    store
        .categories()
        .create_category(NewCategory::named(name, CategoryType::Expense))
        .await
        .unwrap()
}

pub async fn child(store: &Store, name: &str, parent_id: Uuid) -> Category {
    store
        .categories()
        .create_category(NewCategory::named(name, CategoryType::Expense).under(parent_id))
        .await
        .unwrap()
}

pub async fn ruled(store: &Store, name: &str, rules: CategoryRules) -> Category {
    store
        .categories()
        .create_category(NewCategory {
            rules,
            ..NewCategory::named(name, CategoryType::Expense)
        })
        .await
        .unwrap()
}

pub async fn debit(
    store: &Store,
    account_id: Uuid,
    cents: i64,
    on: NaiveDate,
    what: &str,
) -> Transaction {
    store
        .transactions()
        .create(NewTransaction::debit(account_id, MoneyCents::new(cents), on, what))
        .await
        .unwrap()
}

pub async fn credit(
    store: &Store,
    account_id: Uuid,
    cents: i64,
    on: NaiveDate,
    what: &str,
) -> Transaction {
    store
        .transactions()
        .create(NewTransaction::credit(account_id, MoneyCents::new(cents), on, what))
        .await
        .unwrap()
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

/// Writes columns behind the repositories' back, to build states they refuse
/// to produce.
pub async fn raw(store: &Store, sql: &str, values: Vec<Value>) {
    let db = store.database();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(backend, sql, values))
        .await
        .unwrap();
}
