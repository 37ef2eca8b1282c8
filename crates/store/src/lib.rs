//! Persistence layer for personal-finance data.
//!
//! [`Store`] hands out one repository per entity. Each of them derefs to the
//! generic [`Repository`], so the shared CRUD calls sit next to the
//! entity-specific queries:
//!
//! ```rust,no_run
//! # async fn demo(db: sea_orm::DatabaseConnection) -> store::ResultRepo<()> {
//! use store::{CategoryType, NewCategory, Store};
//!
//! let store = Store::builder().database(db).build().await?;
//! let food = store
//!     .categories()
//!     .create_category(NewCategory::named("Food", CategoryType::Expense))
//!     .await?;
//! assert!(store.categories().find_by_id(food.id).await?.is_some());
//! # Ok(())
//! # }
//! ```

pub use accounts::{
    Account, AccountPatch, AccountSource, AccountStatus, AccountType, BalanceSummary, NewAccount,
    ProviderLink, SyncPolicy,
};
pub use categories::{
    AmountRange, Category, CategoryMatch, CategoryMetadata, CategoryNode, CategoryPatch,
    CategoryRules, CategoryStatus, CategoryType, MergeOutcome, NewCategory,
};
pub use currency::Currency;
pub use error::{ErrorKind, RepositoryError};
pub use money::MoneyCents;
pub use ops::{
    AccountRepository, CategoryRepository, Store, StoreBuilder, TransactionRepository,
    UserRepository,
    base::{FindOptions, Page, Record, Repository},
};
pub use transactions::{
    Breakdown, DuplicateCriteria, DuplicateGroup, Location, NewTransaction, SplitDetails,
    SplitPart, Transaction, TransactionFilter, TransactionPatch, TransactionSource,
    TransactionStatistics, TransactionStatus, TransactionType,
};
pub use users::{
    NewUser, NotificationPreferences, User, UserPatch, UserPreferences, UserRole, UserStatus,
};
pub use util::slugify;

mod accounts;
mod categories;
mod currency;
mod error;
mod money;
mod ops;
pub mod rules;
pub mod schema;
mod transactions;
mod users;
mod util;
pub mod validation;

pub type ResultRepo<T> = Result<T, RepositoryError>;
