use sea_orm::DatabaseConnection;

use crate::ResultRepo;

pub(crate) mod accounts;
pub(crate) mod base;
pub(crate) mod categories;
pub(crate) mod transactions;
pub(crate) mod users;

pub use accounts::AccountRepository;
pub use categories::CategoryRepository;
pub use transactions::TransactionRepository;
pub use users::UserRepository;

/// Runs `$body` inside a database transaction named `$op` for logs and errors.
///
/// The transaction commits when the body returns `Ok`; on `Err` it is dropped,
/// which rolls it back. Inside the body use only `$tx`, never the pool.
macro_rules! with_tx {
    ($self:expr, $op:expr, |$tx:ident| $body:expr) => {{
        let $tx = sea_orm::TransactionTrait::begin(&$self.db)
            .await
            .context($op)?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await.context($op)?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point: one repository per entity, all sharing the same pool.
#[derive(Clone, Debug)]
pub struct Store {
    database: DatabaseConnection,
}

impl Store {
    /// Return a builder for `Store`. Help to build the struct.
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.database.clone())
    }

    pub fn accounts(&self) -> AccountRepository {
        AccountRepository::new(self.database.clone())
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.database.clone())
    }

    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.database.clone())
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }
}

/// The builder for `Store`
#[derive(Default)]
pub struct StoreBuilder {
    database: DatabaseConnection,
}

impl StoreBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> StoreBuilder {
        self.database = db;
        self
    }

    /// Construct `Store`
    pub async fn build(self) -> ResultRepo<Store> {
        Ok(Store {
            database: self.database,
        })
    }
}

/// Implements `Deref` to the generic repository so every entity repository
/// exposes the shared CRUD calls next to its own queries.
macro_rules! extends_repository {
    ($name:ident, $record:ty) => {
        impl $name {
            pub(crate) fn new(db: sea_orm::DatabaseConnection) -> Self {
                Self {
                    base: $crate::ops::base::Repository::new(db),
                }
            }
        }

        impl std::ops::Deref for $name {
            type Target = $crate::ops::base::Repository<$record>;

            fn deref(&self) -> &Self::Target {
                &self.base
            }
        }
    };
}

pub(crate) use extends_repository;
