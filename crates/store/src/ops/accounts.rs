use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, DatabaseTransaction, Order, QueryFilter, QueryOrder, QuerySelect, prelude::*,
    sea_query::SimpleExpr,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    base::{FindOptions, Repository},
    extends_repository, with_tx,
};
use crate::{
    Account, AccountSource, AccountStatus, BalanceSummary, MoneyCents, RepositoryError,
    ResultRepo, SyncPolicy,
    error::StorageContext,
    schema::{accounts, decode_label},
};

/// Accounts: per-user listings, balance mutation and sync bookkeeping.
#[derive(Clone, Debug)]
pub struct AccountRepository {
    base: Repository<Account>,
}

extends_repository!(AccountRepository, Account);

fn not_closed() -> SimpleExpr {
    accounts::Column::Status.ne(AccountStatus::Closed.as_str())
}

impl AccountRepository {
    pub async fn find_by_user(&self, user_id: Uuid, active_only: bool) -> ResultRepo<Vec<Account>> {
        let mut condition = Condition::all().add(accounts::Column::UserId.eq(user_id));
        if active_only {
            condition = condition.add(accounts::Column::Status.eq(AccountStatus::Active.as_str()));
        }
        self.find(
            FindOptions::filter(condition)
                .order_by(accounts::Column::Name, Order::Asc)
                .order_by(accounts::Column::CreatedAt, Order::Asc),
        )
        .await
    }

    pub async fn find_by_provider_account_id(
        &self,
        provider_account_id: &str,
    ) -> ResultRepo<Option<Account>> {
        self.find_one(
            Condition::all().add(accounts::Column::ProviderAccountId.eq(provider_account_id)),
        )
        .await
    }

    /// Sets absolute balances, as reported by a provider.
    pub async fn update_balance(
        &self,
        id: Uuid,
        current: MoneyCents,
        available: Option<MoneyCents>,
    ) -> ResultRepo<Option<Account>> {
        let rows = self
            .apply(
                &self.db,
                "update account balance",
                id,
                vec![
                    (accounts::Column::CurrentBalance, Expr::value(current.cents())),
                    (
                        accounts::Column::AvailableBalance,
                        Expr::value(available.map(MoneyCents::cents)),
                    ),
                ],
            )
            .await?;
        if rows == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    /// Adds `delta` to the current balance in a single `UPDATE`, so
    /// concurrent increments never lose each other.
    pub async fn increment_balance(&self, id: Uuid, delta: MoneyCents) -> ResultRepo<Option<Account>> {
        let rows = self
            .shift_balance(&self.db, "increment account balance", id, delta)
            .await?;
        if rows == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    pub async fn decrement_balance(&self, id: Uuid, delta: MoneyCents) -> ResultRepo<Option<Account>> {
        let rows = self
            .shift_balance(&self.db, "decrement account balance", id, -delta)
            .await?;
        if rows == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    /// Applies several balance deltas atomically. If any account is missing
    /// nothing is changed.
    pub async fn apply_balance_changes(&self, changes: &[(Uuid, MoneyCents)]) -> ResultRepo<()> {
        let operation = "apply balance changes";
        with_tx!(self, operation, |db_tx| {
            self.apply_balance_changes_in(&db_tx, changes).await
        })
    }

    async fn apply_balance_changes_in(
        &self,
        db_tx: &DatabaseTransaction,
        changes: &[(Uuid, MoneyCents)],
    ) -> ResultRepo<()> {
        for (id, delta) in changes {
            let rows = self
                .shift_balance(db_tx, "apply balance changes", *id, *delta)
                .await?;
            if rows != 1 {
                return Err(RepositoryError::InvalidState(format!(
                    "account {id} not found; balance changes rolled back"
                )));
            }
        }
        Ok(())
    }

    /// Balances of the user's open accounts grouped by account type.
    pub async fn balance_summary(&self, user_id: Uuid) -> ResultRepo<Vec<BalanceSummary>> {
        let rows: Vec<(String, i64, i64, i64)> = accounts::Entity::find()
            .select_only()
            .column(accounts::Column::AccountType)
            .column_as(Expr::col(accounts::Column::Id).count(), "account_count")
            .column_as(
                Expr::cust("CAST(COALESCE(SUM(current_balance), 0) AS BIGINT)"),
                "total_current",
            )
            .column_as(
                Expr::cust("CAST(COALESCE(SUM(COALESCE(available_balance, current_balance)), 0) AS BIGINT)"),
                "total_available",
            )
            .filter(accounts::Column::UserId.eq(user_id))
            .filter(not_closed())
            .group_by(accounts::Column::AccountType)
            .order_by_asc(accounts::Column::AccountType)
            .into_tuple()
            .all(&self.db)
            .await
            .context("summarize account balances")?;

        rows.into_iter()
            .map(|(account_type, count, current, available)| {
                Ok(BalanceSummary {
                    account_type: decode_label(&account_type, "account", "account_type")?,
                    account_count: count,
                    total_current: MoneyCents::new(current),
                    total_available: MoneyCents::new(available),
                })
            })
            .collect()
    }

    /// Sum of current balances over the user's open accounts.
    pub async fn total_balance_for_user(&self, user_id: Uuid) -> ResultRepo<MoneyCents> {
        let total: Option<i64> = accounts::Entity::find()
            .select_only()
            .column_as(
                Expr::cust("CAST(COALESCE(SUM(current_balance), 0) AS BIGINT)"),
                "total",
            )
            .filter(accounts::Column::UserId.eq(user_id))
            .filter(not_closed())
            .into_tuple()
            .one(&self.db)
            .await
            .context("total account balance")?;
        Ok(MoneyCents::new(total.unwrap_or_default()))
    }

    /// Provider-linked, sync-enabled, active accounts that were never synced
    /// or were last synced before `now - policy.staleness`.
    pub async fn find_needing_sync(
        &self,
        policy: &SyncPolicy,
        now: DateTime<Utc>,
    ) -> ResultRepo<Vec<Account>> {
        let threshold = now - policy.staleness;
        let condition = Condition::all()
            .add(accounts::Column::Source.eq(AccountSource::Plaid.as_str()))
            .add(accounts::Column::SyncEnabled.eq(true))
            .add(accounts::Column::Status.eq(AccountStatus::Active.as_str()))
            .add(
                Condition::any()
                    .add(accounts::Column::LastSyncAt.is_null())
                    .add(accounts::Column::LastSyncAt.lt(threshold)),
            );
        self.find(
            FindOptions::filter(condition)
                .order_by(accounts::Column::LastSyncAt, Order::Asc)
                .order_by(accounts::Column::Id, Order::Asc),
        )
        .await
    }

    /// Closed accounts keep their history but are no longer synced.
    pub async fn close_account(&self, id: Uuid) -> ResultRepo<Option<Account>> {
        let rows = self
            .apply(
                &self.db,
                "close account",
                id,
                vec![
                    (accounts::Column::Status, Expr::value(AccountStatus::Closed.as_str())),
                    (accounts::Column::SyncEnabled, Expr::value(false)),
                ],
            )
            .await?;
        if rows == 0 {
            return Ok(None);
        }
        info!(account_id = %id, "account closed");
        self.find_by_id(id).await
    }

    /// Stamps a successful sync, clears the last error and brings an account
    /// in `error` back to `active`.
    pub async fn record_sync_success(
        &self,
        id: Uuid,
        synced_at: DateTime<Utc>,
    ) -> ResultRepo<Option<Account>> {
        let rows = self
            .apply(
                &self.db,
                "record account sync",
                id,
                vec![
                    (accounts::Column::LastSyncAt, Expr::value(synced_at)),
                    (accounts::Column::SyncError, Expr::value(Option::<String>::None)),
                    (
                        accounts::Column::Status,
                        Expr::cust("CASE WHEN status = 'error' THEN 'active' ELSE status END"),
                    ),
                ],
            )
            .await?;
        if rows == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    /// Records a failed sync: the account moves to `error` with the message.
    pub async fn record_sync_failure(&self, id: Uuid, message: &str) -> ResultRepo<Option<Account>> {
        let message = message.trim();
        if message.is_empty() {
            return Err(RepositoryError::Validation(
                "sync error message must not be empty".to_string(),
            ));
        }
        let rows = self
            .apply(
                &self.db,
                "record account sync failure",
                id,
                vec![
                    (accounts::Column::SyncError, Expr::value(message)),
                    (accounts::Column::Status, Expr::value(AccountStatus::Error.as_str())),
                ],
            )
            .await?;
        if rows == 0 {
            return Ok(None);
        }
        warn!(account_id = %id, error = message, "account sync failed");
        self.find_by_id(id).await
    }

    async fn shift_balance<C: ConnectionTrait>(
        &self,
        db: &C,
        operation: &str,
        id: Uuid,
        delta: MoneyCents,
    ) -> ResultRepo<u64> {
        self.apply(
            db,
            operation,
            id,
            vec![(
                accounts::Column::CurrentBalance,
                Expr::col(accounts::Column::CurrentBalance).add(delta.cents()),
            )],
        )
        .await
    }

    async fn apply<C: ConnectionTrait>(
        &self,
        db: &C,
        operation: &str,
        id: Uuid,
        values: Vec<(accounts::Column, SimpleExpr)>,
    ) -> ResultRepo<u64> {
        self.set_columns(db, operation, accounts::Column::Id.eq(id), values)
            .await
    }
}
