use chrono::NaiveDate;
use sea_orm::{
    Condition, Order, QueryFilter,
    prelude::*,
    sea_query::{Func, LikeExpr, Query, SimpleExpr},
};
use uuid::Uuid;

use crate::{
    RepositoryError, ResultRepo, Transaction, TransactionFilter, TransactionStatus,
    ops::base::{FindOptions, Page},
    schema::{accounts, transactions},
    util::like_pattern,
};

use super::TransactionRepository;

/// Restricts transactions to accounts owned by `user_id`.
pub(super) fn owned_by(user_id: Uuid) -> SimpleExpr {
    transactions::Column::AccountId.in_subquery(
        Query::select()
            .column(accounts::Column::Id)
            .from(accounts::Entity)
            .and_where(accounts::Column::UserId.eq(user_id))
            .to_owned(),
    )
}

pub(super) fn validate_filter(filter: &TransactionFilter) -> ResultRepo<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from > to
    {
        return Err(RepositoryError::Validation(
            "invalid range: from must not be after to".to_string(),
        ));
    }
    Ok(())
}

/// `from` and `to` are both inclusive dates.
pub(super) fn filter_condition(filter: &TransactionFilter) -> Condition {
    let mut condition = Condition::all();
    if let Some(user_id) = filter.user_id {
        condition = condition.add(owned_by(user_id));
    }
    if let Some(account_id) = filter.account_id {
        condition = condition.add(transactions::Column::AccountId.eq(account_id));
    }
    if let Some(category_id) = filter.category_id {
        condition = condition.add(transactions::Column::CategoryId.eq(category_id));
    }
    if let Some(from) = filter.from {
        condition = condition.add(transactions::Column::Date.gte(from));
    }
    if let Some(to) = filter.to {
        condition = condition.add(transactions::Column::Date.lte(to));
    }
    if let Some(tx_type) = filter.transaction_type {
        condition = condition.add(transactions::Column::TransactionType.eq(tx_type.as_str()));
    }
    if let Some(status) = filter.status {
        condition = condition.add(transactions::Column::Status.eq(status.as_str()));
    }
    if filter.include_hidden == Some(false) {
        condition = condition.add(transactions::Column::IsHidden.eq(false));
    }
    condition
}

pub(super) trait ApplyTxFilters: QueryFilter + Sized {
    fn apply_tx_filters(self, filter: &TransactionFilter) -> Self;
}

impl<T> ApplyTxFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_tx_filters(self, filter: &TransactionFilter) -> Self {
        self.filter(filter_condition(filter))
    }
}

fn newest_first(options: FindOptions<Transaction>) -> FindOptions<Transaction> {
    options
        .order_by(transactions::Column::Date, Order::Desc)
        .order_by(transactions::Column::CreatedAt, Order::Desc)
}

impl TransactionRepository {
    /// Newest first, paginated.
    pub async fn list(
        &self,
        filter: &TransactionFilter,
        page: u64,
        limit: u64,
    ) -> ResultRepo<Page<Transaction>> {
        validate_filter(filter)?;
        self.find_with_pagination(
            page,
            limit,
            newest_first(FindOptions::filter(filter_condition(filter))),
        )
        .await
    }

    pub async fn find_by_account(
        &self,
        account_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> ResultRepo<Vec<Transaction>> {
        let filter = TransactionFilter {
            account_id: Some(account_id),
            from,
            to,
            ..Default::default()
        };
        validate_filter(&filter)?;
        self.find(newest_first(FindOptions::filter(filter_condition(&filter))))
            .await
    }

    pub async fn find_by_category(
        &self,
        category_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> ResultRepo<Vec<Transaction>> {
        let filter = TransactionFilter {
            category_id: Some(category_id),
            from,
            to,
            ..Default::default()
        };
        validate_filter(&filter)?;
        self.find(newest_first(FindOptions::filter(filter_condition(&filter))))
            .await
    }

    /// Case-insensitive substring search over description, merchant and
    /// notes of the user's transactions.
    pub async fn search(
        &self,
        user_id: Uuid,
        query: &str,
        page: u64,
        limit: u64,
    ) -> ResultRepo<Page<Transaction>> {
        if query.trim().is_empty() {
            return Err(RepositoryError::Validation(
                "search query must not be empty".to_string(),
            ));
        }
        let pattern = like_pattern(query);
        let matches = |column: transactions::Column| {
            Expr::expr(Func::lower(Expr::col(column)))
                .like(LikeExpr::new(pattern.clone()).escape('\\'))
        };
        let condition = Condition::all().add(owned_by(user_id)).add(
            Condition::any()
                .add(matches(transactions::Column::Description))
                .add(matches(transactions::Column::MerchantName))
                .add(matches(transactions::Column::Notes)),
        );
        self.find_with_pagination(page, limit, newest_first(FindOptions::filter(condition)))
            .await
    }

    /// Non-zero, non-cancelled transactions without a category, newest first.
    pub async fn find_uncategorized(
        &self,
        user_id: Option<Uuid>,
        limit: u64,
    ) -> ResultRepo<Vec<Transaction>> {
        let mut condition = Condition::all()
            .add(transactions::Column::CategoryId.is_null())
            .add(transactions::Column::Amount.ne(0))
            .add(transactions::Column::Status.ne(TransactionStatus::Cancelled.as_str()));
        if let Some(user_id) = user_id {
            condition = condition.add(owned_by(user_id));
        }
        self.find(newest_first(FindOptions::filter(condition)).limit(limit))
            .await
    }
}
