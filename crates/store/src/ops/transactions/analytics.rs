use std::collections::BTreeMap;

use chrono::NaiveDate;
use sea_orm::{Order, QueryFilter, QuerySelect, TryGetableMany, prelude::*};
use tracing::debug;
use uuid::Uuid;

use super::{
    TransactionRepository,
    list::{ApplyTxFilters, filter_condition, validate_filter},
};
use crate::{
    DuplicateCriteria, DuplicateGroup, MoneyCents, ResultRepo, Transaction, TransactionFilter,
    TransactionStatistics, TransactionStatus, TransactionType,
    error::StorageContext,
    ops::base::FindOptions,
    schema::{decode_label, transactions},
};

/// One aggregated row: group key, type, summed amount and row count.
type GroupRow<K> = (K, String, i64, i64);

impl TransactionRepository {
    /// Groups of transactions in the same account that look like repeats:
    /// same type, amounts within `amount_tolerance` and dates within
    /// `day_tolerance` days. Cancelled rows are ignored.
    ///
    /// Grouping is transitive, so a chain of near matches forms one group.
    pub async fn find_duplicates(
        &self,
        filter: &TransactionFilter,
        criteria: &DuplicateCriteria,
    ) -> ResultRepo<Vec<DuplicateGroup>> {
        validate_filter(filter)?;
        let mut rows = self
            .find(
                FindOptions::filter(filter_condition(filter))
                    .and(transactions::Column::Status.ne(TransactionStatus::Cancelled.as_str()))
                    .order_by(transactions::Column::AccountId, Order::Asc)
                    .order_by(transactions::Column::Date, Order::Asc)
                    .order_by(transactions::Column::CreatedAt, Order::Asc),
            )
            .await?;
        rows.sort_by(|a, b| {
            (a.account_id, a.date, a.created_at).cmp(&(b.account_id, b.date, b.created_at))
        });

        let groups = group_duplicates(rows, criteria);
        debug!(groups = groups.len(), "duplicate scan finished");
        Ok(groups)
    }

    /// Income, expense and counts between `from` and `to` (inclusive) for the
    /// user's visible, non-cancelled transactions, broken down by category,
    /// account and day.
    pub async fn statistics(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultRepo<TransactionStatistics> {
        let filter = TransactionFilter {
            user_id: Some(user_id),
            from: Some(from),
            to: Some(to),
            include_hidden: Some(false),
            ..Default::default()
        };
        validate_filter(&filter)?;

        let mut stats = TransactionStatistics::default();

        let by_category: Vec<GroupRow<Option<Uuid>>> = self
            .grouped(&filter, transactions::Column::CategoryId, "statistics by category")
            .await?;
        for (category_id, tx_type, amount, count) in by_category {
            let (tx_type, amount, count) = decode_group(&tx_type, amount, count)?;
            stats.totals.add(tx_type, amount, count);
            match category_id {
                Some(id) => stats.by_category.entry(id).or_default(),
                None => &mut stats.uncategorized,
            }
            .add(tx_type, amount, count);
        }

        let by_account: Vec<GroupRow<Uuid>> = self
            .grouped(&filter, transactions::Column::AccountId, "statistics by account")
            .await?;
        for (account_id, tx_type, amount, count) in by_account {
            let (tx_type, amount, count) = decode_group(&tx_type, amount, count)?;
            stats
                .by_account
                .entry(account_id)
                .or_default()
                .add(tx_type, amount, count);
        }

        let daily: Vec<GroupRow<NaiveDate>> = self
            .grouped(&filter, transactions::Column::Date, "statistics by day")
            .await?;
        for (date, tx_type, amount, count) in daily {
            let (tx_type, amount, count) = decode_group(&tx_type, amount, count)?;
            stats.daily.entry(date).or_default().add(tx_type, amount, count);
        }

        Ok(stats)
    }

    async fn grouped<K>(
        &self,
        filter: &TransactionFilter,
        key: transactions::Column,
        operation: &str,
    ) -> ResultRepo<Vec<GroupRow<K>>>
    where
        GroupRow<K>: TryGetableMany + Send,
    {
        transactions::Entity::find()
            .select_only()
            .column(key)
            .column(transactions::Column::TransactionType)
            .column_as(
                Expr::cust("CAST(COALESCE(SUM(amount), 0) AS BIGINT)"),
                "total",
            )
            .column_as(Expr::col(transactions::Column::Id).count(), "rows")
            .apply_tx_filters(filter)
            .filter(transactions::Column::Status.ne(TransactionStatus::Cancelled.as_str()))
            .group_by(key)
            .group_by(transactions::Column::TransactionType)
            .into_tuple()
            .all(&self.db)
            .await
            .context(operation)
    }
}

fn decode_group(
    tx_type: &str,
    amount: i64,
    count: i64,
) -> ResultRepo<(TransactionType, MoneyCents, u64)> {
    let tx_type = decode_label(tx_type, "transaction", "transaction_type")?;
    Ok((
        tx_type,
        MoneyCents::new(amount),
        u64::try_from(count).unwrap_or_default(),
    ))
}

fn is_duplicate(a: &Transaction, b: &Transaction, criteria: &DuplicateCriteria) -> bool {
    if a.account_id != b.account_id || a.transaction_type != b.transaction_type {
        return false;
    }
    if (a.amount - b.amount).abs() > criteria.amount_tolerance.abs() {
        return false;
    }
    if (a.date - b.date).num_days().unsigned_abs() > u64::from(criteria.day_tolerance) {
        return false;
    }
    if criteria.require_same_description {
        let same = |x: Option<&str>, y: Option<&str>| match (x, y) {
            (Some(x), Some(y)) => x.trim().eq_ignore_ascii_case(y.trim()),
            _ => false,
        };
        return same(Some(&a.description), Some(&b.description))
            || same(a.merchant_name.as_deref(), b.merchant_name.as_deref());
    }
    true
}

fn find_root(parents: &mut [usize], mut index: usize) -> usize {
    while parents[index] != index {
        parents[index] = parents[parents[index]];
        index = parents[index];
    }
    index
}

/// Clusters `rows` (sorted by account, date, creation time) into groups of
/// two or more. Groups keep the input order.
pub(crate) fn group_duplicates(
    rows: Vec<Transaction>,
    criteria: &DuplicateCriteria,
) -> Vec<DuplicateGroup> {
    let mut parents: Vec<usize> = (0..rows.len()).collect();
    let window = i64::from(criteria.day_tolerance);

    for i in 0..rows.len() {
        for j in (i + 1)..rows.len() {
            if rows[j].account_id != rows[i].account_id
                || (rows[j].date - rows[i].date).num_days() > window
            {
                break;
            }
            if is_duplicate(&rows[i], &rows[j], criteria) {
                let (a, b) = (find_root(&mut parents, i), find_root(&mut parents, j));
                if a != b {
                    parents[b.max(a)] = a.min(b);
                }
            }
        }
    }

    let mut members: BTreeMap<usize, Vec<Transaction>> = BTreeMap::new();
    for (index, row) in rows.into_iter().enumerate() {
        let root = find_root(&mut parents, index);
        members.entry(root).or_default().push(row);
    }

    members
        .into_values()
        .filter(|group| group.len() > 1)
        .filter_map(|transactions| {
            let account_id = transactions.first()?.account_id;
            Some(DuplicateGroup {
                account_id,
                transactions,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::{Currency, TransactionSource};

    fn tx(account: Uuid, cents: i64, day: u32, description: &str) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            account_id: account,
            category_id: None,
            amount: MoneyCents::new(cents),
            transaction_type: TransactionType::Debit,
            status: TransactionStatus::Posted,
            source: TransactionSource::Manual,
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            authorized_date: None,
            description: description.to_string(),
            merchant_name: None,
            original_description: None,
            currency: Currency::default(),
            notes: None,
            tags: Vec::new(),
            location: None,
            split: None,
            external_id: None,
            provider_metadata: None,
            is_hidden: false,
            created_at: now + Duration::seconds(i64::from(day)),
            updated_at: now,
        }
    }

    #[test]
    fn exact_repeats_within_a_day_are_grouped() {
        let account = Uuid::new_v4();
        let rows = vec![
            tx(account, 4_50, 1, "Coffee"),
            tx(account, 4_50, 2, "Coffee"),
            tx(account, 4_50, 5, "Coffee"),
        ];

        let groups = group_duplicates(rows, &DuplicateCriteria::default());

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].account_id, account);
        assert_eq!(groups[0].transactions.len(), 2);
    }

    #[test]
    fn chains_of_near_matches_form_one_group() {
        let account = Uuid::new_v4();
        let criteria = DuplicateCriteria {
            amount_tolerance: MoneyCents::new(10),
            day_tolerance: 1,
            require_same_description: false,
        };
        let rows = vec![
            tx(account, 10_00, 1, "a"),
            tx(account, 10_08, 2, "b"),
            tx(account, 10_16, 3, "c"),
        ];

        let groups = group_duplicates(rows, &criteria);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].transactions.len(), 3);
    }

    #[test]
    fn different_accounts_or_types_never_match() {
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let mut credit = tx(first, 4_50, 1, "Coffee");
        credit.transaction_type = TransactionType::Credit;
        let rows = vec![
            tx(first, 4_50, 1, "Coffee"),
            credit,
            tx(second, 4_50, 1, "Coffee"),
        ];

        assert!(group_duplicates(rows, &DuplicateCriteria::default()).is_empty());
    }

    #[test]
    fn description_check_is_case_insensitive() {
        let account = Uuid::new_v4();
        let criteria = DuplicateCriteria {
            require_same_description: true,
            ..Default::default()
        };
        let rows = vec![
            tx(account, 9_99, 1, "Netflix"),
            tx(account, 9_99, 1, "NETFLIX "),
            tx(account, 9_99, 1, "Spotify"),
        ];

        let groups = group_duplicates(rows, &criteria);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].transactions.len(), 2);
    }
}
