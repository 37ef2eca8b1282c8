use sea_orm::{Condition, prelude::*};
use tracing::debug;
use uuid::Uuid;

use super::{base::Repository, extends_repository};
use crate::{
    NewTransaction, RepositoryError, ResultRepo, Transaction, TransactionPatch,
    schema::transactions,
};

mod analytics;
mod list;

/// Transactions: filtered listings, provider upserts and analytics.
#[derive(Clone, Debug)]
pub struct TransactionRepository {
    base: Repository<Transaction>,
}

extends_repository!(TransactionRepository, Transaction);

impl TransactionRepository {
    pub async fn find_by_provider_id(&self, external_id: &str) -> ResultRepo<Option<Transaction>> {
        self.find_one(
            Condition::all().add(transactions::Column::ExternalId.eq(external_id.trim())),
        )
        .await
    }

    /// Inserts a provider transaction, or refreshes the provider-owned fields
    /// of the row already holding its `external_id`.
    ///
    /// User edits (category, notes, tags, hidden flag) survive a refresh.
    pub async fn upsert_from_provider(&self, input: NewTransaction) -> ResultRepo<Transaction> {
        let Some(external_id) = input
            .external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToString::to_string)
        else {
            return Err(RepositoryError::Validation(
                "provider transactions need an external id".to_string(),
            ));
        };

        let Some(existing) = self.find_by_provider_id(&external_id).await? else {
            let created = self.create(input).await?;
            debug!(%external_id, id = %created.id, "provider transaction inserted");
            return Ok(created);
        };

        let patch = TransactionPatch {
            amount: Some(input.amount),
            transaction_type: Some(input.transaction_type),
            status: Some(input.status),
            date: Some(input.date),
            authorized_date: Some(input.authorized_date),
            description: Some(input.description),
            merchant_name: Some(input.merchant_name),
            location: Some(input.location),
            provider_metadata: Some(input.provider_metadata),
            ..Default::default()
        };
        debug!(%external_id, id = %existing.id, "provider transaction refreshed");
        self.update(existing.id, patch).await?.ok_or_else(|| {
            RepositoryError::InvalidState(format!(
                "transaction {} vanished during provider upsert",
                existing.id
            ))
        })
    }

    /// Sets (or clears) the category of every listed transaction.
    pub async fn assign_category(
        &self,
        ids: &[Uuid],
        category_id: Option<Uuid>,
    ) -> ResultRepo<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.bulk_update(
            Condition::all().add(transactions::Column::Id.is_in(ids.to_vec())),
            TransactionPatch {
                category_id: Some(category_id),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_hidden(&self, id: Uuid, hidden: bool) -> ResultRepo<Option<Transaction>> {
        self.update(
            id,
            TransactionPatch {
                is_hidden: Some(hidden),
                ..Default::default()
            },
        )
        .await
    }
}
