//! Account transactions.
//!
//! `amount` is always a non-negative magnitude; the direction lives in
//! [`TransactionType`].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, MoneyCents, RepositoryError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Debit,
    Credit,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = RepositoryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            other => Err(RepositoryError::Validation(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    #[default]
    Posted,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Posted => "posted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = RepositoryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "posted" => Ok(Self::Posted),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(RepositoryError::Validation(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    Plaid,
    #[default]
    Manual,
    Import,
}

impl TransactionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plaid => "plaid",
            Self::Manual => "manual",
            Self::Import => "import",
        }
    }
}

impl TryFrom<&str> for TransactionSource {
    type Error = RepositoryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "plaid" => Ok(Self::Plaid),
            "manual" => Ok(Self::Manual),
            "import" => Ok(Self::Import),
            other => Err(RepositoryError::Validation(format!(
                "invalid transaction source: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitPart {
    pub amount: MoneyCents,
    pub category_id: Option<Uuid>,
    pub note: Option<String>,
}

/// Split-payment breakdown of one transaction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitDetails {
    pub parts: Vec<SplitPart>,
    pub group_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub category_id: Option<Uuid>,
    pub amount: MoneyCents,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub source: TransactionSource,
    pub date: NaiveDate,
    pub authorized_date: Option<NaiveDate>,
    pub description: String,
    pub merchant_name: Option<String>,
    pub original_description: Option<String>,
    pub currency: Currency,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub location: Option<Location>,
    pub split: Option<SplitDetails>,
    /// Provider transaction id; unique when present.
    pub external_id: Option<String>,
    pub provider_metadata: Option<serde_json::Value>,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_expense(&self) -> bool {
        self.transaction_type == TransactionType::Debit && self.amount > MoneyCents::ZERO
    }

    /// Signed amount: negative for debits.
    pub fn display_amount(&self) -> MoneyCents {
        match self.transaction_type {
            TransactionType::Debit => -self.amount,
            TransactionType::Credit => self.amount,
        }
    }

    pub fn formatted_amount(&self) -> String {
        self.currency.format(self.display_amount())
    }

    pub fn needs_categorization(&self) -> bool {
        self.category_id.is_none() && !self.amount.is_zero()
    }

    pub fn is_split(&self) -> bool {
        self.split.as_ref().is_some_and(|split| !split.parts.is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct NewTransaction {
    pub account_id: Uuid,
    pub category_id: Option<Uuid>,
    pub amount: MoneyCents,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub source: TransactionSource,
    pub date: NaiveDate,
    pub authorized_date: Option<NaiveDate>,
    pub description: String,
    pub merchant_name: Option<String>,
    pub original_description: Option<String>,
    pub currency: Currency,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub location: Option<Location>,
    pub split: Option<SplitDetails>,
    pub external_id: Option<String>,
    pub provider_metadata: Option<serde_json::Value>,
    pub is_hidden: bool,
}

impl NewTransaction {
    /// A posted manual debit with no optional fields.
    pub fn debit(account_id: Uuid, amount: MoneyCents, date: NaiveDate, description: &str) -> Self {
        Self {
            account_id,
            category_id: None,
            amount,
            transaction_type: TransactionType::Debit,
            status: TransactionStatus::Posted,
            source: TransactionSource::Manual,
            date,
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
        }
    }

    pub fn credit(account_id: Uuid, amount: MoneyCents, date: NaiveDate, description: &str) -> Self {
        Self {
            transaction_type: TransactionType::Credit,
            ..Self::debit(account_id, amount, date, description)
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TransactionPatch {
    pub category_id: Option<Option<Uuid>>,
    pub amount: Option<MoneyCents>,
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub date: Option<NaiveDate>,
    pub authorized_date: Option<Option<NaiveDate>>,
    pub description: Option<String>,
    pub merchant_name: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub location: Option<Option<Location>>,
    pub split: Option<Option<SplitDetails>>,
    pub provider_metadata: Option<Option<serde_json::Value>>,
    pub is_hidden: Option<bool>,
}

/// Listing filter. Every field narrows the result; the default matches all.
#[derive(Clone, Debug, Default)]
pub struct TransactionFilter {
    pub user_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    /// `None` hides nothing, `Some(false)` drops hidden rows.
    pub include_hidden: Option<bool>,
}

/// Tolerances for duplicate detection.
#[derive(Clone, Copy, Debug)]
pub struct DuplicateCriteria {
    pub amount_tolerance: MoneyCents,
    pub day_tolerance: u32,
    pub require_same_description: bool,
}

impl Default for DuplicateCriteria {
    fn default() -> Self {
        Self {
            amount_tolerance: MoneyCents::ZERO,
            day_tolerance: 1,
            require_same_description: false,
        }
    }
}

/// Transactions that look like repeats of each other, oldest first.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub account_id: Uuid,
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Breakdown {
    pub income: MoneyCents,
    pub expense: MoneyCents,
    pub count: u64,
}

impl Breakdown {
    pub fn net(&self) -> MoneyCents {
        self.income - self.expense
    }

    pub(crate) fn add(&mut self, tx_type: TransactionType, amount: MoneyCents, count: u64) {
        match tx_type {
            TransactionType::Credit => self.income += amount,
            TransactionType::Debit => self.expense += amount,
        }
        self.count += count;
    }
}

/// Aggregates over a date range. Cancelled and hidden rows are excluded.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TransactionStatistics {
    pub totals: Breakdown,
    pub by_category: BTreeMap<Uuid, Breakdown>,
    pub uncategorized: Breakdown,
    pub by_account: BTreeMap<Uuid, Breakdown>,
    pub daily: BTreeMap<NaiveDate, Breakdown>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tx_type: TransactionType, cents: i64) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            category_id: None,
            amount: MoneyCents::new(cents),
            transaction_type: tx_type,
            status: TransactionStatus::Posted,
            source: TransactionSource::Manual,
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            authorized_date: None,
            description: "Coffee".to_string(),
            merchant_name: None,
            original_description: None,
            currency: Currency::Usd,
            notes: None,
            tags: Vec::new(),
            location: None,
            split: None,
            external_id: None,
            provider_metadata: None,
            is_hidden: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn debit_is_expense_and_displays_negative() {
        let tx = sample(TransactionType::Debit, 550);
        assert!(tx.is_expense());
        assert_eq!(tx.display_amount(), MoneyCents::new(-550));
        assert_eq!(tx.formatted_amount(), "-$5.50");
    }

    #[test]
    fn credit_is_not_expense() {
        let tx = sample(TransactionType::Credit, 120_000);
        assert!(!tx.is_expense());
        assert_eq!(tx.formatted_amount(), "$1,200.00");
    }

    #[test]
    fn zero_amounts_never_need_categorization() {
        let mut tx = sample(TransactionType::Debit, 0);
        assert!(!tx.needs_categorization());
        assert!(!tx.is_expense());
        tx.amount = MoneyCents::new(1);
        assert!(tx.needs_categorization());
        tx.category_id = Some(Uuid::new_v4());
        assert!(!tx.needs_categorization());
    }

    #[test]
    fn split_requires_parts() {
        let mut tx = sample(TransactionType::Debit, 1000);
        tx.split = Some(SplitDetails::default());
        assert!(!tx.is_split());
        tx.split = Some(SplitDetails {
            parts: vec![SplitPart {
                amount: MoneyCents::new(500),
                category_id: None,
                note: None,
            }],
            group_id: None,
        });
        assert!(tx.is_split());
    }

    #[test]
    fn breakdown_tracks_direction() {
        let mut breakdown = Breakdown::default();
        breakdown.add(TransactionType::Credit, MoneyCents::new(1000), 1);
        breakdown.add(TransactionType::Debit, MoneyCents::new(250), 2);
        assert_eq!(breakdown.net(), MoneyCents::new(750));
        assert_eq!(breakdown.count, 3);
    }
}
