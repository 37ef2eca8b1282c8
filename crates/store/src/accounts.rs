//! Bank accounts owned by a user.
//!
//! An account is either linked to a banking provider (`source = plaid`) and
//! kept up to date by sync jobs, or maintained by hand (`source = manual`).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, MoneyCents, RepositoryError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
    CreditCard,
    Investment,
    Loan,
    Mortgage,
    Other,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::CreditCard => "credit_card",
            Self::Investment => "investment",
            Self::Loan => "loan",
            Self::Mortgage => "mortgage",
            Self::Other => "other",
        }
    }

    /// Liability accounts carry a balance that is owed, not held.
    pub fn is_liability(self) -> bool {
        matches!(self, Self::CreditCard | Self::Loan | Self::Mortgage)
    }
}

impl TryFrom<&str> for AccountType {
    type Error = RepositoryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "credit_card" => Ok(Self::CreditCard),
            "investment" => Ok(Self::Investment),
            "loan" => Ok(Self::Loan),
            "mortgage" => Ok(Self::Mortgage),
            "other" => Ok(Self::Other),
            other => Err(RepositoryError::Validation(format!(
                "invalid account type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Closed,
    Error,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Closed => "closed",
            Self::Error => "error",
        }
    }
}

impl TryFrom<&str> for AccountStatus {
    type Error = RepositoryError;

    fn try_from(value: &str) -> Result<Self, RepositoryError> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "closed" => Ok(Self::Closed),
            "error" => Ok(Self::Error),
            other => Err(RepositoryError::Validation(format!(
                "invalid account status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountSource {
    Plaid,
    #[default]
    Manual,
}

impl AccountSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plaid => "plaid",
            Self::Manual => "manual",
        }
    }
}

impl TryFrom<&str> for AccountSource {
    type Error = RepositoryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "plaid" => Ok(Self::Plaid),
            "manual" => Ok(Self::Manual),
            other => Err(RepositoryError::Validation(format!(
                "invalid account source: {other}"
            ))),
        }
    }
}

/// Identifiers persisted from a provider link.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLink {
    pub account_id: String,
    pub item_id: Option<String>,
    pub institution_name: Option<String>,
    /// Last digits of the account number as shown by the institution.
    pub mask: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub account_type: AccountType,
    pub status: AccountStatus,
    pub source: AccountSource,
    pub currency: Currency,
    pub current_balance: MoneyCents,
    pub available_balance: Option<MoneyCents>,
    pub credit_limit: Option<MoneyCents>,
    pub sync_enabled: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
    pub provider: Option<ProviderLink>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn current_balance(&self) -> f64 {
        self.current_balance.to_major()
    }

    pub fn available_balance(&self) -> Option<f64> {
        self.available_balance.map(MoneyCents::to_major)
    }

    pub fn credit_limit(&self) -> Option<f64> {
        self.credit_limit.map(MoneyCents::to_major)
    }

    /// Remaining credit on a credit card (`limit - balance`).
    pub fn available_credit(&self) -> Option<MoneyCents> {
        if self.account_type != AccountType::CreditCard {
            return None;
        }
        self.credit_limit.map(|limit| limit - self.current_balance)
    }

    pub fn is_linked(&self) -> bool {
        self.source == AccountSource::Plaid && self.provider.is_some()
    }

    /// Whether a sync job should pick this account up at `now`.
    pub fn is_sync_due(&self, staleness: Duration, now: DateTime<Utc>) -> bool {
        self.source == AccountSource::Plaid
            && self.sync_enabled
            && self.status == AccountStatus::Active
            && self
                .last_sync_at
                .is_none_or(|synced| synced < now - staleness)
    }
}

#[derive(Clone, Debug)]
pub struct NewAccount {
    pub user_id: Uuid,
    pub name: String,
    pub account_type: AccountType,
    pub source: AccountSource,
    pub currency: Currency,
    pub current_balance: MoneyCents,
    pub available_balance: Option<MoneyCents>,
    pub credit_limit: Option<MoneyCents>,
    pub sync_enabled: bool,
    pub provider: Option<ProviderLink>,
}

impl NewAccount {
    /// A manual account with a zero balance.
    pub fn manual(user_id: Uuid, name: &str, account_type: AccountType) -> Self {
        Self {
            user_id,
            name: name.to_string(),
            account_type,
            source: AccountSource::Manual,
            currency: Currency::default(),
            current_balance: MoneyCents::ZERO,
            available_balance: None,
            credit_limit: None,
            sync_enabled: false,
            provider: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub account_type: Option<AccountType>,
    pub status: Option<AccountStatus>,
    pub credit_limit: Option<Option<MoneyCents>>,
    pub sync_enabled: Option<bool>,
}

/// Aggregated balances of one account type.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BalanceSummary {
    pub account_type: AccountType,
    pub account_count: i64,
    pub total_current: MoneyCents,
    pub total_available: MoneyCents,
}

/// When a provider-linked account is considered stale.
#[derive(Clone, Copy, Debug)]
pub struct SyncPolicy {
    pub staleness: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            staleness: Duration::hours(1),
        }
    }
}
