//! Hierarchical spending categories.
//!
//! Categories form an adjacency list: every node has at most one parent and
//! any number of roots may coexist (Income, Expense, Transfer, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::RepositoryError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Income,
    #[default]
    Expense,
    Transfer,
}

impl CategoryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }
}

impl TryFrom<&str> for CategoryType {
    type Error = RepositoryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            other => Err(RepositoryError::Validation(format!(
                "invalid category type: {other}"
            ))),
        }
    }
}

/// Lifecycle of a category node.
///
/// `Active` and `Inactive` can be switched freely. `Archived` is terminal and
/// only reachable together with a reassignment of the category's transactions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    #[default]
    Active,
    Inactive,
    Archived,
}

impl CategoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Archived => "archived",
        }
    }
}

impl TryFrom<&str> for CategoryStatus {
    type Error = RepositoryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "archived" => Ok(Self::Archived),
            other => Err(RepositoryError::Validation(format!(
                "invalid category status: {other}"
            ))),
        }
    }
}

/// Inclusive amount bounds in major units. Missing bounds are open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl AmountRange {
    pub fn contains(&self, amount: f64) -> bool {
        let min = self.min.unwrap_or(0.0);
        let max = self.max.unwrap_or(f64::INFINITY);
        amount >= min && amount <= max
    }
}

/// Auto-categorization rules attached to a category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CategoryRules {
    pub keywords: Vec<String>,
    pub merchant_patterns: Vec<String>,
    pub amount_ranges: Vec<AmountRange>,
    /// Minimum score for [`CategoryRepository::suggest_category`] to pick
    /// this category on its own.
    ///
    /// [`CategoryRepository::suggest_category`]: crate::CategoryRepository::suggest_category
    pub confidence_threshold: Option<u32>,
    pub auto_assign: bool,
}

impl CategoryRules {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.merchant_patterns.is_empty() && self.amount_ranges.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CategoryMetadata {
    pub budget_id: Option<String>,
    pub monthly_budget: Option<f64>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub category_type: CategoryType,
    pub status: CategoryStatus,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_default: bool,
    pub is_system: bool,
    pub sort_order: i32,
    pub parent_id: Option<Uuid>,
    pub rules: CategoryRules,
    pub metadata: CategoryMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.status == CategoryStatus::Active
    }
}

#[derive(Clone, Debug, Default)]
pub struct NewCategory {
    pub name: String,
    /// Derived from `name` when absent.
    pub slug: Option<String>,
    pub category_type: CategoryType,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_default: bool,
    pub is_system: bool,
    pub sort_order: i32,
    pub parent_id: Option<Uuid>,
    pub rules: CategoryRules,
    pub metadata: CategoryMetadata,
}

impl NewCategory {
    pub fn named(name: &str, category_type: CategoryType) -> Self {
        Self {
            name: name.to_string(),
            category_type,
            ..Default::default()
        }
    }

    pub fn under(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Field-level update. Reparenting goes through `move_category` and status
/// changes through `set_status`, which guard the tree invariants.
#[derive(Clone, Debug, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub category_type: Option<CategoryType>,
    pub color: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub is_default: Option<bool>,
    pub sort_order: Option<i32>,
    pub rules: Option<CategoryRules>,
    pub metadata: Option<CategoryMetadata>,
}

/// A node of a flattened tree walk; roots are at depth 0.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub depth: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryMatch {
    pub category: Category,
    pub score: u32,
}

/// Rows touched by a merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub transactions_moved: u64,
    pub children_moved: u64,
}
