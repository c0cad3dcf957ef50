//! Budget data types.

use chrono::{DateTime, Utc};
use finlyt_shared::types::{BudgetId, OwnerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monthly spending limit for one category.
///
/// Unique per `(owner_id, category, month, year)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// Budget ID.
    pub id: BudgetId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Category name the limit applies to.
    pub category: String,
    /// Month, 1 through 12.
    pub month: u32,
    /// Calendar year.
    pub year: i32,
    /// Spending limit, never negative.
    pub limit: Decimal,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    /// Returns true if both budgets share the same unique key.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.owner_id == other.owner_id
            && self.category == other.category
            && self.month == other.month
            && self.year == other.year
    }
}

/// Wire shape of an upsert request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpsertBudgetRequest {
    /// Category name.
    pub category: Option<String>,
    /// Month, 1 through 12.
    pub month: Option<u32>,
    /// Calendar year.
    pub year: Option<i32>,
    /// Spending limit.
    pub limit: Option<Decimal>,
}

/// Month selector for listing budgets.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct BudgetPeriod {
    /// Month, 1 through 12.
    pub month: Option<u32>,
    /// Calendar year.
    pub year: Option<i32>,
}

/// Spend figures derived from a limit and the actual spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageFigures {
    /// Sum of expense amounts in the budget's category and month.
    pub spent: Decimal,
    /// `max(limit - spent, 0)`.
    pub remaining: Decimal,
    /// Whole percent of the limit spent; 0 when the limit is 0.
    pub percent_used: Decimal,
}

/// A budget together with its usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetUsage {
    /// The budget record.
    #[serde(flatten)]
    pub budget: Budget,
    /// Derived spend figures.
    #[serde(flatten)]
    pub usage: UsageFigures,
}
