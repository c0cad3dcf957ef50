//! Aggregation input and output types.

use chrono::{DateTime, NaiveDate, Utc};
use finlyt_shared::types::{CategoryId, OwnerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::types::TransactionKind;

/// An owner's category. Read-only for the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Category ID.
    pub id: CategoryId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Name, unique per owner.
    pub name: String,
    /// Whether the category tracks income or expense.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Period selector shared by every aggregation.
///
/// `from`/`to` win when both are present; otherwise `month`/`year` are used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PeriodQuery {
    /// Month, 1 through 12.
    pub month: Option<u32>,
    /// Calendar year.
    pub year: Option<i32>,
    /// First included day.
    pub from: Option<NaiveDate>,
    /// Last included day.
    pub to: Option<NaiveDate>,
}

impl PeriodQuery {
    /// A calendar month.
    #[must_use]
    pub fn month(year: i32, month: u32) -> Self {
        Self {
            month: Some(month),
            year: Some(year),
            ..Self::default()
        }
    }

    /// An inclusive day range.
    #[must_use]
    pub fn days(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }
}

/// Income, expense and their difference over a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    /// Sum of income amounts.
    pub income: Decimal,
    /// Sum of expense amounts.
    pub expense: Decimal,
    /// `income - expense`.
    pub savings: Decimal,
}

/// Expense total of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    /// Category name.
    pub category: String,
    /// Sum of expense amounts.
    pub total: Decimal,
}

/// Activity of one category, zero-filled when nothing happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryActivity {
    /// Category name.
    pub category: String,
    /// The category's own kind.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Sum of income amounts.
    pub income: Decimal,
    /// Sum of expense amounts.
    pub expense: Decimal,
    /// Number of income transactions.
    pub income_count: u64,
    /// Number of expense transactions.
    pub expense_count: u64,
}

impl CategoryActivity {
    /// A row with no activity.
    #[must_use]
    pub fn empty(category: &Category) -> Self {
        Self {
            category: category.name.clone(),
            kind: category.kind,
            income: Decimal::ZERO,
            expense: Decimal::ZERO,
            income_count: 0,
            expense_count: 0,
        }
    }
}
