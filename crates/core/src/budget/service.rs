//! Budget tracker: monthly limits per category and their usage.

use std::sync::Arc;

use chrono::Utc;
use finlyt_shared::types::{BudgetId, OwnerId};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::error::BudgetError;
use super::types::{Budget, BudgetPeriod, BudgetUsage, UpsertBudgetRequest};
use super::usage::usage;
use crate::analytics::{AggregationEngine, DateRange};
use crate::ledger::validation::fits_money_scale;
use crate::store::EntityStore;

/// Validated upsert input.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BudgetKey {
    category: String,
    month: u32,
    year: i32,
    limit: Decimal,
}

/// Budget tracker.
pub struct BudgetTracker<S: ?Sized> {
    store: Arc<S>,
    analytics: AggregationEngine<S>,
}

impl<S: EntityStore + ?Sized> BudgetTracker<S> {
    /// Creates a tracker that reads spend through `analytics`.
    #[must_use]
    pub fn new(store: Arc<S>, analytics: AggregationEngine<S>) -> Self {
        Self { store, analytics }
    }

    /// Creates the budget for `(owner, category, month, year)` or replaces
    /// the limit of the existing one.
    ///
    /// # Errors
    ///
    /// Returns a validation error when a field is missing, the month is out
    /// of range, or the limit is negative or has more than four decimal
    /// places. Nothing is written in that case.
    pub async fn upsert_budget(
        &self,
        owner_id: OwnerId,
        request: UpsertBudgetRequest,
    ) -> Result<Budget, BudgetError> {
        let key = validate_upsert(request)?;
        let now = Utc::now();

        let budget = self
            .store
            .upsert_budget(Budget {
                id: BudgetId::new(),
                owner_id,
                category: key.category,
                month: key.month,
                year: key.year,
                limit: key.limit,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(
            %owner_id,
            budget_id = %budget.id,
            category = %budget.category,
            month = budget.month,
            year = budget.year,
            limit = %budget.limit,
            "Budget saved"
        );

        Ok(budget)
    }

    /// Lists the owner's budgets for one month with spend figures.
    ///
    /// Spend is the sum of expense transactions in the budget's category
    /// during the calendar month. Budgets come back in store order.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the month or year is missing or the
    /// month is out of range.
    pub async fn list_budgets_with_usage(
        &self,
        owner_id: OwnerId,
        period: BudgetPeriod,
    ) -> Result<Vec<BudgetUsage>, BudgetError> {
        let month = period.month.ok_or(BudgetError::MissingField("month"))?;
        let year = period.year.ok_or(BudgetError::MissingField("year"))?;
        if !(1..=12).contains(&month) {
            return Err(BudgetError::InvalidMonth(month));
        }
        let range = DateRange::for_month(year, month, self.analytics.timezone())?;

        let budgets = self.store.find_budgets(owner_id, month, year).await?;
        debug!(%owner_id, month, year, count = budgets.len(), "Computing budget usage");

        let mut rows = Vec::with_capacity(budgets.len());
        for budget in budgets {
            let spent = self
                .analytics
                .category_spend(owner_id, &range, &budget.category)
                .await?;
            let figures = usage(budget.limit, spent);
            rows.push(BudgetUsage {
                budget,
                usage: figures,
            });
        }

        Ok(rows)
    }

    /// Deletes a budget. Transactions and accounts are untouched.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` if the owner has no such budget.
    pub async fn delete_budget(
        &self,
        owner_id: OwnerId,
        budget_id: BudgetId,
    ) -> Result<(), BudgetError> {
        let removed = self
            .store
            .remove_budget(owner_id, budget_id)
            .await?
            .ok_or(BudgetError::NotFound(budget_id))?;

        info!(%owner_id, budget_id = %removed.id, "Budget deleted");
        Ok(())
    }
}

fn validate_upsert(request: UpsertBudgetRequest) -> Result<BudgetKey, BudgetError> {
    let category = request
        .category
        .ok_or(BudgetError::MissingField("category"))?;
    let month = request.month.ok_or(BudgetError::MissingField("month"))?;
    let year = request.year.ok_or(BudgetError::MissingField("year"))?;
    let limit = request.limit.ok_or(BudgetError::MissingField("limit"))?;

    let category = category.trim();
    if category.is_empty() {
        return Err(BudgetError::BlankCategory);
    }
    if !(1..=12).contains(&month) {
        return Err(BudgetError::InvalidMonth(month));
    }
    if limit < Decimal::ZERO {
        return Err(BudgetError::NegativeLimit);
    }
    if !fits_money_scale(limit) {
        return Err(BudgetError::LimitTooPrecise);
    }

    Ok(BudgetKey {
        category: category.to_string(),
        month,
        year,
        limit,
    })
}
