//! Aggregation engine.

use std::collections::HashMap;
use std::sync::Arc;

use chrono_tz::Tz;
use finlyt_shared::config::AnalyticsConfig;
use finlyt_shared::types::OwnerId;
use rust_decimal::Decimal;

use super::error::AnalyticsError;
use super::range::DateRange;
use super::types::{CategoryActivity, CategoryTotal, MonthlySummary, PeriodQuery};
use crate::ledger::types::TransactionKind;
use crate::store::{EntityStore, Grouping, TransactionFilter};

/// Read-only totals over an owner's transactions.
pub struct AggregationEngine<S: ?Sized> {
    store: Arc<S>,
    timezone: Tz,
}

impl<S: ?Sized> Clone for AggregationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            timezone: self.timezone,
        }
    }
}

impl<S: EntityStore + ?Sized> AggregationEngine<S> {
    /// Creates an engine reporting in the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTimezone` if the timezone is not an IANA name.
    pub fn new(store: Arc<S>, config: &AnalyticsConfig) -> Result<Self, AnalyticsError> {
        let timezone = config
            .timezone
            .parse::<Tz>()
            .map_err(|_| AnalyticsError::UnknownTimezone(config.timezone.clone()))?;
        Ok(Self::with_timezone(store, timezone))
    }

    /// Creates an engine reporting in `timezone`.
    #[must_use]
    pub fn with_timezone(store: Arc<S>, timezone: Tz) -> Self {
        Self { store, timezone }
    }

    /// The reporting timezone.
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Resolves a period in the reporting timezone.
    ///
    /// # Errors
    ///
    /// See [`DateRange::resolve`].
    pub fn resolve(&self, query: &PeriodQuery) -> Result<DateRange, AnalyticsError> {
        DateRange::resolve(query, self.timezone)
    }

    /// Income, expense and savings over the period.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad period, or a store error.
    pub async fn monthly_summary(
        &self,
        owner_id: OwnerId,
        query: &PeriodQuery,
    ) -> Result<MonthlySummary, AnalyticsError> {
        let range = self.resolve(query)?;
        let filter = TransactionFilter::owned_by(owner_id).between(range.start, range.end);
        let groups = self
            .store
            .aggregate_transactions(&filter, Grouping::Kind)
            .await?;

        let mut income = Decimal::ZERO;
        let mut expense = Decimal::ZERO;
        for group in groups {
            match group.kind {
                Some(TransactionKind::Income) => income += group.total,
                Some(TransactionKind::Expense) => expense += group.total,
                None => {}
            }
        }

        Ok(MonthlySummary {
            income,
            expense,
            savings: income - expense,
        })
    }

    /// Expense totals per category, largest first.
    ///
    /// Equal totals are ordered by category name.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad period, or a store error.
    pub async fn category_breakdown(
        &self,
        owner_id: OwnerId,
        query: &PeriodQuery,
    ) -> Result<Vec<CategoryTotal>, AnalyticsError> {
        let range = self.resolve(query)?;
        let filter = TransactionFilter::owned_by(owner_id)
            .kind(TransactionKind::Expense)
            .between(range.start, range.end);
        let groups = self
            .store
            .aggregate_transactions(&filter, Grouping::Category)
            .await?;

        let mut totals: Vec<CategoryTotal> = groups
            .into_iter()
            .filter_map(|g| {
                g.category.map(|category| CategoryTotal {
                    category,
                    total: g.total,
                })
            })
            .collect();
        totals.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));

        Ok(totals)
    }

    /// One row per owner category, sorted by name, zero-filled when the
    /// category had no activity in the period.
    ///
    /// Activity under a category name the owner has no category for is not
    /// reported.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad period, or a store error.
    pub async fn category_breakdown_all(
        &self,
        owner_id: OwnerId,
        query: &PeriodQuery,
    ) -> Result<Vec<CategoryActivity>, AnalyticsError> {
        let range = self.resolve(query)?;
        let categories = self.store.list_categories(owner_id).await?;
        let filter = TransactionFilter::owned_by(owner_id).between(range.start, range.end);
        let groups = self
            .store
            .aggregate_transactions(&filter, Grouping::CategoryAndKind)
            .await?;

        let mut sums: HashMap<(String, TransactionKind), (Decimal, u64)> = HashMap::new();
        for group in groups {
            if let (Some(category), Some(kind)) = (group.category, group.kind) {
                sums.insert((category, kind), (group.total, group.count));
            }
        }

        Ok(categories
            .iter()
            .map(|category| {
                let mut row = CategoryActivity::empty(category);
                if let Some((total, count)) =
                    sums.get(&(category.name.clone(), TransactionKind::Income))
                {
                    row.income = *total;
                    row.income_count = *count;
                }
                if let Some((total, count)) =
                    sums.get(&(category.name.clone(), TransactionKind::Expense))
                {
                    row.expense = *total;
                    row.expense_count = *count;
                }
                row
            })
            .collect())
    }

    /// Expense total of one category over a resolved range.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn category_spend(
        &self,
        owner_id: OwnerId,
        range: &DateRange,
        category: &str,
    ) -> Result<Decimal, AnalyticsError> {
        let filter = TransactionFilter::owned_by(owner_id)
            .kind(TransactionKind::Expense)
            .category(category)
            .between(range.start, range.end);
        let groups = self
            .store
            .aggregate_transactions(&filter, Grouping::Total)
            .await?;

        Ok(groups.iter().map(|g| g.total).sum())
    }
}
