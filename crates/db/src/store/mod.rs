//! Postgres implementation of the core entity store.
//!
//! Balance adjustments are single `UPDATE ... SET balance = balance + $1`
//! statements, and ledger batches run inside one database transaction, so
//! the compensating fallback in `finlyt_core` is never used here.
//!
//! Record replacements and removals lock the row with `FOR UPDATE` and
//! compare it with the caller's expected version before writing. A second
//! process that read the same version blocks on the lock, then sees the
//! new row and fails with `StoreError::Conflict`.

mod convert;

use async_trait::async_trait;
use chrono::Utc;
use finlyt_core::analytics::Category;
use finlyt_core::budget::Budget;
use finlyt_core::ledger::{Account, Transaction};
use finlyt_core::store::{
    BatchReceipt, EntityStore, GroupTotal, Grouping, LedgerBatch, LedgerWrite, StoreError,
    TransactionFilter,
};
use finlyt_shared::types::{AccountId, BudgetId, OwnerId, TransactionId};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, TransactionTrait,
};
use tracing::{debug, error};
use uuid::Uuid;

use crate::entities::sea_orm_active_enums::TransactionType;
use crate::entities::{accounts, budgets, categories, transactions};
use convert::{
    account_from_model, account_to_active, budget_from_model, budget_to_active,
    category_from_model, category_to_active, db_month, store_err, transaction_from_model,
    transaction_to_active,
};

/// Entity store backed by a `SeaORM` Postgres connection.
#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    /// Creates a new store.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the underlying connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Lists `(owner, account)` pairs for every account in the database.
    pub async fn all_account_refs(&self) -> Result<Vec<(OwnerId, AccountId)>, StoreError> {
        let rows: Vec<(Uuid, Uuid)> = accounts::Entity::find()
            .select_only()
            .column(accounts::Column::OwnerId)
            .column(accounts::Column::Id)
            .order_by_asc(accounts::Column::OwnerId)
            .order_by_asc(accounts::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|(owner, account)| (OwnerId::from_uuid(owner), AccountId::from_uuid(account)))
            .collect())
    }
}

#[async_trait]
impl EntityStore for SeaOrmStore {
    // ========== Accounts ==========

    async fn find_account(
        &self,
        owner_id: OwnerId,
        account_id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        let model = accounts::Entity::find_by_id(account_id.into_inner())
            .filter(accounts::Column::OwnerId.eq(owner_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(store_err)?;

        Ok(model.map(account_from_model))
    }

    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        let model = account_to_active(&account)
            .insert(&self.db)
            .await
            .map_err(store_err)?;

        Ok(account_from_model(model))
    }

    async fn adjust_balance(
        &self,
        owner_id: OwnerId,
        account_id: AccountId,
        delta: Decimal,
    ) -> Result<Option<Account>, StoreError> {
        adjust_balance(&self.db, owner_id, account_id, delta).await
    }

    // ========== Transactions ==========

    async fn find_transaction(
        &self,
        owner_id: OwnerId,
        transaction_id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let model = owned_transaction(owner_id, transaction_id)
            .one(&self.db)
            .await
            .map_err(store_err)?;

        Ok(model.map(transaction_from_model))
    }

    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        let models = filtered(filter)
            .order_by_asc(transactions::Column::TransactionDate)
            .order_by_asc(transactions::Column::Id)
            .all(&self.db)
            .await
            .map_err(store_err)?;

        Ok(models.into_iter().map(transaction_from_model).collect())
    }

    async fn insert_transaction(&self, transaction: Transaction) -> Result<Transaction, StoreError> {
        insert_transaction(&self.db, &transaction).await
    }

    async fn replace_transaction(
        &self,
        expected: &Transaction,
        updated: Transaction,
    ) -> Result<Option<Transaction>, StoreError> {
        let txn = self.db.begin().await.map_err(store_err)?;
        let result = replace_transaction(&txn, expected, &updated).await;
        finish(txn, result).await
    }

    async fn remove_transaction(
        &self,
        expected: &Transaction,
    ) -> Result<Option<Transaction>, StoreError> {
        let txn = self.db.begin().await.map_err(store_err)?;
        let result = remove_transaction(&txn, expected).await;
        finish(txn, result).await
    }

    async fn aggregate_transactions(
        &self,
        filter: &TransactionFilter,
        grouping: Grouping,
    ) -> Result<Vec<GroupTotal>, StoreError> {
        let sum = Expr::col(transactions::Column::Amount).sum();
        let count = Expr::col(transactions::Column::Id).count();
        let query = filtered(filter).select_only();

        let groups = match grouping {
            Grouping::Total => {
                let rows: Vec<(Option<Decimal>, i64)> = query
                    .column_as(sum, "total")
                    .column_as(count, "count")
                    .into_tuple()
                    .all(&self.db)
                    .await
                    .map_err(store_err)?;
                rows.into_iter()
                    .filter_map(|(total, count)| group_total(None, None, total, count))
                    .collect()
            }
            Grouping::Kind => {
                let rows: Vec<(TransactionType, Option<Decimal>, i64)> = query
                    .column(transactions::Column::TransactionType)
                    .column_as(sum, "total")
                    .column_as(count, "count")
                    .group_by(transactions::Column::TransactionType)
                    .into_tuple()
                    .all(&self.db)
                    .await
                    .map_err(store_err)?;
                rows.into_iter()
                    .filter_map(|(kind, total, count)| {
                        group_total(None, Some(kind), total, count)
                    })
                    .collect()
            }
            Grouping::Category => {
                let rows: Vec<(String, Option<Decimal>, i64)> = query
                    .column(transactions::Column::Category)
                    .column_as(sum, "total")
                    .column_as(count, "count")
                    .group_by(transactions::Column::Category)
                    .order_by_asc(transactions::Column::Category)
                    .into_tuple()
                    .all(&self.db)
                    .await
                    .map_err(store_err)?;
                rows.into_iter()
                    .filter_map(|(category, total, count)| {
                        group_total(Some(category), None, total, count)
                    })
                    .collect()
            }
            Grouping::CategoryAndKind => {
                let rows: Vec<(String, TransactionType, Option<Decimal>, i64)> = query
                    .column(transactions::Column::Category)
                    .column(transactions::Column::TransactionType)
                    .column_as(sum, "total")
                    .column_as(count, "count")
                    .group_by(transactions::Column::Category)
                    .group_by(transactions::Column::TransactionType)
                    .order_by_asc(transactions::Column::Category)
                    .into_tuple()
                    .all(&self.db)
                    .await
                    .map_err(store_err)?;
                rows.into_iter()
                    .filter_map(|(category, kind, total, count)| {
                        group_total(Some(category), Some(kind), total, count)
                    })
                    .collect()
            }
        };

        Ok(groups)
    }

    // ========== Categories ==========

    async fn list_categories(&self, owner_id: OwnerId) -> Result<Vec<Category>, StoreError> {
        let models = categories::Entity::find()
            .filter(categories::Column::OwnerId.eq(owner_id.into_inner()))
            .order_by_asc(categories::Column::Name)
            .all(&self.db)
            .await
            .map_err(store_err)?;

        Ok(models.into_iter().map(category_from_model).collect())
    }

    async fn insert_category(&self, category: Category) -> Result<Category, StoreError> {
        let model = category_to_active(&category)
            .insert(&self.db)
            .await
            .map_err(store_err)?;

        Ok(category_from_model(model))
    }

    // ========== Budgets ==========

    async fn upsert_budget(&self, budget: Budget) -> Result<Budget, StoreError> {
        // The conflict target keeps the original id and created_at.
        let model = budgets::Entity::insert(budget_to_active(&budget)?)
            .on_conflict(
                OnConflict::columns([
                    budgets::Column::OwnerId,
                    budgets::Column::Category,
                    budgets::Column::Month,
                    budgets::Column::Year,
                ])
                .update_columns([budgets::Column::SpendingLimit, budgets::Column::UpdatedAt])
                .to_owned(),
            )
            .exec_with_returning(&self.db)
            .await
            .map_err(store_err)?;

        budget_from_model(model)
    }

    async fn find_budgets(
        &self,
        owner_id: OwnerId,
        month: u32,
        year: i32,
    ) -> Result<Vec<Budget>, StoreError> {
        let models = budgets::Entity::find()
            .filter(budgets::Column::OwnerId.eq(owner_id.into_inner()))
            .filter(budgets::Column::Month.eq(db_month(month)?))
            .filter(budgets::Column::Year.eq(year))
            .order_by_asc(budgets::Column::CreatedAt)
            .order_by_asc(budgets::Column::Id)
            .all(&self.db)
            .await
            .map_err(store_err)?;

        models.into_iter().map(budget_from_model).collect()
    }

    async fn remove_budget(
        &self,
        owner_id: OwnerId,
        budget_id: BudgetId,
    ) -> Result<Option<Budget>, StoreError> {
        let Some(model) = budgets::Entity::find_by_id(budget_id.into_inner())
            .filter(budgets::Column::OwnerId.eq(owner_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(store_err)?
        else {
            return Ok(None);
        };

        budgets::Entity::delete_by_id(model.id)
            .exec(&self.db)
            .await
            .map_err(store_err)?;

        budget_from_model(model).map(Some)
    }

    // ========== Multi-entity writes ==========

    async fn apply_batch(&self, batch: LedgerBatch) -> Result<BatchReceipt, StoreError> {
        let owner_id = batch.owner_id;
        let txn = self.db.begin().await.map_err(store_err)?;
        let mut receipt = BatchReceipt::default();

        for (step, write) in batch.writes.into_iter().enumerate() {
            if let Err(err) = apply_write(&txn, owner_id, write, &mut receipt).await {
                debug!(%owner_id, step, error = %err, "rolling back ledger batch");
                if let Err(rollback_err) = txn.rollback().await {
                    error!(%owner_id, error = %rollback_err, "ledger batch rollback failed");
                }
                return Err(err);
            }
        }

        txn.commit().await.map_err(store_err)?;
        Ok(receipt)
    }
}

// ============================================================================
// Connection-generic helpers shared by the pool and batch transactions
// ============================================================================

async fn apply_write<C: ConnectionTrait>(
    conn: &C,
    owner_id: OwnerId,
    write: LedgerWrite,
    receipt: &mut BatchReceipt,
) -> Result<(), StoreError> {
    match write {
        LedgerWrite::AdjustBalance {
            account_id,
            delta,
            required,
        } => match adjust_balance(conn, owner_id, account_id, delta).await? {
            Some(account) => receipt.adjusted.push(account),
            None if required => return Err(StoreError::AccountMissing(account_id)),
            None => receipt.skipped.push(account_id),
        },
        LedgerWrite::InsertTransaction(tx) => {
            insert_transaction(conn, &tx).await?;
        }
        LedgerWrite::ReplaceTransaction { expected, updated } => {
            replace_transaction(conn, &expected, &updated)
                .await?
                .ok_or(StoreError::TransactionMissing(expected.id))?;
        }
        LedgerWrite::RemoveTransaction { expected } => {
            remove_transaction(conn, &expected)
                .await?
                .ok_or(StoreError::TransactionMissing(expected.id))?;
        }
    }
    Ok(())
}

async fn adjust_balance<C: ConnectionTrait>(
    conn: &C,
    owner_id: OwnerId,
    account_id: AccountId,
    delta: Decimal,
) -> Result<Option<Account>, StoreError> {
    let updated = accounts::Entity::update_many()
        .col_expr(
            accounts::Column::Balance,
            Expr::col(accounts::Column::Balance).add(delta),
        )
        .col_expr(accounts::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(accounts::Column::Id.eq(account_id.into_inner()))
        .filter(accounts::Column::OwnerId.eq(owner_id.into_inner()))
        .exec_with_returning(conn)
        .await
        .map_err(store_err)?;

    Ok(updated.into_iter().next().map(account_from_model))
}

async fn insert_transaction<C: ConnectionTrait>(
    conn: &C,
    tx: &Transaction,
) -> Result<Transaction, StoreError> {
    let model = transaction_to_active(tx)
        .insert(conn)
        .await
        .map_err(store_err)?;

    Ok(transaction_from_model(model))
}

/// Locks the stored row with `SELECT ... FOR UPDATE` and checks it still
/// matches `expected`. Must run inside a database transaction.
async fn lock_expected<C: ConnectionTrait>(
    conn: &C,
    expected: &Transaction,
) -> Result<Option<Transaction>, StoreError> {
    let Some(model) = owned_transaction(expected.owner_id, expected.id)
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(store_err)?
    else {
        return Ok(None);
    };

    let current = transaction_from_model(model);
    if current != *expected {
        return Err(StoreError::Conflict(expected.id));
    }
    Ok(Some(current))
}

async fn replace_transaction<C: ConnectionTrait>(
    conn: &C,
    expected: &Transaction,
    updated: &Transaction,
) -> Result<Option<Transaction>, StoreError> {
    let Some(previous) = lock_expected(conn, expected).await? else {
        return Ok(None);
    };

    transaction_to_active(updated)
        .update(conn)
        .await
        .map_err(store_err)?;

    Ok(Some(previous))
}

async fn remove_transaction<C: ConnectionTrait>(
    conn: &C,
    expected: &Transaction,
) -> Result<Option<Transaction>, StoreError> {
    let Some(previous) = lock_expected(conn, expected).await? else {
        return Ok(None);
    };

    transactions::Entity::delete_by_id(previous.id.into_inner())
        .exec(conn)
        .await
        .map_err(store_err)?;

    Ok(Some(previous))
}

/// Commits on success and rolls back on error.
async fn finish<T>(
    txn: DatabaseTransaction,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            txn.commit().await.map_err(store_err)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                error!(error = %rollback_err, "store write rollback failed");
            }
            Err(err)
        }
    }
}

fn owned_transaction(owner_id: OwnerId, transaction_id: TransactionId) -> Select<transactions::Entity> {
    transactions::Entity::find_by_id(transaction_id.into_inner())
        .filter(transactions::Column::OwnerId.eq(owner_id.into_inner()))
}

/// Translates a filter into `WHERE` clauses. Dates are half-open.
fn filtered(filter: &TransactionFilter) -> Select<transactions::Entity> {
    let mut query = transactions::Entity::find()
        .filter(transactions::Column::OwnerId.eq(filter.owner_id.into_inner()));

    if let Some(account_id) = filter.account_id {
        query = query.filter(transactions::Column::AccountId.eq(account_id.into_inner()));
    }
    if let Some(kind) = filter.kind {
        query = query.filter(transactions::Column::TransactionType.eq(TransactionType::from(kind)));
    }
    if let Some(category) = &filter.category {
        query = query.filter(transactions::Column::Category.eq(category.as_str()));
    }
    if let Some(start) = filter.start {
        query = query.filter(transactions::Column::TransactionDate.gte(start));
    }
    if let Some(end) = filter.end {
        query = query.filter(transactions::Column::TransactionDate.lt(end));
    }

    query
}

fn group_total(
    category: Option<String>,
    kind: Option<TransactionType>,
    total: Option<Decimal>,
    count: i64,
) -> Option<GroupTotal> {
    let count = u64::try_from(count).ok().filter(|c| *c > 0)?;
    Some(GroupTotal {
        category,
        kind: kind.map(Into::into),
        total: total.unwrap_or(Decimal::ZERO),
        count,
    })
}
