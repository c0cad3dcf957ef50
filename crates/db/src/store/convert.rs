//! Conversions between `SeaORM` models and core domain types.

use chrono::Utc;
use finlyt_core::analytics::Category;
use finlyt_core::budget::Budget;
use finlyt_core::ledger::{Account, AccountKind, Transaction, TransactionKind};
use finlyt_core::store::StoreError;
use finlyt_shared::types::{AccountId, BudgetId, CategoryId, OwnerId, TransactionId};
use sea_orm::{DbErr, Set, SqlErr};

use crate::entities::sea_orm_active_enums::{AccountType, TransactionType};
use crate::entities::{accounts, budgets, categories, transactions};

/// Maps a database error onto the store taxonomy.
pub(crate) fn store_err(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::Duplicate(detail),
        _ => StoreError::Backend(err.to_string()),
    }
}

impl From<TransactionType> for TransactionKind {
    fn from(value: TransactionType) -> Self {
        match value {
            TransactionType::Income => Self::Income,
            TransactionType::Expense => Self::Expense,
        }
    }
}

impl From<TransactionKind> for TransactionType {
    fn from(value: TransactionKind) -> Self {
        match value {
            TransactionKind::Income => Self::Income,
            TransactionKind::Expense => Self::Expense,
        }
    }
}

impl From<AccountType> for AccountKind {
    fn from(value: AccountType) -> Self {
        match value {
            AccountType::Cash => Self::Cash,
            AccountType::Bank => Self::Bank,
            AccountType::Card => Self::Card,
            AccountType::Wallet => Self::Wallet,
            AccountType::Upi => Self::Upi,
            AccountType::Other => Self::Other,
        }
    }
}

impl From<AccountKind> for AccountType {
    fn from(value: AccountKind) -> Self {
        match value {
            AccountKind::Cash => Self::Cash,
            AccountKind::Bank => Self::Bank,
            AccountKind::Card => Self::Card,
            AccountKind::Wallet => Self::Wallet,
            AccountKind::Upi => Self::Upi,
            AccountKind::Other => Self::Other,
        }
    }
}

// ========== Accounts ==========

pub(crate) fn account_from_model(model: accounts::Model) -> Account {
    Account {
        id: AccountId::from_uuid(model.id),
        owner_id: OwnerId::from_uuid(model.owner_id),
        name: model.name,
        kind: model.account_type.into(),
        opening_balance: model.opening_balance,
        balance: model.balance,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn account_to_active(account: &Account) -> accounts::ActiveModel {
    accounts::ActiveModel {
        id: Set(account.id.into_inner()),
        owner_id: Set(account.owner_id.into_inner()),
        name: Set(account.name.clone()),
        account_type: Set(account.kind.into()),
        opening_balance: Set(account.opening_balance),
        balance: Set(account.balance),
        created_at: Set(account.created_at.into()),
        updated_at: Set(account.updated_at.into()),
    }
}

// ========== Transactions ==========

pub(crate) fn transaction_from_model(model: transactions::Model) -> Transaction {
    Transaction {
        id: TransactionId::from_uuid(model.id),
        owner_id: OwnerId::from_uuid(model.owner_id),
        kind: model.transaction_type.into(),
        amount: model.amount,
        category: model.category,
        description: model.description,
        account_id: AccountId::from_uuid(model.account_id),
        date: model.transaction_date.with_timezone(&Utc),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn transaction_to_active(tx: &Transaction) -> transactions::ActiveModel {
    transactions::ActiveModel {
        id: Set(tx.id.into_inner()),
        owner_id: Set(tx.owner_id.into_inner()),
        transaction_type: Set(tx.kind.into()),
        amount: Set(tx.amount),
        category: Set(tx.category.clone()),
        description: Set(tx.description.clone()),
        account_id: Set(tx.account_id.into_inner()),
        transaction_date: Set(tx.date.into()),
        created_at: Set(tx.created_at.into()),
        updated_at: Set(tx.updated_at.into()),
    }
}

// ========== Categories ==========

pub(crate) fn category_from_model(model: categories::Model) -> Category {
    Category {
        id: CategoryId::from_uuid(model.id),
        owner_id: OwnerId::from_uuid(model.owner_id),
        name: model.name,
        kind: model.category_type.into(),
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn category_to_active(category: &Category) -> categories::ActiveModel {
    categories::ActiveModel {
        id: Set(category.id.into_inner()),
        owner_id: Set(category.owner_id.into_inner()),
        name: Set(category.name.clone()),
        category_type: Set(category.kind.into()),
        created_at: Set(category.created_at.into()),
    }
}

// ========== Budgets ==========

pub(crate) fn budget_from_model(model: budgets::Model) -> Result<Budget, StoreError> {
    let month = u32::try_from(model.month)
        .map_err(|_| StoreError::Backend(format!("budget {} has month {}", model.id, model.month)))?;

    Ok(Budget {
        id: BudgetId::from_uuid(model.id),
        owner_id: OwnerId::from_uuid(model.owner_id),
        category: model.category,
        month,
        year: model.year,
        limit: model.spending_limit,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub(crate) fn budget_to_active(budget: &Budget) -> Result<budgets::ActiveModel, StoreError> {
    let month = db_month(budget.month)?;

    Ok(budgets::ActiveModel {
        id: Set(budget.id.into_inner()),
        owner_id: Set(budget.owner_id.into_inner()),
        category: Set(budget.category.clone()),
        month: Set(month),
        year: Set(budget.year),
        spending_limit: Set(budget.limit),
        created_at: Set(budget.created_at.into()),
        updated_at: Set(budget.updated_at.into()),
    })
}

pub(crate) fn db_month(month: u32) -> Result<i32, StoreError> {
    i32::try_from(month).map_err(|_| StoreError::Backend(format!("month {month} out of range")))
}
