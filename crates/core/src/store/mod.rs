//! Persistence seam for accounts, transactions, budgets and categories.
//!
//! Services in this crate never talk to a database directly. They are
//! parameterized by an injected [`EntityStore`] handle:
//! - [`MemoryStore`] for tests and embedded use
//! - `finlyt_db::SeaOrmStore` for Postgres
//!
//! Every method takes the owner id and must filter on it in addition to the
//! entity id.

pub mod batch;
pub mod error;
pub mod memory;
pub mod types;

use async_trait::async_trait;
use finlyt_shared::types::{AccountId, BudgetId, OwnerId, TransactionId};
use rust_decimal::Decimal;

use crate::analytics::types::Category;
use crate::budget::types::Budget;
use crate::ledger::types::{Account, Transaction};

pub use error::StoreError;
pub use memory::MemoryStore;
pub use types::{BatchReceipt, GroupTotal, Grouping, LedgerBatch, LedgerWrite, TransactionFilter};

/// Owner-scoped persistence used by the ledger, aggregation and budget services.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // ========== Accounts ==========

    /// Finds an account by id.
    async fn find_account(
        &self,
        owner_id: OwnerId,
        account_id: AccountId,
    ) -> Result<Option<Account>, StoreError>;

    /// Inserts a new account.
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError>;

    /// Atomically adds `delta` to the balance and returns the updated
    /// account, or `None` when no such account exists.
    ///
    /// Implementations must not read-modify-write outside of a lock or a
    /// single atomic statement.
    async fn adjust_balance(
        &self,
        owner_id: OwnerId,
        account_id: AccountId,
        delta: Decimal,
    ) -> Result<Option<Account>, StoreError>;

    // ========== Transactions ==========

    /// Finds a transaction by id.
    async fn find_transaction(
        &self,
        owner_id: OwnerId,
        transaction_id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Lists matching transactions ordered by date ascending.
    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Inserts a new transaction record.
    async fn insert_transaction(&self, transaction: Transaction) -> Result<Transaction, StoreError>;

    /// Replaces the record identified by `expected` with `updated` and
    /// returns the previous version, or `None` when no such transaction
    /// exists.
    ///
    /// The compare and the write must be atomic. Fails with
    /// `StoreError::Conflict` when the stored record differs from
    /// `expected`.
    async fn replace_transaction(
        &self,
        expected: &Transaction,
        updated: Transaction,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Removes the record identified by `expected` and returns it, or
    /// `None` when absent.
    ///
    /// Fails with `StoreError::Conflict` when the stored record differs
    /// from `expected`.
    async fn remove_transaction(
        &self,
        expected: &Transaction,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Sums `amount` and counts matching transactions per group.
    ///
    /// Groups with no matching transaction are not returned.
    async fn aggregate_transactions(
        &self,
        filter: &TransactionFilter,
        grouping: Grouping,
    ) -> Result<Vec<GroupTotal>, StoreError>;

    // ========== Categories ==========

    /// Lists the owner's categories sorted by name.
    async fn list_categories(&self, owner_id: OwnerId) -> Result<Vec<Category>, StoreError>;

    /// Inserts a category. Names are unique per owner.
    async fn insert_category(&self, category: Category) -> Result<Category, StoreError>;

    // ========== Budgets ==========

    /// Creates the budget for `(owner, category, month, year)` or replaces
    /// the limit of the existing one.
    async fn upsert_budget(&self, budget: Budget) -> Result<Budget, StoreError>;

    /// Lists the owner's budgets for one month in store order.
    async fn find_budgets(
        &self,
        owner_id: OwnerId,
        month: u32,
        year: i32,
    ) -> Result<Vec<Budget>, StoreError>;

    /// Removes a budget and returns it, or `None` when absent.
    async fn remove_budget(
        &self,
        owner_id: OwnerId,
        budget_id: BudgetId,
    ) -> Result<Option<Budget>, StoreError>;

    // ========== Multi-entity writes ==========

    /// Applies every write of the batch, or none of them.
    ///
    /// The default applies writes one by one and undoes the applied prefix
    /// on failure (see [`batch::apply_with_compensation`]). Stores with a
    /// native transaction should override it.
    async fn apply_batch(&self, batch: LedgerBatch) -> Result<BatchReceipt, StoreError> {
        batch::apply_with_compensation(self, batch).await
    }
}
