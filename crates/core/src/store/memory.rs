//! In-memory [`EntityStore`] used by tests and embedded callers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use finlyt_shared::types::{AccountId, BudgetId, OwnerId, TransactionId};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::error::StoreError;
use super::types::{BatchReceipt, GroupTotal, Grouping, LedgerBatch, LedgerWrite, TransactionFilter};
use super::EntityStore;
use crate::analytics::types::Category;
use crate::budget::types::Budget;
use crate::ledger::types::{Account, Transaction};

#[derive(Debug, Clone, Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    transactions: HashMap<TransactionId, Transaction>,
    budgets: Vec<Budget>,
    categories: Vec<Category>,
}

impl State {
    fn account_mut(&mut self, owner_id: OwnerId, account_id: AccountId) -> Option<&mut Account> {
        self.accounts
            .get_mut(&account_id)
            .filter(|a| a.owner_id == owner_id)
    }

    fn adjust(&mut self, owner_id: OwnerId, account_id: AccountId, delta: Decimal) -> Option<Account> {
        let account = self.account_mut(owner_id, account_id)?;
        account.balance += delta;
        account.updated_at = Utc::now();
        Some(account.clone())
    }

    fn insert_transaction(&mut self, tx: Transaction) -> Result<Transaction, StoreError> {
        if self.transactions.contains_key(&tx.id) {
            return Err(StoreError::Duplicate(format!("transaction {}", tx.id)));
        }
        self.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    /// Looks up the stored version of `expected` and checks it is unchanged.
    fn current_version(&mut self, expected: &Transaction) -> Result<Option<&mut Transaction>, StoreError> {
        let Some(slot) = self
            .transactions
            .get_mut(&expected.id)
            .filter(|t| t.owner_id == expected.owner_id)
        else {
            return Ok(None);
        };
        if *slot != *expected {
            return Err(StoreError::Conflict(expected.id));
        }
        Ok(Some(slot))
    }

    fn replace_transaction(
        &mut self,
        expected: &Transaction,
        updated: Transaction,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .current_version(expected)?
            .map(|slot| std::mem::replace(slot, updated)))
    }

    fn remove_transaction(&mut self, expected: &Transaction) -> Result<Option<Transaction>, StoreError> {
        if self.current_version(expected)?.is_none() {
            return Ok(None);
        }
        Ok(self.transactions.remove(&expected.id))
    }

    fn apply(
        &mut self,
        owner_id: OwnerId,
        write: LedgerWrite,
        receipt: &mut BatchReceipt,
    ) -> Result<(), StoreError> {
        match write {
            LedgerWrite::AdjustBalance {
                account_id,
                delta,
                required,
            } => match self.adjust(owner_id, account_id, delta) {
                Some(account) => receipt.adjusted.push(account),
                None if required => return Err(StoreError::AccountMissing(account_id)),
                None => receipt.skipped.push(account_id),
            },
            LedgerWrite::InsertTransaction(tx) => {
                self.insert_transaction(tx)?;
            }
            LedgerWrite::ReplaceTransaction { expected, updated } => {
                self.replace_transaction(&expected, updated)?
                    .ok_or(StoreError::TransactionMissing(expected.id))?;
            }
            LedgerWrite::RemoveTransaction { expected } => {
                self.remove_transaction(&expected)?
                    .ok_or(StoreError::TransactionMissing(expected.id))?;
            }
        }
        Ok(())
    }
}

/// Thread-safe in-memory store.
///
/// Cloning the handle shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_account(
        &self,
        owner_id: OwnerId,
        account_id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .get(&account_id)
            .filter(|a| a.owner_id == owner_id)
            .cloned())
    }

    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        let mut state = self.state.write().await;
        if state.accounts.contains_key(&account.id) {
            return Err(StoreError::Duplicate(format!("account {}", account.id)));
        }
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn adjust_balance(
        &self,
        owner_id: OwnerId,
        account_id: AccountId,
        delta: Decimal,
    ) -> Result<Option<Account>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.adjust(owner_id, account_id, delta))
    }

    async fn find_transaction(
        &self,
        owner_id: OwnerId,
        transaction_id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .get(&transaction_id)
            .filter(|t| t.owner_id == owner_id)
            .cloned())
    }

    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        let state = self.state.read().await;
        let mut found: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn insert_transaction(&self, transaction: Transaction) -> Result<Transaction, StoreError> {
        self.state.write().await.insert_transaction(transaction)
    }

    async fn replace_transaction(
        &self,
        expected: &Transaction,
        updated: Transaction,
    ) -> Result<Option<Transaction>, StoreError> {
        self.state.write().await.replace_transaction(expected, updated)
    }

    async fn remove_transaction(
        &self,
        expected: &Transaction,
    ) -> Result<Option<Transaction>, StoreError> {
        self.state.write().await.remove_transaction(expected)
    }

    async fn aggregate_transactions(
        &self,
        filter: &TransactionFilter,
        grouping: Grouping,
    ) -> Result<Vec<GroupTotal>, StoreError> {
        let state = self.state.read().await;
        let mut groups: BTreeMap<(Option<String>, Option<_>), (Decimal, u64)> = BTreeMap::new();

        for tx in state.transactions.values().filter(|t| filter.matches(t)) {
            let key = match grouping {
                Grouping::Total => (None, None),
                Grouping::Kind => (None, Some(tx.kind)),
                Grouping::Category => (Some(tx.category.clone()), None),
                Grouping::CategoryAndKind => (Some(tx.category.clone()), Some(tx.kind)),
            };
            let entry = groups.entry(key).or_insert((Decimal::ZERO, 0));
            entry.0 += tx.amount;
            entry.1 += 1;
        }

        Ok(groups
            .into_iter()
            .map(|((category, kind), (total, count))| GroupTotal {
                category,
                kind,
                total,
                count,
            })
            .collect())
    }

    async fn list_categories(&self, owner_id: OwnerId) -> Result<Vec<Category>, StoreError> {
        let state = self.state.read().await;
        let mut categories: Vec<Category> = state
            .categories
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn insert_category(&self, category: Category) -> Result<Category, StoreError> {
        let mut state = self.state.write().await;
        if state
            .categories
            .iter()
            .any(|c| c.owner_id == category.owner_id && c.name == category.name)
        {
            return Err(StoreError::Duplicate(format!("category {}", category.name)));
        }
        state.categories.push(category.clone());
        Ok(category)
    }

    async fn upsert_budget(&self, budget: Budget) -> Result<Budget, StoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.budgets.iter_mut().find(|b| b.same_key(&budget)) {
            existing.limit = budget.limit;
            existing.updated_at = budget.updated_at;
            return Ok(existing.clone());
        }
        state.budgets.push(budget.clone());
        Ok(budget)
    }

    async fn find_budgets(
        &self,
        owner_id: OwnerId,
        month: u32,
        year: i32,
    ) -> Result<Vec<Budget>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .budgets
            .iter()
            .filter(|b| b.owner_id == owner_id && b.month == month && b.year == year)
            .cloned()
            .collect())
    }

    async fn remove_budget(
        &self,
        owner_id: OwnerId,
        budget_id: BudgetId,
    ) -> Result<Option<Budget>, StoreError> {
        let mut state = self.state.write().await;
        let Some(pos) = state
            .budgets
            .iter()
            .position(|b| b.id == budget_id && b.owner_id == owner_id)
        else {
            return Ok(None);
        };
        Ok(Some(state.budgets.remove(pos)))
    }

    /// Applies the batch to a scratch copy under the write lock and swaps it
    /// in only when every write succeeded.
    async fn apply_batch(&self, batch: LedgerBatch) -> Result<BatchReceipt, StoreError> {
        let mut state = self.state.write().await;
        let mut scratch = state.clone();
        let mut receipt = BatchReceipt::default();

        for write in batch.writes {
            scratch.apply(batch.owner_id, write, &mut receipt)?;
        }

        *state = scratch;
        Ok(receipt)
    }
}
