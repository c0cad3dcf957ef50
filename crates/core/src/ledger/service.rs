//! Ledger coordinator.
//!
//! The only writer of `Account::balance` outside of account creation. Each
//! operation runs in two phases:
//!
//! 1. Read: validate input, take the per-transaction lock, load what the
//!    write depends on. Bounded by the configured timeout; expiry aborts
//!    with nothing written.
//! 2. Write: hand one [`LedgerBatch`] to the store. Balance changes are
//!    atomic increments, so concurrent writers on one account never lose
//!    updates. Updates and deletes lead with a record write that carries
//!    the version read in phase 1; a store that finds a different version
//!    rejects the batch before any balance moves. The batch is never
//!    cancelled part way.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use finlyt_shared::config::LedgerConfig;
use finlyt_shared::types::{AccountId, OwnerId, TransactionId};
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use super::balance::{self, update_shifts};
use super::error::LedgerError;
use super::locks::KeyedLocks;
use super::types::{
    Account, AccountKind, BalanceAudit, CreateTransactionRequest, Transaction, TransactionPatch,
};
use super::validation::{validate_account_opening, validate_create, validate_patch};
use crate::store::{BatchReceipt, EntityStore, LedgerBatch, LedgerWrite, StoreError, TransactionFilter};

/// Keeps account balances consistent with the transactions referencing them.
pub struct LedgerCoordinator<S: ?Sized> {
    store: Arc<S>,
    locks: KeyedLocks<TransactionId>,
    timeout: Duration,
}

impl<S: EntityStore + ?Sized> LedgerCoordinator<S> {
    /// Creates a coordinator over `store`.
    #[must_use]
    pub fn new(store: Arc<S>, config: &LedgerConfig) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            timeout: Duration::from_millis(config.operation_timeout_ms),
        }
    }

    /// Opens an account whose balance starts at `opening_balance`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name or a negative opening
    /// balance.
    #[instrument(skip(self, name), fields(%owner_id))]
    pub async fn open_account(
        &self,
        owner_id: OwnerId,
        name: &str,
        kind: AccountKind,
        opening_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        validate_account_opening(name, opening_balance)?;

        let now = Utc::now();
        let account = self
            .store
            .insert_account(Account {
                id: AccountId::new(),
                owner_id,
                name: name.trim().to_string(),
                kind,
                opening_balance,
                balance: opening_balance,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(account_id = %account.id, balance = %account.balance, "Account opened");
        Ok(account)
    }

    /// Records a transaction and applies its effect to the account.
    ///
    /// # Errors
    ///
    /// - Validation error for a missing field or a non-positive amount.
    /// - `AccountNotFound` when the account does not belong to the owner.
    /// - `Timeout` when the lookup overran; nothing was written.
    /// - `Consistency` when the write failed after part of it applied.
    #[instrument(skip(self, request), fields(%owner_id))]
    pub async fn create_transaction(
        &self,
        owner_id: OwnerId,
        request: CreateTransactionRequest,
    ) -> Result<Transaction, LedgerError> {
        let new = validate_create(request)?;

        let account = self
            .read_phase(async {
                self.store
                    .find_account(owner_id, new.account_id)
                    .await?
                    .ok_or(LedgerError::AccountNotFound(new.account_id))
            })
            .await?;

        let transaction = new.into_transaction(owner_id, Utc::now());
        let batch = LedgerBatch::new(owner_id)
            .adjust(account.id, transaction.effect(), true)
            .then(LedgerWrite::InsertTransaction(transaction.clone()));

        self.commit("create_transaction", batch).await?;

        info!(
            transaction_id = %transaction.id,
            account_id = %account.id,
            kind = %transaction.kind,
            amount = %transaction.amount,
            "Transaction created"
        );
        Ok(transaction)
    }

    /// Applies a patch and moves the balance effect accordingly.
    ///
    /// Same account: the net difference is added in one step. Different
    /// accounts: the old effect is reverted on the old account and the new
    /// effect applied on the new one. An account that has disappeared since
    /// the transaction was recorded is skipped.
    ///
    /// # Errors
    ///
    /// - Validation error for a non-positive amount or a blank category.
    /// - `TransactionNotFound` when the owner has no such transaction.
    /// - `AccountNotFound` when the patch moves it to an unknown account.
    /// - `Conflict` when another writer changed the transaction first;
    ///   nothing was written.
    /// - `Timeout` when the lock or lookups overran; nothing was written.
    /// - `Consistency` when the write failed after part of it applied.
    #[instrument(skip(self, patch), fields(%owner_id, %transaction_id))]
    pub async fn update_transaction(
        &self,
        owner_id: OwnerId,
        transaction_id: TransactionId,
        patch: TransactionPatch,
    ) -> Result<Transaction, LedgerError> {
        validate_patch(&patch)?;

        let (_guard, existing) = self
            .read_phase(async {
                let guard = self.locks.lock(transaction_id).await;
                let existing = self
                    .store
                    .find_transaction(owner_id, transaction_id)
                    .await?
                    .ok_or(LedgerError::TransactionNotFound(transaction_id))?;

                if let Some(target) = patch.account.filter(|a| *a != existing.account_id) {
                    self.store
                        .find_account(owner_id, target)
                        .await?
                        .ok_or(LedgerError::AccountNotFound(target))?;
                }

                Ok((guard, existing))
            })
            .await?;

        let updated = patch.apply(&existing, Utc::now());
        let shifts = update_shifts(&existing, &updated);
        let batch = shifts.into_iter().fold(
            LedgerBatch::new(owner_id).then(LedgerWrite::ReplaceTransaction {
                expected: existing.clone(),
                updated: updated.clone(),
            }),
            |batch, shift| batch.adjust(shift.account_id, shift.delta, false),
        );

        let receipt = self.commit("update_transaction", batch).await?;
        warn_skipped(&receipt, transaction_id);

        info!(
            account_id = %updated.account_id,
            moved = existing.account_id != updated.account_id,
            amount = %updated.amount,
            "Transaction updated"
        );
        Ok(updated)
    }

    /// Reverts a transaction's effect and deletes it. Returns the removed
    /// record.
    ///
    /// # Errors
    ///
    /// - `TransactionNotFound` when the owner has no such transaction.
    /// - `Conflict` when another writer changed the transaction first;
    ///   nothing was written.
    /// - `Timeout` when the lock or lookup overran; nothing was written.
    /// - `Consistency` when the write failed after part of it applied.
    #[instrument(skip(self), fields(%owner_id, %transaction_id))]
    pub async fn delete_transaction(
        &self,
        owner_id: OwnerId,
        transaction_id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        let (_guard, existing) = self
            .read_phase(async {
                let guard = self.locks.lock(transaction_id).await;
                let existing = self
                    .store
                    .find_transaction(owner_id, transaction_id)
                    .await?
                    .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
                Ok((guard, existing))
            })
            .await?;

        let batch = LedgerBatch::new(owner_id)
            .then(LedgerWrite::RemoveTransaction {
                expected: existing.clone(),
            })
            .adjust(existing.account_id, balance::revert(&existing), false);

        let receipt = self.commit("delete_transaction", batch).await?;
        warn_skipped(&receipt, transaction_id);

        info!(account_id = %existing.account_id, "Transaction deleted");
        Ok(existing)
    }

    /// Recomputes an account's balance from its transactions and compares
    /// it with the stored value.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` when the owner has no such account.
    #[instrument(skip(self), fields(%owner_id, %account_id))]
    pub async fn audit_account(
        &self,
        owner_id: OwnerId,
        account_id: AccountId,
    ) -> Result<BalanceAudit, LedgerError> {
        let account = self
            .store
            .find_account(owner_id, account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let transactions = self
            .store
            .find_transactions(&TransactionFilter::owned_by(owner_id).account(account_id))
            .await?;

        let audit = balance::audit(&account, &transactions);
        if !audit.is_consistent() {
            error!(
                stored = %audit.stored,
                expected = %audit.expected,
                drift = %audit.drift,
                "Account balance drifted from its transactions"
            );
        }
        Ok(audit)
    }

    async fn read_phase<T>(
        &self,
        work: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.timeout, "Ledger read phase timed out");
                Err(LedgerError::Timeout(self.timeout))
            }
        }
    }

    async fn commit(
        &self,
        operation: &'static str,
        batch: LedgerBatch,
    ) -> Result<BatchReceipt, LedgerError> {
        match self.store.apply_batch(batch).await {
            Ok(receipt) => Ok(receipt),
            Err(StoreError::BatchAborted {
                step,
                reason,
                compensated,
            }) => {
                error!(
                    operation,
                    step,
                    %reason,
                    compensated,
                    "Ledger write aborted part way"
                );
                Err(LedgerError::Consistency {
                    operation,
                    reason,
                    compensated,
                })
            }
            Err(StoreError::AccountMissing(id)) => Err(LedgerError::AccountNotFound(id)),
            Err(StoreError::TransactionMissing(id)) => Err(LedgerError::TransactionNotFound(id)),
            Err(StoreError::Conflict(id)) => {
                warn!(operation, transaction_id = %id, "Transaction changed since it was read");
                Err(LedgerError::Conflict(id))
            }
            Err(other) => Err(other.into()),
        }
    }
}

fn warn_skipped(receipt: &BatchReceipt, transaction_id: TransactionId) {
    for account_id in &receipt.skipped {
        warn!(
            %transaction_id,
            %account_id,
            "Account no longer exists, balance adjustment skipped"
        );
    }
}
