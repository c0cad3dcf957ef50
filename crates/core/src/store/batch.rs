//! Compensating batch application for stores without native transactions.
//!
//! Writes are applied in order. Each applied write records its inverse; on
//! the first failure the inverses run in reverse order. A failure before
//! anything was applied is returned as-is, since the store is untouched.
//!
//! Record writes compare against their expected version, so a batch built
//! from a stale read fails on its first write when that write is the record
//! swap.

use finlyt_shared::types::{AccountId, OwnerId};
use rust_decimal::Decimal;

use super::error::StoreError;
use super::types::{BatchReceipt, LedgerBatch, LedgerWrite};
use super::EntityStore;
use crate::ledger::types::Transaction;

/// Inverse of one applied write.
#[derive(Debug)]
enum Undo {
    Adjust { account_id: AccountId, delta: Decimal },
    Remove(Transaction),
    Restore { current: Transaction, previous: Transaction },
    Reinsert(Transaction),
}

/// Applies a batch write by write, compensating on failure.
///
/// # Errors
///
/// Returns the first write's error when nothing was applied, otherwise
/// `StoreError::BatchAborted` with `compensated` telling whether every
/// applied write was undone.
pub async fn apply_with_compensation<S: EntityStore + ?Sized>(
    store: &S,
    batch: LedgerBatch,
) -> Result<BatchReceipt, StoreError> {
    let owner_id = batch.owner_id;
    let mut receipt = BatchReceipt::default();
    let mut undo_log: Vec<Undo> = Vec::with_capacity(batch.writes.len());

    for (step, write) in batch.writes.into_iter().enumerate() {
        match apply_one(store, owner_id, write, &mut receipt).await {
            Ok(Some(undo)) => undo_log.push(undo),
            Ok(None) => {}
            Err(err) if undo_log.is_empty() => return Err(err),
            Err(err) => {
                tracing::warn!(
                    %owner_id,
                    step,
                    error = %err,
                    applied = undo_log.len(),
                    "batch write failed, compensating"
                );
                let compensated = compensate(store, owner_id, undo_log).await;
                return Err(StoreError::BatchAborted {
                    step,
                    reason: err.to_string(),
                    compensated,
                });
            }
        }
    }

    Ok(receipt)
}

async fn apply_one<S: EntityStore + ?Sized>(
    store: &S,
    owner_id: OwnerId,
    write: LedgerWrite,
    receipt: &mut BatchReceipt,
) -> Result<Option<Undo>, StoreError> {
    match write {
        LedgerWrite::AdjustBalance {
            account_id,
            delta,
            required,
        } => match store.adjust_balance(owner_id, account_id, delta).await? {
            Some(account) => {
                receipt.adjusted.push(account);
                Ok(Some(Undo::Adjust {
                    account_id,
                    delta: -delta,
                }))
            }
            None if required => Err(StoreError::AccountMissing(account_id)),
            None => {
                receipt.skipped.push(account_id);
                Ok(None)
            }
        },
        LedgerWrite::InsertTransaction(tx) => {
            let inserted = store.insert_transaction(tx).await?;
            Ok(Some(Undo::Remove(inserted)))
        }
        LedgerWrite::ReplaceTransaction { expected, updated } => {
            let previous = store
                .replace_transaction(&expected, updated.clone())
                .await?
                .ok_or(StoreError::TransactionMissing(expected.id))?;
            Ok(Some(Undo::Restore {
                current: updated,
                previous,
            }))
        }
        LedgerWrite::RemoveTransaction { expected } => {
            let removed = store
                .remove_transaction(&expected)
                .await?
                .ok_or(StoreError::TransactionMissing(expected.id))?;
            Ok(Some(Undo::Reinsert(removed)))
        }
    }
}

/// Runs the undo log backwards. Returns true if every inverse succeeded.
async fn compensate<S: EntityStore + ?Sized>(
    store: &S,
    owner_id: OwnerId,
    undo_log: Vec<Undo>,
) -> bool {
    let mut clean = true;

    for undo in undo_log.into_iter().rev() {
        let outcome = match &undo {
            Undo::Adjust { account_id, delta } => store
                .adjust_balance(owner_id, *account_id, *delta)
                .await
                .map(|a| a.is_some()),
            Undo::Remove(inserted) => store
                .remove_transaction(inserted)
                .await
                .map(|t| t.is_some()),
            Undo::Restore { current, previous } => store
                .replace_transaction(current, previous.clone())
                .await
                .map(|t| t.is_some()),
            Undo::Reinsert(removed) => store.insert_transaction(removed.clone()).await.map(|_| true),
        };

        match outcome {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(%owner_id, ?undo, "compensation target vanished");
                clean = false;
            }
            Err(err) => {
                tracing::error!(%owner_id, ?undo, error = %err, "compensation failed");
                clean = false;
            }
        }
    }

    clean
}
