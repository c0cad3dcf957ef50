//! Input validation for ledger requests.
//!
//! Runs before any store call, so a rejected request never has side effects.

use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{CreateTransactionRequest, NewTransaction, TransactionPatch};

/// Decimal places stored for every money column.
pub const MONEY_SCALE: u32 = 4;

/// Returns true if `value` has no significant digits past [`MONEY_SCALE`].
/// Trailing zeros do not count.
#[must_use]
pub fn fits_money_scale(value: Decimal) -> bool {
    value.normalize().scale() <= MONEY_SCALE
}

/// Validates a create request and returns its strongly typed form.
///
/// # Errors
///
/// Returns `MissingField` for an absent type, amount, category, account or
/// date, `BlankField` for an empty category, `NonPositiveAmount` when the
/// amount is zero or negative and `TooPrecise` past four decimal places.
pub fn validate_create(request: CreateTransactionRequest) -> Result<NewTransaction, LedgerError> {
    let kind = request.kind.ok_or(LedgerError::MissingField("type"))?;
    let amount = request.amount.ok_or(LedgerError::MissingField("amount"))?;
    let category = request
        .category
        .ok_or(LedgerError::MissingField("category"))?;
    let account_id = request.account.ok_or(LedgerError::MissingField("account"))?;
    let date = request.date.ok_or(LedgerError::MissingField("date"))?;

    validate_amount(amount)?;
    let category = validate_category(&category)?;

    Ok(NewTransaction {
        kind,
        amount,
        category,
        account_id,
        date,
        description: request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
    })
}

/// Validates the fields a patch sets.
///
/// # Errors
///
/// Returns `NonPositiveAmount`, `TooPrecise` or `BlankField` for invalid
/// replacements.
pub fn validate_patch(patch: &TransactionPatch) -> Result<(), LedgerError> {
    if let Some(amount) = patch.amount {
        validate_amount(amount)?;
    }
    if let Some(category) = &patch.category {
        validate_category(category)?;
    }
    Ok(())
}

/// Validates the name and opening balance of a new account.
///
/// # Errors
///
/// Returns `BlankField` for an empty name, `NegativeOpeningBalance` when
/// the opening balance is below zero and `TooPrecise` past four decimal
/// places.
pub fn validate_account_opening(name: &str, opening_balance: Decimal) -> Result<(), LedgerError> {
    if name.trim().is_empty() {
        return Err(LedgerError::BlankField("name"));
    }
    if opening_balance < Decimal::ZERO {
        return Err(LedgerError::NegativeOpeningBalance);
    }
    if !fits_money_scale(opening_balance) {
        return Err(LedgerError::TooPrecise("opening_balance"));
    }
    Ok(())
}

fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount);
    }
    if !fits_money_scale(amount) {
        return Err(LedgerError::TooPrecise("amount"));
    }
    Ok(())
}

fn validate_category(category: &str) -> Result<String, LedgerError> {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::BlankField("category"));
    }
    Ok(trimmed.to_string())
}
