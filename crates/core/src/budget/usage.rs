//! Budget usage calculations.

use rust_decimal::{Decimal, RoundingStrategy};

use super::types::UsageFigures;

/// Calculates how much of `limit` has been used by `spent`.
///
/// - `remaining` never goes below zero, overspend shows up only in
///   `percent_used`.
/// - A zero limit reports 0% whatever was spent.
/// - Percentages are whole numbers, halves rounded away from zero.
#[must_use]
pub fn usage(limit: Decimal, spent: Decimal) -> UsageFigures {
    let remaining = (limit - spent).max(Decimal::ZERO);

    let percent_used = if limit.is_zero() {
        Decimal::ZERO
    } else {
        spent
            .checked_div(limit)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::MAX)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    };

    UsageFigures {
        spent,
        remaining,
        percent_used,
    }
}
