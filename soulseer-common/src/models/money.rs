//! Currency helpers. Every amount is USD held as a `Decimal` with two places.

use rust_decimal::{Decimal, RoundingStrategy};

/// Builds an amount from whole cents, e.g. `usd(399)` is $3.99.
pub fn usd(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Rounds to cents, half away from zero.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// True when `amount` carries no more than two decimal places.
pub fn is_whole_cents(amount: Decimal) -> bool {
    amount.normalize().scale() <= 2
}
