use rust_decimal::{Decimal, RoundingStrategy};

/// Number of fractional digits carried by every monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// Round to two decimals, half-up. Idempotent.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Accepted rounding drift when `count` independently rounded amounts are summed.
pub fn money_tolerance(count: usize) -> Decimal {
    Decimal::new(1, MONEY_SCALE) * Decimal::from(count.max(1) as u64)
}
