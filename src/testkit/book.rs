//! Snapshot builders for tests.

use rust_decimal::Decimal;

use crate::core::domain::{BookSnapshot, PriceLevel, Symbol};

pub fn level(price: Decimal, size: Decimal) -> PriceLevel {
    PriceLevel::new(price, size)
}

/// A BTC-USDC snapshot from `(price, size)` slices, bids best-first.
pub fn snapshot(
    bids: &[(Decimal, Decimal)],
    asks: &[(Decimal, Decimal)],
    update_id: u64,
) -> BookSnapshot {
    BookSnapshot::new(
        Symbol::new("BTC", "USDC"),
        bids.iter().map(|&(p, s)| level(p, s)).collect(),
        asks.iter().map(|&(p, s)| level(p, s)).collect(),
        update_id,
    )
}
