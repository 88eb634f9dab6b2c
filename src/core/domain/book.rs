//! Order-book snapshot types and invariant checks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Symbol;
use crate::error::{Error, Result};

/// One resting level on a book side: price in quote units per base unit,
/// size in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// A point-in-time view of one venue's book for one symbol.
///
/// `bids` are sorted strictly descending by price, `asks` strictly
/// ascending. `update_id` is the venue-supplied monotonic sequence tag;
/// `captured_at` is local receive time.
#[derive(Debug, Clone)]
pub struct BookSnapshot {
    pub symbol: Symbol,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub update_id: u64,
    pub captured_at: DateTime<Utc>,
}

impl BookSnapshot {
    pub fn new(
        symbol: Symbol,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        update_id: u64,
    ) -> Self {
        Self {
            symbol,
            bids,
            asks,
            update_id,
            captured_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Check the structural invariants a venue snapshot must satisfy
    /// before it may be published to readers.
    ///
    /// Strict ordering per side (which also rules out duplicate prices),
    /// no zero or negative sizes, no negative prices, and an uncrossed
    /// top of book.
    pub fn validate(&self) -> Result<()> {
        for level in self.bids.iter().chain(self.asks.iter()) {
            if level.size <= Decimal::ZERO {
                return Err(Error::BookInvariant(format!(
                    "non-positive size {} at price {}",
                    level.size, level.price
                )));
            }
            if level.price <= Decimal::ZERO {
                return Err(Error::BookInvariant(format!(
                    "non-positive price {}",
                    level.price
                )));
            }
        }
        for pair in self.bids.windows(2) {
            if pair[1].price >= pair[0].price {
                return Err(Error::BookInvariant("bids not strictly descending".into()));
            }
        }
        for pair in self.asks.windows(2) {
            if pair[1].price <= pair[0].price {
                return Err(Error::BookInvariant("asks not strictly ascending".into()));
            }
        }
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid.price >= ask.price {
                return Err(Error::BookInvariant(format!(
                    "crossed book: best bid {} >= best ask {}",
                    bid.price, ask.price
                )));
            }
        }
        Ok(())
    }

    /// Age of this snapshot relative to `now`.
    #[must_use]
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.captured_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn symbol() -> Symbol {
        Symbol::new("BTC", "USDC")
    }

    fn level(price: Decimal, size: Decimal) -> PriceLevel {
        PriceLevel::new(price, size)
    }

    #[test]
    fn test_valid_snapshot_passes() {
        let snap = BookSnapshot::new(
            symbol(),
            vec![level(dec!(40100), dec!(0.5)), level(dec!(40050), dec!(0.5))],
            vec![level(dec!(40110), dec!(1)), level(dec!(40120), dec!(2))],
            7,
        );
        assert!(snap.validate().is_ok());
    }

    #[test]
    fn test_crossed_book_rejected() {
        let snap = BookSnapshot::new(
            symbol(),
            vec![level(dec!(40200), dec!(0.5))],
            vec![level(dec!(40100), dec!(1))],
            1,
        );
        assert!(matches!(snap.validate(), Err(Error::BookInvariant(_))));
    }

    #[test]
    fn test_zero_size_level_rejected() {
        let snap = BookSnapshot::new(
            symbol(),
            vec![level(dec!(40000), dec!(0))],
            vec![],
            1,
        );
        assert!(snap.validate().is_err());
    }

    #[test]
    fn test_duplicate_bid_price_rejected() {
        let snap = BookSnapshot::new(
            symbol(),
            vec![level(dec!(40000), dec!(1)), level(dec!(40000), dec!(2))],
            vec![],
            1,
        );
        assert!(snap.validate().is_err());
    }

    #[test]
    fn test_unsorted_asks_rejected() {
        let snap = BookSnapshot::new(
            symbol(),
            vec![],
            vec![level(dec!(40100), dec!(1)), level(dec!(40050), dec!(1))],
            1,
        );
        assert!(snap.validate().is_err());
    }

    #[test]
    fn test_one_sided_book_is_valid() {
        let snap = BookSnapshot::new(symbol(), vec![level(dec!(40000), dec!(1))], vec![], 1);
        assert!(snap.validate().is_ok());
    }
}
