//! Live order-book store.
//!
//! Single-writer-multi-reader: each venue's stream task is the sole
//! writer for its slot; readers grab an `Arc` to whichever snapshot was
//! current when they looked. Publication swaps the pointer under a short
//! write lock, never holding it across await points.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::core::domain::{BookSnapshot, Symbol};
use crate::error::{Error, Result};

#[derive(Default)]
struct VenueSlot {
    /// Currently published view (streamed or accepted fallback).
    current: RwLock<Option<Arc<BookSnapshot>>>,
    /// Last snapshot that arrived over the stream, used as the reference
    /// for fallback deviation checks.
    last_streamed: RwLock<Option<Arc<BookSnapshot>>>,
    last_update: RwLock<Option<Instant>>,
    discarded: AtomicU64,
}

impl VenueSlot {
    fn publish(&self, snapshot: Arc<BookSnapshot>) {
        *self.current.write() = Some(snapshot);
        *self.last_update.write() = Some(Instant::now());
    }
}

/// Per-symbol book state for every venue the engine watches.
pub struct BookStore {
    symbol: Symbol,
    slots: HashMap<&'static str, VenueSlot>,
}

impl BookStore {
    pub fn new(symbol: Symbol, venues: &[&'static str]) -> Self {
        let slots = venues.iter().map(|v| (*v, VenueSlot::default())).collect();
        Self { symbol, slots }
    }

    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    fn slot(&self, venue: &str) -> Result<&VenueSlot> {
        self.slots
            .get(venue)
            .ok_or_else(|| Error::Config(format!("unknown venue {venue:?}")))
    }

    /// Publish a streamed snapshot after invariant checks.
    ///
    /// Crossed or malformed books and non-monotonic `update_id`s are
    /// discarded (counted and logged); the stream continues.
    pub fn publish_streamed(&self, venue: &'static str, snapshot: BookSnapshot) -> Result<()> {
        let slot = self.slot(venue)?;
        if let Err(e) = self.admit(slot, &snapshot) {
            slot.discarded.fetch_add(1, Ordering::Relaxed);
            warn!(venue, error = %e, "Discarding streamed snapshot");
            return Err(e);
        }
        let snapshot = Arc::new(snapshot);
        *slot.last_streamed.write() = Some(Arc::clone(&snapshot));
        slot.publish(snapshot);
        Ok(())
    }

    /// Apply a REST fallback snapshot, but only when its top of book
    /// agrees with the last streamed view within `max_deviation` quote
    /// units. A slow REST path must not corrupt the view mid-move.
    pub fn apply_fallback(
        &self,
        venue: &'static str,
        snapshot: BookSnapshot,
        max_deviation: Decimal,
    ) -> Result<()> {
        let slot = self.slot(venue)?;
        if let Err(e) = self.admit(slot, &snapshot) {
            slot.discarded.fetch_add(1, Ordering::Relaxed);
            warn!(venue, error = %e, "Discarding fallback snapshot");
            return Err(e);
        }
        if let Some(reference) = slot.last_streamed.read().clone() {
            if let Some(deviation) = top_of_book_deviation(&reference, &snapshot) {
                if deviation > max_deviation {
                    slot.discarded.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        venue,
                        deviation = %deviation,
                        limit = %max_deviation,
                        "Discarding fallback snapshot, top of book too far from stream"
                    );
                    return Err(Error::BookInvariant(format!(
                        "fallback deviates {deviation} from streamed top of book"
                    )));
                }
            }
        }
        debug!(venue, update_id = snapshot.update_id, "Applying fallback snapshot");
        slot.publish(Arc::new(snapshot));
        Ok(())
    }

    /// Current snapshot for a venue.
    #[must_use]
    pub fn get(&self, venue: &str) -> Option<Arc<BookSnapshot>> {
        self.slots.get(venue)?.current.read().clone()
    }

    /// Snapshots for two venues. Each is whatever is current at read
    /// time; no cross-venue ordering is promised.
    #[must_use]
    pub fn get_pair(
        &self,
        venue_a: &str,
        venue_b: &str,
    ) -> (Option<Arc<BookSnapshot>>, Option<Arc<BookSnapshot>>) {
        (self.get(venue_a), self.get(venue_b))
    }

    /// Time since the venue's view last changed.
    #[must_use]
    pub fn age(&self, venue: &str) -> Option<Duration> {
        self.slots
            .get(venue)?
            .last_update
            .read()
            .map(|t| t.elapsed())
    }

    /// Snapshots discarded for this venue (invariant or deviation
    /// failures).
    #[must_use]
    pub fn discarded(&self, venue: &str) -> u64 {
        self.slots
            .get(venue)
            .map(|s| s.discarded.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn admit(&self, slot: &VenueSlot, snapshot: &BookSnapshot) -> Result<()> {
        snapshot.validate()?;
        if let Some(current) = slot.current.read().as_ref() {
            if snapshot.update_id < current.update_id {
                return Err(Error::BookInvariant(format!(
                    "update_id regressed: {} < {}",
                    snapshot.update_id, current.update_id
                )));
            }
        }
        Ok(())
    }
}

/// Largest absolute top-of-book price difference between two snapshots,
/// `None` when either book has no comparable side.
fn top_of_book_deviation(a: &BookSnapshot, b: &BookSnapshot) -> Option<Decimal> {
    let bid = match (a.best_bid(), b.best_bid()) {
        (Some(x), Some(y)) => Some((x.price - y.price).abs()),
        _ => None,
    };
    let ask = match (a.best_ask(), b.best_ask()) {
        (Some(x), Some(y)) => Some((x.price - y.price).abs()),
        _ => None,
    };
    match (bid, ask) {
        (Some(b), Some(a)) => Some(b.max(a)),
        (Some(b), None) => Some(b),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::core::domain::PriceLevel;

    fn snapshot(bid: Decimal, ask: Decimal, update_id: u64) -> BookSnapshot {
        BookSnapshot::new(
            Symbol::new("BTC", "USDC"),
            vec![PriceLevel::new(bid, dec!(1))],
            vec![PriceLevel::new(ask, dec!(1))],
            update_id,
        )
    }

    fn store() -> BookStore {
        BookStore::new(Symbol::new("BTC", "USDC"), &["mexc", "bingx"])
    }

    #[test]
    fn test_publish_and_read_back() {
        let store = store();
        store
            .publish_streamed("mexc", snapshot(dec!(40000), dec!(40010), 1))
            .unwrap();
        let snap = store.get("mexc").unwrap();
        assert_eq!(snap.update_id, 1);
        assert!(store.get("bingx").is_none());
    }

    #[test]
    fn test_update_id_regression_discarded() {
        let store = store();
        store
            .publish_streamed("mexc", snapshot(dec!(40000), dec!(40010), 5))
            .unwrap();
        let err = store
            .publish_streamed("mexc", snapshot(dec!(40000), dec!(40010), 4))
            .unwrap_err();
        assert!(matches!(err, Error::BookInvariant(_)));
        assert_eq!(store.get("mexc").unwrap().update_id, 5);
        assert_eq!(store.discarded("mexc"), 1);
    }

    #[test]
    fn test_equal_update_id_accepted() {
        let store = store();
        store
            .publish_streamed("mexc", snapshot(dec!(40000), dec!(40010), 5))
            .unwrap();
        store
            .publish_streamed("mexc", snapshot(dec!(40001), dec!(40011), 5))
            .unwrap();
        assert_eq!(store.get("mexc").unwrap().best_bid().unwrap().price, dec!(40001));
    }

    #[test]
    fn test_crossed_book_discarded_and_counted() {
        let store = store();
        let err = store
            .publish_streamed("mexc", snapshot(dec!(40020), dec!(40010), 1))
            .unwrap_err();
        assert!(matches!(err, Error::BookInvariant(_)));
        assert!(store.get("mexc").is_none());
        assert_eq!(store.discarded("mexc"), 1);
    }

    #[test]
    fn test_fallback_within_deviation_applied() {
        let store = store();
        store
            .publish_streamed("mexc", snapshot(dec!(40000), dec!(40010), 1))
            .unwrap();
        store
            .apply_fallback("mexc", snapshot(dec!(40003), dec!(40012), 2), dec!(5))
            .unwrap();
        assert_eq!(store.get("mexc").unwrap().update_id, 2);
    }

    #[test]
    fn test_fallback_beyond_deviation_discarded() {
        let store = store();
        store
            .publish_streamed("mexc", snapshot(dec!(40000), dec!(40010), 1))
            .unwrap();
        let err = store
            .apply_fallback("mexc", snapshot(dec!(40100), dec!(40110), 2), dec!(5))
            .unwrap_err();
        assert!(matches!(err, Error::BookInvariant(_)));
        // Streamed view stays current.
        assert_eq!(store.get("mexc").unwrap().update_id, 1);
    }

    #[test]
    fn test_fallback_without_streamed_reference_applied() {
        let store = store();
        store
            .apply_fallback("mexc", snapshot(dec!(40000), dec!(40010), 1), dec!(5))
            .unwrap();
        assert_eq!(store.get("mexc").unwrap().update_id, 1);
    }

    #[test]
    fn test_fallback_does_not_move_streamed_reference() {
        let store = store();
        store
            .publish_streamed("mexc", snapshot(dec!(40000), dec!(40010), 1))
            .unwrap();
        store
            .apply_fallback("mexc", snapshot(dec!(40004), dec!(40014), 2), dec!(5))
            .unwrap();
        // Deviation is still measured against the streamed book, so a
        // second fallback drifting past the limit is rejected even though
        // it is close to the first fallback.
        let err = store
            .apply_fallback("mexc", snapshot(dec!(40008), dec!(40018), 3), dec!(5))
            .unwrap_err();
        assert!(matches!(err, Error::BookInvariant(_)));
    }
}
