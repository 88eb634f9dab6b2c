//! Recovery planner: resolves a desynchronized cycle back into cash.
//!
//! The invariant to restore is that every cycle ends holding only quote
//! currency on both venues. The planner only unwinds; holding an
//! unhedged base position is never a trading decision.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::leg::LegDriver;
use crate::core::domain::{CycleId, LegOutcome, LegState, OrderId, RecoveryAction, Symbol};
use crate::core::exchange::{ExchangeAdapter, OrderSide};
use crate::core::market::BookStore;
use crate::error::Error;

#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Status re-queries for an `Unknown` buy leg before giving up.
    pub query_retries: u32,
    /// Delay between recovery attempts.
    pub retry_delay: Duration,
    /// Market-sell attempts before the emergency order. Zero means
    /// escalate straight to the emergency sell.
    pub sell_retries: u32,
    /// Fraction below best bid for the emergency limit sell.
    pub emergency_discount: Decimal,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            query_retries: 3,
            retry_delay: Duration::from_secs(1),
            sell_retries: 2,
            emergency_discount: Decimal::new(1, 2), // 1%
        }
    }
}

pub struct RecoveryPlanner {
    config: RecoveryConfig,
}

impl RecoveryPlanner {
    pub fn new(config: RecoveryConfig) -> Self {
        Self { config }
    }

    /// Re-query an `Unknown` buy leg until the venue gives a usable
    /// answer. Open orders found this way are cancelled and settled on
    /// their realized fill.
    pub async fn resolve_buy(
        &self,
        adapter: &dyn ExchangeAdapter,
        symbol: &Symbol,
        order_id: &OrderId,
        cycle_id: CycleId,
        actions: &mut Vec<RecoveryAction>,
    ) -> LegOutcome {
        for attempt in 1..=self.config.query_retries {
            sleep(self.config.retry_delay).await;
            match adapter.query(symbol, order_id).await {
                Ok(status) if status.state.is_terminal() => {
                    info!(
                        cycle_id = %cycle_id,
                        order_id = %order_id,
                        state = %status.state,
                        filled = %status.filled_base,
                        "Unknown buy leg resolved"
                    );
                    actions.push(RecoveryAction::ResolvedBuyState {
                        resolved: status.state,
                    });
                    return LegOutcome {
                        state: status.state,
                        order_id: Some(order_id.clone()),
                        filled_base: status.filled_base,
                        filled_quote: status.filled_quote,
                        avg_price: status.avg_price,
                    };
                }
                Ok(status) => {
                    // Still open. Cancel, then settle on whatever filled.
                    warn!(
                        cycle_id = %cycle_id,
                        order_id = %order_id,
                        state = %status.state,
                        "Unknown buy leg still open, cancelling"
                    );
                    match adapter.cancel(symbol, order_id).await {
                        Ok(()) | Err(Error::AlreadyTerminal) => continue,
                        Err(e) => {
                            warn!(cycle_id = %cycle_id, error = %e, "Recovery cancel failed");
                            continue;
                        }
                    }
                }
                Err(Error::OrderNotFound) => {
                    // The order never reached the venue.
                    info!(cycle_id = %cycle_id, order_id = %order_id, "Buy order unknown to venue");
                    actions.push(RecoveryAction::ResolvedBuyState {
                        resolved: LegState::Rejected,
                    });
                    return LegOutcome::none(LegState::Rejected);
                }
                Err(e) => {
                    warn!(
                        cycle_id = %cycle_id,
                        order_id = %order_id,
                        attempt,
                        error = %e,
                        "Recovery query failed"
                    );
                }
            }
        }
        LegOutcome {
            state: LegState::Unknown,
            order_id: Some(order_id.clone()),
            filled_base: Decimal::ZERO,
            filled_quote: Decimal::ZERO,
            avg_price: None,
        }
    }

    /// Sell `base_amount` into the sell venue, by market order first and
    /// a discounted limit order as last resort. Fills accumulate across
    /// attempts; the outcome reports the total.
    ///
    /// Returns `Filled` when everything sold, otherwise `Unknown` with
    /// a `MarkedStuck` action appended; the caller persists the marker.
    pub async fn sell_all(
        &self,
        adapter: &dyn ExchangeAdapter,
        store: &Arc<BookStore>,
        leg_driver: &LegDriver,
        symbol: &Symbol,
        base_amount: Decimal,
        cycle_id: CycleId,
        actions: &mut Vec<RecoveryAction>,
    ) -> LegOutcome {
        let mut remaining = base_amount;
        let mut total = LegOutcome::none(LegState::Idle);

        for attempt in 1..=self.config.sell_retries {
            if attempt > 1 {
                sleep(self.config.retry_delay).await;
                actions.push(RecoveryAction::RetriedSell { attempt });
            }
            match adapter.place_market(symbol, OrderSide::Sell, remaining).await {
                Ok(order_id) => {
                    let outcome = leg_driver
                        .drive(adapter, symbol, &order_id, remaining)
                        .await;
                    accumulate(&mut total, &outcome);
                    remaining = base_amount - total.filled_base;
                    if remaining <= Decimal::ZERO {
                        total.state = LegState::Filled;
                        return total;
                    }
                    warn!(
                        cycle_id = %cycle_id,
                        attempt,
                        state = %outcome.state,
                        remaining = %remaining,
                        "Market sell left residual base"
                    );
                }
                Err(e) => {
                    warn!(cycle_id = %cycle_id, attempt, error = %e, "Market sell failed");
                }
            }
        }

        // Market path exhausted; cross the spread explicitly.
        if let Some(price) = self.emergency_price(store, adapter.name()) {
            actions.push(RecoveryAction::EmergencySell { price });
            warn!(
                cycle_id = %cycle_id,
                price = %price,
                remaining = %remaining,
                "Placing emergency discounted sell"
            );
            match adapter
                .place_limit(symbol, OrderSide::Sell, remaining, price)
                .await
            {
                Ok(order_id) => {
                    let outcome = leg_driver
                        .drive(adapter, symbol, &order_id, remaining)
                        .await;
                    accumulate(&mut total, &outcome);
                    remaining = base_amount - total.filled_base;
                    if remaining <= Decimal::ZERO {
                        total.state = LegState::Filled;
                        return total;
                    }
                }
                Err(e) => {
                    error!(cycle_id = %cycle_id, error = %e, "Emergency sell failed");
                }
            }
        } else {
            error!(cycle_id = %cycle_id, "No sell-side book for emergency pricing");
        }

        let reason = format!(
            "unable to unwind {remaining} {} on {}",
            symbol.base(),
            adapter.name()
        );
        error!(cycle_id = %cycle_id, reason = %reason, "Marking position stuck");
        actions.push(RecoveryAction::MarkedStuck { reason });
        total.state = LegState::Unknown;
        total
    }

    fn emergency_price(&self, store: &Arc<BookStore>, venue: &str) -> Option<Decimal> {
        let book = store.get(venue)?;
        let bid = book.best_bid()?.price;
        Some(bid * (Decimal::ONE - self.config.emergency_discount))
    }
}

fn accumulate(total: &mut LegOutcome, outcome: &LegOutcome) {
    total.state = outcome.state;
    if total.order_id.is_none() {
        total.order_id = outcome.order_id.clone();
    }
    total.filled_base += outcome.filled_base;
    total.filled_quote += outcome.filled_quote;
    total.avg_price = if total.filled_base > Decimal::ZERO {
        Some(total.filled_quote / total.filled_base)
    } else {
        None
    };
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::core::domain::{BookSnapshot, PriceLevel};
    use crate::core::execution::LegConfig;
    use crate::core::exchange::OrderStatus;
    use crate::testkit::{MockAdapter, MockFailure};

    fn planner() -> RecoveryPlanner {
        RecoveryPlanner::new(RecoveryConfig {
            query_retries: 3,
            retry_delay: Duration::from_millis(10),
            sell_retries: 2,
            emergency_discount: dec!(0.01),
        })
    }

    fn leg_driver() -> LegDriver {
        LegDriver::new(LegConfig {
            poll_interval: Duration::from_millis(10),
            timeout: Duration::from_millis(100),
            max_poll_failures: 3,
        })
    }

    fn sell_store() -> Arc<BookStore> {
        let store = Arc::new(BookStore::new(Symbol::new("BTC", "USDC"), &["bingx"]));
        store
            .publish_streamed(
                "bingx",
                BookSnapshot::new(
                    Symbol::new("BTC", "USDC"),
                    vec![PriceLevel::new(dec!(40000), dec!(2))],
                    vec![PriceLevel::new(dec!(40010), dec!(2))],
                    1,
                ),
            )
            .unwrap();
        store
    }

    fn filled(base: Decimal, quote: Decimal) -> OrderStatus {
        OrderStatus {
            state: LegState::Filled,
            filled_base: base,
            filled_quote: quote,
            avg_price: Some(quote / base),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_buy_finds_late_fill() {
        let adapter = MockAdapter::new("mexc")
            .with_query(Err(MockFailure::Transport))
            .with_query(Ok(filled(dec!(0.5), dec!(20000))));
        let mut actions = Vec::new();
        let outcome = planner()
            .resolve_buy(
                &adapter,
                &adapter.symbol(),
                &OrderId::new("o1"),
                CycleId::generate(),
                &mut actions,
            )
            .await;
        assert_eq!(outcome.state, LegState::Filled);
        assert_eq!(outcome.filled_base, dec!(0.5));
        assert_eq!(
            actions,
            vec![RecoveryAction::ResolvedBuyState {
                resolved: LegState::Filled
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_buy_zero_fill_ends_cycle() {
        let adapter = MockAdapter::new("mexc").with_query(Err(MockFailure::NotFound));
        let mut actions = Vec::new();
        let outcome = planner()
            .resolve_buy(
                &adapter,
                &adapter.symbol(),
                &OrderId::new("o1"),
                CycleId::generate(),
                &mut actions,
            )
            .await;
        assert_eq!(outcome.state, LegState::Rejected);
        assert!(!outcome.has_fill());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_buy_stays_unknown_after_retries() {
        let adapter = MockAdapter::new("mexc").with_query(Err(MockFailure::Transport));
        let mut actions = Vec::new();
        let outcome = planner()
            .resolve_buy(
                &adapter,
                &adapter.symbol(),
                &OrderId::new("o1"),
                CycleId::generate(),
                &mut actions,
            )
            .await;
        assert_eq!(outcome.state, LegState::Unknown);
        assert!(actions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sell_all_succeeds_first_attempt() {
        let adapter = MockAdapter::new("bingx")
            .with_place_market(Ok(OrderId::new("s1")))
            .with_query(Ok(filled(dec!(0.5), dec!(20000))));
        let mut actions = Vec::new();
        let outcome = planner()
            .sell_all(
                &adapter,
                &sell_store(),
                &leg_driver(),
                &adapter.symbol(),
                dec!(0.5),
                CycleId::generate(),
                &mut actions,
            )
            .await;
        assert_eq!(outcome.state, LegState::Filled);
        assert_eq!(outcome.filled_base, dec!(0.5));
        assert!(actions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sell_rejections_escalate_to_emergency() {
        // Two market rejections, then the discounted limit fills.
        let adapter = MockAdapter::new("bingx")
            .with_place_market(Err(MockFailure::Rejected("busy".into())))
            .with_place_market(Err(MockFailure::Rejected("busy".into())))
            .with_place_limit(Ok(OrderId::new("e1")))
            .with_query(Ok(filled(dec!(0.5), dec!(19800))));
        let mut actions = Vec::new();
        let outcome = planner()
            .sell_all(
                &adapter,
                &sell_store(),
                &leg_driver(),
                &adapter.symbol(),
                dec!(0.5),
                CycleId::generate(),
                &mut actions,
            )
            .await;
        assert_eq!(outcome.state, LegState::Filled);
        // best bid 40000 discounted 1%.
        assert!(actions.contains(&RecoveryAction::EmergencySell { price: dec!(39600.00) }));
        let placed = adapter.placed_limits();
        assert_eq!(placed[0].price, Some(dec!(39600.00)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sell_exhaustion_marks_stuck() {
        let adapter = MockAdapter::new("bingx")
            .with_place_market(Err(MockFailure::Rejected("busy".into())))
            .with_place_market(Err(MockFailure::Rejected("busy".into())))
            .with_place_limit(Err(MockFailure::Rejected("busy".into())));
        let mut actions = Vec::new();
        let outcome = planner()
            .sell_all(
                &adapter,
                &sell_store(),
                &leg_driver(),
                &adapter.symbol(),
                dec!(0.5),
                CycleId::generate(),
                &mut actions,
            )
            .await;
        assert_eq!(outcome.state, LegState::Unknown);
        assert!(matches!(
            actions.last(),
            Some(RecoveryAction::MarkedStuck { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_market_sell_retries_remainder() {
        let adapter = MockAdapter::new("bingx")
            .with_place_market(Ok(OrderId::new("s1")))
            .with_place_market(Ok(OrderId::new("s2")))
            .with_query(Ok(OrderStatus {
                state: LegState::Cancelled,
                filled_base: dec!(0.3),
                filled_quote: dec!(12000),
                avg_price: Some(dec!(40000)),
            }))
            .with_query(Ok(filled(dec!(0.2), dec!(8000))));
        let mut actions = Vec::new();
        let outcome = planner()
            .sell_all(
                &adapter,
                &sell_store(),
                &leg_driver(),
                &adapter.symbol(),
                dec!(0.5),
                CycleId::generate(),
                &mut actions,
            )
            .await;
        assert_eq!(outcome.state, LegState::Filled);
        assert_eq!(outcome.filled_base, dec!(0.5));
        assert_eq!(outcome.filled_quote, dec!(20000));
        assert_eq!(actions, vec![RecoveryAction::RetriedSell { attempt: 2 }]);
    }
}
