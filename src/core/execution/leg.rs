//! One order leg: submit happens upstream, this module drives the order
//! from `Submitted` to a terminal state.
//!
//! The driver polls order status at a fixed cadence, cancels at the
//! deadline, and reports realized fills. Transport errors are retried
//! once per operation; a run of failed polls ends in `Unknown`, the sole
//! entry into recovery.

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::core::domain::{LegOutcome, LegState, OrderId, Symbol};
use crate::core::exchange::{ExchangeAdapter, OrderStatus};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct LegConfig {
    /// Status poll cadence after submit.
    pub poll_interval: Duration,
    /// Deadline after which a resting order is cancelled.
    pub timeout: Duration,
    /// Consecutive failed polls (each already retried once) before the
    /// leg is declared `Unknown`.
    pub max_poll_failures: u32,
}

impl Default for LegConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
            max_poll_failures: 3,
        }
    }
}

pub struct LegDriver {
    config: LegConfig,
}

impl LegDriver {
    pub fn new(config: LegConfig) -> Self {
        Self { config }
    }

    /// Drive a submitted order to a terminal outcome.
    ///
    /// `requested_base` is the size the order was placed with; a query
    /// reporting that much filled is terminal even if the venue is slow
    /// to flip its status flag.
    pub async fn drive(
        &self,
        adapter: &dyn ExchangeAdapter,
        symbol: &Symbol,
        order_id: &OrderId,
        requested_base: Decimal,
    ) -> LegOutcome {
        let deadline = Instant::now() + self.config.timeout;
        let mut state = LegState::Submitted;
        let mut last_filled = Decimal::ZERO;
        let mut failures = 0u32;

        loop {
            sleep(self.config.poll_interval).await;

            let status = match self.query_with_retry(adapter, symbol, order_id).await {
                Ok(status) => {
                    failures = 0;
                    status
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        venue = adapter.name(),
                        order_id = %order_id,
                        error = %e,
                        failures,
                        "Order status poll failed"
                    );
                    if failures >= self.config.max_poll_failures {
                        return LegOutcome {
                            state: LegState::Unknown,
                            order_id: Some(order_id.clone()),
                            filled_base: last_filled,
                            filled_quote: Decimal::ZERO,
                            avg_price: None,
                        };
                    }
                    continue;
                }
            };

            if status.filled_base < last_filled {
                // Venues must never report shrinking fills; keep the max.
                warn!(
                    venue = adapter.name(),
                    order_id = %order_id,
                    reported = %status.filled_base,
                    known = %last_filled,
                    "Filled size regressed in status report"
                );
            }
            last_filled = last_filled.max(status.filled_base);

            let next = effective_state(&status, requested_base);
            if next != state {
                debug!(
                    venue = adapter.name(),
                    order_id = %order_id,
                    from = %state,
                    to = %next,
                    filled = %status.filled_base,
                    "Leg transition"
                );
                state = next;
            }

            if state.is_terminal() {
                return outcome(state, order_id, &status);
            }

            if Instant::now() >= deadline {
                debug!(
                    venue = adapter.name(),
                    order_id = %order_id,
                    "Leg deadline reached, cancelling"
                );
                return self.cancel_and_settle(adapter, symbol, order_id).await;
            }
        }
    }

    /// Cancel a resting order and settle on whatever filled before the
    /// cancel took effect.
    async fn cancel_and_settle(
        &self,
        adapter: &dyn ExchangeAdapter,
        symbol: &Symbol,
        order_id: &OrderId,
    ) -> LegOutcome {
        match self.cancel_with_retry(adapter, symbol, order_id).await {
            // Either the cancel landed or the order finished first; the
            // final query tells us which.
            Ok(()) | Err(Error::AlreadyTerminal) => {}
            Err(e) => {
                warn!(
                    venue = adapter.name(),
                    order_id = %order_id,
                    error = %e,
                    "Cancel failed"
                );
                return LegOutcome {
                    state: LegState::Unknown,
                    order_id: Some(order_id.clone()),
                    filled_base: Decimal::ZERO,
                    filled_quote: Decimal::ZERO,
                    avg_price: None,
                };
            }
        }

        match self.query_with_retry(adapter, symbol, order_id).await {
            Ok(status) => {
                let state = if status.state.is_terminal() {
                    status.state
                } else {
                    // Cancel acked but the venue still shows the order
                    // open; report what we know as cancelled.
                    LegState::Cancelled
                };
                outcome(state, order_id, &status)
            }
            Err(e) => {
                warn!(
                    venue = adapter.name(),
                    order_id = %order_id,
                    error = %e,
                    "Post-cancel query failed"
                );
                LegOutcome {
                    state: LegState::Unknown,
                    order_id: Some(order_id.clone()),
                    filled_base: Decimal::ZERO,
                    filled_quote: Decimal::ZERO,
                    avg_price: None,
                }
            }
        }
    }

    async fn query_with_retry(
        &self,
        adapter: &dyn ExchangeAdapter,
        symbol: &Symbol,
        order_id: &OrderId,
    ) -> Result<OrderStatus> {
        match adapter.query(symbol, order_id).await {
            Err(e) if e.is_transport() => adapter.query(symbol, order_id).await,
            other => other,
        }
    }

    async fn cancel_with_retry(
        &self,
        adapter: &dyn ExchangeAdapter,
        symbol: &Symbol,
        order_id: &OrderId,
    ) -> Result<()> {
        match adapter.cancel(symbol, order_id).await {
            Err(e) if e.is_transport() => adapter.cancel(symbol, order_id).await,
            other => other,
        }
    }
}

/// Fold the venue's status into the leg's view. A full fill is terminal
/// regardless of the reported flag.
fn effective_state(status: &OrderStatus, requested_base: Decimal) -> LegState {
    if status.filled_base >= requested_base && requested_base > Decimal::ZERO {
        return LegState::Filled;
    }
    match status.state {
        LegState::Submitted if status.filled_base > Decimal::ZERO => LegState::PartiallyFilled,
        other => other,
    }
}

fn outcome(state: LegState, order_id: &OrderId, status: &OrderStatus) -> LegOutcome {
    LegOutcome {
        state,
        order_id: Some(order_id.clone()),
        filled_base: status.filled_base,
        filled_quote: status.filled_quote,
        avg_price: status.avg_price,
    }
}
