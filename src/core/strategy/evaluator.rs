//! Opportunity evaluation over a pair of current snapshots.
//!
//! Pure: two books, a balance, and thresholds in; a [`TradePlan`] or a
//! typed rejection out. The buy leg is a limit at the buy venue's best
//! ask, so cost is `x * ask` rather than a walk of the ask ladder; the
//! sell side is a market order, so proceeds come from the bid depth
//! curve.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::core::domain::{BookSnapshot, DepthCurve, TradePlan};

const BPS_SCALE: Decimal = Decimal::from_parts(10000, 0, 0, false, 0);

/// Venue fee schedule. Accepted for forward compatibility; evaluation
/// currently assumes zero fees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeSchedule {
    pub maker_bps: Decimal,
    pub taker_bps: Decimal,
}

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Absolute minimum expected profit in quote units.
    pub min_profit_quote: Decimal,
    /// Minimum expected profit as percent of cost.
    pub min_profit_pct: Decimal,
    /// Base-size cap per cycle.
    pub max_base_per_trade: Decimal,
    /// Reject plans whose captured spread exceeds this; depth-starved
    /// books can quote absurd VWAPs.
    pub max_slippage_bps: Decimal,
    /// Buy venue's base-size step; plan sizes are multiples of it.
    pub base_increment: Decimal,
    pub fees: FeeSchedule,
}

/// Why no plan was emitted this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Buy book has no ask.
    NoBuyAsk,
    /// Sell book has no bid depth.
    NoSellDepth,
    /// Candidate size rounded down to zero.
    ZeroSize,
    /// Expected profit below the absolute threshold.
    BelowMinProfit { profit: Decimal },
    /// Expected profit below the percentage threshold.
    BelowMinProfitBps { bps: Decimal },
    /// Sell VWAP under the buy price.
    NegativeSlippage { bps: Decimal },
    /// Captured spread implausibly wide.
    SlippageExceeded { bps: Decimal },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NoBuyAsk => write!(f, "no ask on buy venue"),
            RejectReason::NoSellDepth => write!(f, "no bid depth on sell venue"),
            RejectReason::ZeroSize => write!(f, "size rounds to zero"),
            RejectReason::BelowMinProfit { profit } => {
                write!(f, "profit {profit} below absolute minimum")
            }
            RejectReason::BelowMinProfitBps { bps } => {
                write!(f, "profit {bps} bps below percentage minimum")
            }
            RejectReason::NegativeSlippage { bps } => {
                write!(f, "sell vwap below buy price ({bps} bps)")
            }
            RejectReason::SlippageExceeded { bps } => {
                write!(f, "spread {bps} bps exceeds slippage cap")
            }
        }
    }
}

/// Evaluate one tick: buy on `buy_book`'s best ask, sell into
/// `sell_book`'s bids.
pub fn evaluate(
    buy_book: &BookSnapshot,
    sell_book: &BookSnapshot,
    quote_balance: Decimal,
    config: &EvaluatorConfig,
) -> Result<TradePlan, RejectReason> {
    let ask = buy_book.best_ask().ok_or(RejectReason::NoBuyAsk)?;
    let ask_price = ask.price;

    let bid_curve = DepthCurve::from_levels(&sell_book.bids);
    let available = bid_curve.available_base();
    if available.is_zero() {
        return Err(RejectReason::NoSellDepth);
    }

    let mut base = (quote_balance / ask_price)
        .min(config.max_base_per_trade)
        .min(available);

    // Bid levels at or below the ask add nothing; on a flat profit region
    // take the smallest size.
    let profitable_depth: Decimal = sell_book
        .bids
        .iter()
        .take_while(|level| level.price > ask_price)
        .map(|level| level.size)
        .sum();
    base = base.min(profitable_depth);

    base = round_down_to_increment(base, config.base_increment);
    if base <= Decimal::ZERO {
        return Err(RejectReason::ZeroSize);
    }

    let quote_cost = base * ask_price;
    let fill = bid_curve.quote_for_base(base);
    let quote_proceeds = fill.quote;
    let sell_vwap = fill.vwap().ok_or(RejectReason::NoSellDepth)?;

    let expected_profit = quote_proceeds - quote_cost;
    let profit_bps = BPS_SCALE * expected_profit / quote_cost;
    if expected_profit < config.min_profit_quote {
        return Err(RejectReason::BelowMinProfit {
            profit: expected_profit,
        });
    }
    if profit_bps < config.min_profit_pct * Decimal::from(100) {
        return Err(RejectReason::BelowMinProfitBps { bps: profit_bps });
    }

    let slippage_bps = BPS_SCALE * (sell_vwap - ask_price) / ask_price;
    if slippage_bps < Decimal::ZERO {
        return Err(RejectReason::NegativeSlippage { bps: slippage_bps });
    }
    if slippage_bps > config.max_slippage_bps {
        return Err(RejectReason::SlippageExceeded { bps: slippage_bps });
    }

    Ok(TradePlan {
        base_amount: base,
        buy_limit_price: ask_price,
        expected_sell_vwap: sell_vwap,
        quote_cost,
        quote_proceeds,
        expected_profit,
        profit_bps,
        slippage_bps,
        source_book_update_ids: (buy_book.update_id, sell_book.update_id),
        computed_at: Utc::now(),
    })
}

fn round_down_to_increment(value: Decimal, increment: Decimal) -> Decimal {
    if increment <= Decimal::ZERO {
        return value;
    }
    (value / increment).floor() * increment
}
