//! Trade plan emitted by the opportunity evaluator.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A candidate paired trade: buy `base_amount` on the buy venue at
/// `buy_limit_price`, market-sell the same amount into the sell venue's
/// bids.
///
/// Plans live for a single evaluation-to-execution cycle and are
/// recomputed at the pre-execution gate rather than mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradePlan {
    /// Base amount to buy and then sell.
    pub base_amount: Decimal,
    /// Best ask on the buy venue; the buy leg is a limit order at this
    /// price.
    pub buy_limit_price: Decimal,
    /// VWAP the sell venue's bid ladder quotes for `base_amount`.
    pub expected_sell_vwap: Decimal,
    /// Quote spent on the buy leg: `base_amount * buy_limit_price`.
    pub quote_cost: Decimal,
    /// Quote received selling `base_amount` into the sell venue's bids.
    pub quote_proceeds: Decimal,
    /// `quote_proceeds - quote_cost`.
    pub expected_profit: Decimal,
    /// Profit as basis points of cost.
    pub profit_bps: Decimal,
    /// `10000 * (expected_sell_vwap - buy_limit_price) / buy_limit_price`.
    pub slippage_bps: Decimal,
    /// `update_id`s of the (buy, sell) snapshots the plan was computed
    /// from, for audit and drift detection.
    pub source_book_update_ids: (u64, u64),
    pub computed_at: DateTime<Utc>,
}
