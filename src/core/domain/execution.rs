//! Order, leg, and cycle execution types.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Venue-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier threading one evaluation-to-execution cycle through logs,
/// records, and recovery actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleId(Uuid);

impl CycleId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of one order leg.
///
/// Transitions are monotonic except `PartiallyFilled -> PartiallyFilled`
/// (filled size only ever grows) and `* -> Unknown` on repeated query
/// failure. `Unknown` is the sole entry point into recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegState {
    Idle,
    Submitted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Unknown,
}

impl LegState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LegState::Filled | LegState::Cancelled | LegState::Rejected
        )
    }
}

impl fmt::Display for LegState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LegState::Idle => "idle",
            LegState::Submitted => "submitted",
            LegState::PartiallyFilled => "partially_filled",
            LegState::Filled => "filled",
            LegState::Cancelled => "cancelled",
            LegState::Rejected => "rejected",
            LegState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Terminal result of driving one leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegOutcome {
    pub state: LegState,
    pub order_id: Option<OrderId>,
    /// Base filled, realized. Zero when nothing executed.
    pub filled_base: Decimal,
    /// Quote exchanged for `filled_base`.
    pub filled_quote: Decimal,
    /// Average fill price, absent on zero fill.
    pub avg_price: Option<Decimal>,
}

impl LegOutcome {
    /// An outcome with no order ever reaching the venue.
    pub fn none(state: LegState) -> Self {
        Self {
            state,
            order_id: None,
            filled_base: Decimal::ZERO,
            filled_quote: Decimal::ZERO,
            avg_price: None,
        }
    }

    #[must_use]
    pub fn has_fill(&self) -> bool {
        self.filled_base > Decimal::ZERO
    }
}

/// Action the recovery planner took while unwinding a desynchronized
/// cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Re-queried an `Unknown` buy leg and resolved its true state.
    ResolvedBuyState { resolved: LegState },
    /// Retried the market sell after a failure.
    RetriedSell { attempt: u32 },
    /// Placed a discounted limit sell after repeated rejections.
    EmergencySell { price: Decimal },
    /// Gave up; operator intervention required.
    MarkedStuck { reason: String },
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Both legs done, inventory back to quote-only.
    Completed,
    /// Buy leg ended with zero fill; nothing to unwind.
    NoFill,
    /// Plan abandoned at the pre-execution gate.
    Abandoned,
    /// Recovery could not unwind the position.
    Stuck,
}

/// Append-only record of one terminal cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub cycle_id: CycleId,
    pub symbol: String,
    pub outcome: CycleOutcome,
    pub buy: LegOutcome,
    pub sell: LegOutcome,
    /// Realized quote delta: sell proceeds minus buy cost.
    pub realized_profit: Decimal,
    pub recovery: Vec<RecoveryAction>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Base bought but not sold back. Zero for every non-stuck cycle.
    #[must_use]
    pub fn residual_base(&self) -> Decimal {
        self.buy.filled_base - self.sell.filled_base
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(LegState::Filled.is_terminal());
        assert!(LegState::Cancelled.is_terminal());
        assert!(LegState::Rejected.is_terminal());
        assert!(!LegState::Submitted.is_terminal());
        assert!(!LegState::PartiallyFilled.is_terminal());
        assert!(!LegState::Unknown.is_terminal());
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = ExecutionRecord {
            cycle_id: CycleId::generate(),
            symbol: "BTC-USDC".into(),
            outcome: CycleOutcome::Completed,
            buy: LegOutcome {
                state: LegState::Filled,
                order_id: Some(OrderId::new("m-1")),
                filled_base: dec!(0.5),
                filled_quote: dec!(20000),
                avg_price: Some(dec!(40000)),
            },
            sell: LegOutcome {
                state: LegState::Filled,
                order_id: Some(OrderId::new("b-1")),
                filled_base: dec!(0.5),
                filled_quote: dec!(20040),
                avg_price: Some(dec!(40080)),
            },
            realized_profit: dec!(40),
            recovery: vec![RecoveryAction::RetriedSell { attempt: 1 }],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: ExecutionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.realized_profit, dec!(40));
        assert_eq!(back.residual_base(), Decimal::ZERO);
        assert_eq!(back.recovery, record.recovery);
    }
}
