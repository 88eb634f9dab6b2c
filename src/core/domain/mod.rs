//! Pure domain types: symbols, books, depth curves, plans, and execution
//! records. Nothing here performs I/O or holds locks.

mod book;
mod curve;
mod execution;
mod plan;
mod symbol;

pub use book::{BookSnapshot, PriceLevel};
pub use curve::{DepthCurve, Fill};
pub use execution::{
    CycleId, CycleOutcome, ExecutionRecord, LegOutcome, LegState, OrderId, RecoveryAction,
};
pub use plan::TradePlan;
pub use symbol::Symbol;
