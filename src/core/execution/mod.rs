//! Order execution: the per-leg state machine and the recovery planner.

mod leg;
mod recovery;

pub use leg::{LegConfig, LegDriver};
pub use recovery::{RecoveryConfig, RecoveryPlanner};
