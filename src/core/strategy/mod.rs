//! Opportunity detection.

mod evaluator;

pub use evaluator::{evaluate, EvaluatorConfig, FeeSchedule, RejectReason};
