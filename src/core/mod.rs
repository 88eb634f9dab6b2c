//! Reusable engine components, free of application wiring.

pub mod domain;
pub mod exchange;
pub mod execution;
pub mod market;
pub mod service;
pub mod strategy;
