//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`adapter`] — [`MockAdapter`]: a scripted [`ExchangeAdapter`]
//!   (crate::core::exchange::ExchangeAdapter) with per-operation result
//!   queues and recorded placements.
//! - [`stream`] — [`ScriptedBookStream`]: a pre-loaded
//!   [`BookStream`](crate::core::exchange::BookStream).
//! - [`book`] — snapshot builders for tests.

pub mod adapter;
pub mod book;
pub mod stream;

pub use adapter::{MockAdapter, MockFailure, PlacedOrder};
pub use book::{level, snapshot};
pub use stream::ScriptedBookStream;
