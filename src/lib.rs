//! Skimmer - cross-exchange spot arbitrage for a single pair.
//!
//! Buys at the best ask on MEXC, market-sells the realized fill into
//! BingX bids, and refuses to end a cycle holding anything but quote
//! currency.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── core/             # Reusable engine components
//! │   ├── domain/       # Books, depth curves, plans, records
//! │   ├── exchange/     # Venue traits + MEXC / BingX implementations
//! │   ├── market/       # Live book store + feed tasks
//! │   ├── strategy/     # Opportunity evaluation
//! │   ├── execution/    # Leg state machine + recovery planner
//! │   └── service/      # Journal persistence
//! └── app/              # Configuration and the coordinator loop
//! ```

pub mod app;
pub mod core;
pub mod error;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
