//! Live market data: book store and the service tasks that feed it.

mod service;
mod store;

pub use service::{BookUpdate, FallbackConfig, MarketDataService};
pub use store::BookStore;
