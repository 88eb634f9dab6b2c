//! Exchange abstraction layer.
//!
//! [`ExchangeAdapter`] and [`BookStream`] are the only surfaces the rest
//! of the engine sees; the `mexc` and `bingx` modules implement them for
//! the two venues of the pair. `signing` holds the HMAC request signing
//! both REST clients share.

pub mod bingx;
pub mod mexc;
pub mod signing;
mod traits;

pub use traits::{BookEvent, BookStream, ExchangeAdapter, OrderSide, OrderStatus};
