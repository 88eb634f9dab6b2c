//! Cross-cutting services.

mod journal;

pub use journal::{Journal, StuckMarker};
