//! Canonical trading pair symbol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A trading pair in canonical `BASE-QUOTE` form, e.g. `BTC-USDC`.
///
/// Venues use their own native spellings (MEXC: `BTCUSDC`, BingX:
/// `BTC-USDC`); adapters map on their boundary via
/// [`ExchangeAdapter::native_symbol`](crate::core::exchange::ExchangeAdapter::native_symbol).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    base: String,
    quote: String,
}

impl Symbol {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_ascii_uppercase(),
            quote: quote.into().to_ascii_uppercase(),
        }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Concatenated form without separator (`BTCUSDC`).
    #[must_use]
    pub fn joined(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl FromStr for Symbol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() => {
                Ok(Self::new(base, quote))
            }
            _ => Err(Error::Symbol(format!(
                "expected BASE-QUOTE form, got {s:?}"
            ))),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

impl TryFrom<String> for Symbol {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Symbol> for String {
    fn from(s: Symbol) -> Self {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_form() {
        let s: Symbol = "BTC-USDC".parse().unwrap();
        assert_eq!(s.base(), "BTC");
        assert_eq!(s.quote(), "USDC");
        assert_eq!(s.to_string(), "BTC-USDC");
    }

    #[test]
    fn test_parse_uppercases() {
        let s: Symbol = "btc-usdc".parse().unwrap();
        assert_eq!(s.joined(), "BTCUSDC");
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        assert!("BTCUSDC".parse::<Symbol>().is_err());
        assert!("BTC-".parse::<Symbol>().is_err());
        assert!("-USDC".parse::<Symbol>().is_err());
    }
}
