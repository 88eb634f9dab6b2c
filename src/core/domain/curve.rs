//! Cumulative depth curve over one sorted book side.
//!
//! Pure arithmetic over [`Decimal`] ladders: what would a taker order of a
//! given base size pay (against asks) or receive (against bids)? The walk
//! is deterministic and never touches floating point.

use rust_decimal::Decimal;

use super::book::PriceLevel;

/// Result of consuming a ladder for a requested base amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    /// Base amount actually consumable. Equals the request unless the
    /// ladder ran out of depth.
    pub base: Decimal,
    /// Quote paid or received for `base`.
    pub quote: Decimal,
    /// True when the request exceeded available depth and `base` is the
    /// full ladder.
    pub depth_limited: bool,
}

impl Fill {
    /// Volume-weighted average price of this fill, `None` on zero base.
    #[must_use]
    pub fn vwap(&self) -> Option<Decimal> {
        if self.base.is_zero() {
            None
        } else {
            Some(self.quote / self.base)
        }
    }
}

/// Cumulative `(base, quote)` totals over a ladder, best level first.
///
/// Built once per evaluation from a snapshot side; the caller chooses the
/// side, the curve does not care whether it is consuming bids or asks.
#[derive(Debug, Clone)]
pub struct DepthCurve {
    levels: Vec<PriceLevel>,
    cum_base: Vec<Decimal>,
    cum_quote: Vec<Decimal>,
}

impl DepthCurve {
    pub fn from_levels(levels: &[PriceLevel]) -> Self {
        let mut cum_base = Vec::with_capacity(levels.len());
        let mut cum_quote = Vec::with_capacity(levels.len());
        let mut base = Decimal::ZERO;
        let mut quote = Decimal::ZERO;
        for level in levels {
            base += level.size;
            quote += level.size * level.price;
            cum_base.push(base);
            cum_quote.push(quote);
        }
        Self {
            levels: levels.to_vec(),
            cum_base,
            cum_quote,
        }
    }

    /// Total base depth on this side.
    #[must_use]
    pub fn available_base(&self) -> Decimal {
        self.cum_base.last().copied().unwrap_or(Decimal::ZERO)
    }

    /// Quote total for consuming `base` from the best level down.
    ///
    /// Inside the last partially consumed level `k` the fill is exact:
    /// `cum_quote[k-1] + (base - cum_base[k-1]) * price_k`. A request past
    /// the end of the ladder returns the whole ladder, flagged
    /// depth-limited.
    #[must_use]
    pub fn quote_for_base(&self, base: Decimal) -> Fill {
        if base <= Decimal::ZERO || self.levels.is_empty() {
            return Fill {
                base: Decimal::ZERO,
                quote: Decimal::ZERO,
                depth_limited: self.levels.is_empty() && base > Decimal::ZERO,
            };
        }

        let total = self.available_base();
        if base >= total {
            return Fill {
                base: total,
                quote: *self.cum_quote.last().expect("non-empty ladder"),
                depth_limited: base > total,
            };
        }

        // First level whose cumulative base covers the request.
        let k = self
            .cum_base
            .partition_point(|&cum| cum < base);
        let (prev_base, prev_quote) = if k == 0 {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            (self.cum_base[k - 1], self.cum_quote[k - 1])
        };
        let partial = base - prev_base;
        Fill {
            base,
            quote: prev_quote + partial * self.levels[k].price,
            depth_limited: false,
        }
    }

    /// VWAP achieved by a taker order of `base`, `None` when the ladder is
    /// empty or the request is non-positive.
    #[must_use]
    pub fn vwap_for_base(&self, base: Decimal) -> Option<Decimal> {
        self.quote_for_base(base).vwap()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn ladder() -> DepthCurve {
        DepthCurve::from_levels(&[
            PriceLevel::new(dec!(40100), dec!(0.5)),
            PriceLevel::new(dec!(40050), dec!(0.5)),
            PriceLevel::new(dec!(40000), dec!(1.0)),
        ])
    }

    #[test]
    fn test_exact_level_boundary_is_exact_sum() {
        // Consuming exactly the top two levels must equal the exact sum of
        // size * price, no rounding.
        let fill = ladder().quote_for_base(dec!(1.0));
        assert_eq!(fill.quote, dec!(40100) * dec!(0.5) + dec!(40050) * dec!(0.5));
        assert_eq!(fill.base, dec!(1.0));
        assert!(!fill.depth_limited);
    }

    #[test]
    fn test_partial_level_interpolates_at_level_price() {
        let fill = ladder().quote_for_base(dec!(0.75));
        // 0.5 @ 40100, then 0.25 @ 40050.
        assert_eq!(fill.quote, dec!(20050) + dec!(0.25) * dec!(40050));
        assert!(!fill.depth_limited);
    }

    #[test]
    fn test_first_level_partial() {
        let fill = ladder().quote_for_base(dec!(0.2));
        assert_eq!(fill.quote, dec!(0.2) * dec!(40100));
    }

    #[test]
    fn test_depth_limited_returns_whole_ladder() {
        let fill = ladder().quote_for_base(dec!(5));
        assert_eq!(fill.base, dec!(2.0));
        assert!(fill.depth_limited);
        assert_eq!(
            fill.quote,
            dec!(40100) * dec!(0.5) + dec!(40050) * dec!(0.5) + dec!(40000)
        );
    }

    #[test]
    fn test_vwap_within_consumed_price_range() {
        let curve = ladder();
        let vwap = curve.vwap_for_base(dec!(1.5)).unwrap();
        assert!(vwap >= dec!(40000));
        assert!(vwap <= dec!(40100));
    }

    #[test]
    fn test_zero_request_is_empty_fill() {
        let fill = ladder().quote_for_base(Decimal::ZERO);
        assert_eq!(fill.base, Decimal::ZERO);
        assert_eq!(fill.quote, Decimal::ZERO);
        assert!(!fill.depth_limited);
        assert!(fill.vwap().is_none());
    }

    #[test]
    fn test_empty_ladder_is_depth_limited() {
        let curve = DepthCurve::from_levels(&[]);
        let fill = curve.quote_for_base(dec!(1));
        assert_eq!(fill.base, Decimal::ZERO);
        assert!(fill.depth_limited);
    }

    #[test]
    fn test_identical_inputs_identical_outputs() {
        let a = ladder().quote_for_base(dec!(1.234567891234567891));
        let b = ladder().quote_for_base(dec!(1.234567891234567891));
        assert_eq!(a, b);
    }
}
