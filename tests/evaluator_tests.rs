//! Evaluator scenarios over synthesized books.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use skimmer::core::strategy::{evaluate, EvaluatorConfig, FeeSchedule, RejectReason};
use skimmer::testkit::snapshot;

fn config() -> EvaluatorConfig {
    EvaluatorConfig {
        min_profit_quote: dec!(10),
        min_profit_pct: dec!(0),
        max_base_per_trade: dec!(5),
        max_slippage_bps: dec!(500),
        base_increment: dec!(0.000001),
        fees: FeeSchedule::default(),
    }
}

#[test]
fn test_clean_profit_scenario() {
    // Ask 40,000 x 1; bids 40,100 x 0.5 and 40,050 x 0.5; balance 40,000.
    let buy = snapshot(&[], &[(dec!(40000), dec!(1))], 100);
    let sell = snapshot(
        &[(dec!(40100), dec!(0.5)), (dec!(40050), dec!(0.5))],
        &[],
        200,
    );

    let plan = evaluate(&buy, &sell, dec!(40000), &config()).unwrap();
    assert_eq!(plan.base_amount, dec!(1.0));
    assert_eq!(plan.quote_cost, dec!(40000));
    assert_eq!(plan.quote_proceeds, dec!(40075));
    assert_eq!(plan.expected_profit, dec!(75));
    assert_eq!(plan.profit_bps, dec!(18.75));
    assert_eq!(plan.expected_sell_vwap, dec!(40075));
    assert_eq!(plan.source_book_update_ids, (100, 200));
}

#[test]
fn test_depth_limited_scenario() {
    // A single thin bid caps the size regardless of balance.
    let buy = snapshot(&[], &[(dec!(40000), dec!(1))], 1);
    let sell = snapshot(&[(dec!(40100), dec!(0.3))], &[], 1);

    let plan = evaluate(&buy, &sell, dec!(10_000_000), &config()).unwrap();
    assert_eq!(plan.base_amount, dec!(0.3));
    assert_eq!(plan.quote_cost, dec!(12000));
    assert_eq!(plan.quote_proceeds, dec!(12030));
    assert_eq!(plan.expected_profit, dec!(30));
}

#[test]
fn test_unprofitable_books_emit_no_plan() {
    let buy = snapshot(&[], &[(dec!(40100), dec!(1))], 1);
    let sell = snapshot(&[(dec!(40050), dec!(1))], &[], 1);

    assert!(evaluate(&buy, &sell, dec!(100_000), &config()).is_err());
}

#[test]
fn test_emitted_plans_respect_thresholds() {
    // Invariant: any emitted plan satisfies both profit floors.
    let mut cfg = config();
    cfg.min_profit_quote = dec!(25);
    cfg.min_profit_pct = dec!(0.005);

    let buy = snapshot(&[], &[(dec!(40000), dec!(1))], 1);
    let sell = snapshot(
        &[(dec!(40100), dec!(0.5)), (dec!(40050), dec!(0.5))],
        &[],
        1,
    );

    let plan = evaluate(&buy, &sell, dec!(40000), &cfg).unwrap();
    assert!(plan.expected_profit >= cfg.min_profit_quote);
    assert!(plan.profit_bps >= cfg.min_profit_pct * dec!(100));
}

#[test]
fn test_sell_vwap_bounded_by_consumed_levels() {
    let buy = snapshot(&[], &[(dec!(40000), dec!(5))], 1);
    let sell = snapshot(
        &[
            (dec!(40100), dec!(0.5)),
            (dec!(40060), dec!(0.5)),
            (dec!(40020), dec!(1)),
        ],
        &[],
        1,
    );

    let plan = evaluate(&buy, &sell, dec!(100_000), &config()).unwrap();
    assert!(plan.expected_sell_vwap <= dec!(40100));
    assert!(plan.expected_sell_vwap >= dec!(40020));
    // Positive spread by construction.
    assert!(plan.slippage_bps >= Decimal::ZERO);
}

#[test]
fn test_balance_constraint_rounds_to_increment() {
    let mut cfg = config();
    cfg.base_increment = dec!(0.01);
    cfg.min_profit_quote = dec!(0);

    let buy = snapshot(&[], &[(dec!(40000), dec!(2))], 1);
    let sell = snapshot(&[(dec!(40100), dec!(2))], &[], 1);

    // 10,123 / 40,000 = 0.253075 -> 0.25 at a 0.01 step.
    let plan = evaluate(&buy, &sell, dec!(10123), &cfg).unwrap();
    assert_eq!(plan.base_amount, dec!(0.25));
}

#[test]
fn test_missing_ask_rejects() {
    let buy = snapshot(&[(dec!(39000), dec!(1))], &[], 1);
    let sell = snapshot(&[(dec!(40100), dec!(1))], &[], 1);
    assert_eq!(
        evaluate(&buy, &sell, dec!(40000), &config()).unwrap_err(),
        RejectReason::NoBuyAsk
    );
}
