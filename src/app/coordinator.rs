//! Paired-execution coordinator.
//!
//! One tick: read both books, evaluate, re-validate against fresh REST
//! books (the gate), then drive the buy leg and sell the realized fill.
//! Anything that desynchronizes hands off to the recovery planner. The
//! sell quantity is always the buy leg's realized fill, never the
//! planned amount.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::core::domain::{
    CycleId, CycleOutcome, ExecutionRecord, LegOutcome, LegState, RecoveryAction, Symbol,
    TradePlan,
};
use crate::core::exchange::{ExchangeAdapter, OrderSide};
use crate::core::execution::{LegConfig, LegDriver, RecoveryConfig, RecoveryPlanner};
use crate::core::market::BookStore;
use crate::core::service::{Journal, StuckMarker};
use crate::core::strategy::{evaluate, EvaluatorConfig};
use crate::error::{Error, Result};

pub struct CoordinatorParams {
    pub symbol: Symbol,
    pub buy: Arc<dyn ExchangeAdapter>,
    pub sell: Arc<dyn ExchangeAdapter>,
    pub store: Arc<BookStore>,
    pub journal: Journal,
    pub evaluator: EvaluatorConfig,
    pub leg: LegConfig,
    pub recovery: RecoveryConfig,
    pub recheck_interval: Duration,
    /// Max fractional drift between plan price and gate re-check.
    pub pre_exec_tolerance: Decimal,
    pub order_book_depth: usize,
    pub quote_balance: Decimal,
}

#[derive(Debug, Default)]
struct RunStats {
    ticks: u64,
    plans: u64,
    gate_failures: u64,
    completed: u64,
    no_fill: u64,
    realized_profit: Decimal,
}

pub struct Coordinator {
    symbol: Symbol,
    buy: Arc<dyn ExchangeAdapter>,
    sell: Arc<dyn ExchangeAdapter>,
    store: Arc<BookStore>,
    journal: Journal,
    evaluator: EvaluatorConfig,
    leg_driver: LegDriver,
    recovery: RecoveryPlanner,
    recheck_interval: Duration,
    pre_exec_tolerance: Decimal,
    depth: usize,
    quote_balance: Decimal,
    stats: RunStats,
}

impl Coordinator {
    pub fn new(params: CoordinatorParams) -> Self {
        Self {
            symbol: params.symbol,
            buy: params.buy,
            sell: params.sell,
            store: params.store,
            journal: params.journal,
            evaluator: params.evaluator,
            leg_driver: LegDriver::new(params.leg),
            recovery: RecoveryPlanner::new(params.recovery),
            recheck_interval: params.recheck_interval,
            pre_exec_tolerance: params.pre_exec_tolerance,
            depth: params.order_book_depth,
            quote_balance: params.quote_balance,
            stats: RunStats::default(),
        }
    }

    /// Quote currently available to deploy.
    #[must_use]
    pub fn quote_balance(&self) -> Decimal {
        self.quote_balance
    }

    /// Main loop. Returns when the stop flag flips, or with
    /// [`Error::Stuck`] when a position could not be unwound.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) -> Result<()> {
        if let Some(marker) = self.journal.stuck_marker()? {
            return Err(Error::Stuck(format!(
                "uncleared marker from cycle {}: {}",
                marker.cycle_id, marker.reason
            )));
        }
        info!(symbol = %self.symbol, "Coordinator started");

        let result = loop {
            tokio::select! {
                _ = sleep(self.recheck_interval) => {}
                changed = stop.changed() => {
                    // A dropped sender counts as a stop request.
                    if changed.is_err() || *stop.borrow() {
                        break Ok(());
                    }
                    continue;
                }
            }
            match self.tick().await {
                Ok(()) => {}
                Err(e @ Error::Stuck(_)) => break Err(e),
                Err(e) => warn!(error = %e, "Tick failed"),
            }
        };

        info!(
            ticks = self.stats.ticks,
            plans = self.stats.plans,
            gate_failures = self.stats.gate_failures,
            completed = self.stats.completed,
            no_fill = self.stats.no_fill,
            realized_profit = %self.stats.realized_profit,
            "Coordinator stopped"
        );
        result
    }

    /// One evaluation-to-execution cycle. Public so tests can step the
    /// coordinator without the timing loop.
    pub async fn tick(&mut self) -> Result<()> {
        self.stats.ticks += 1;

        let (buy_book, sell_book) = self.store.get_pair(self.buy.name(), self.sell.name());
        let (Some(buy_book), Some(sell_book)) = (buy_book, sell_book) else {
            debug!("Books not ready");
            return Ok(());
        };

        let plan = match evaluate(&buy_book, &sell_book, self.quote_balance, &self.evaluator) {
            Ok(plan) => plan,
            Err(reason) => {
                debug!(reason = %reason, "No opportunity");
                return Ok(());
            }
        };
        self.stats.plans += 1;
        info!(
            base = %plan.base_amount,
            buy_price = %plan.buy_limit_price,
            profit = %plan.expected_profit,
            profit_bps = %plan.profit_bps,
            "Opportunity detected"
        );

        let cycle_id = CycleId::generate();
        let started_at = Utc::now();

        let gate_plan = match self.gate(&plan).await {
            Some(gate_plan) => gate_plan,
            None => {
                self.stats.gate_failures += 1;
                self.emit(ExecutionRecord {
                    cycle_id,
                    symbol: self.symbol.to_string(),
                    outcome: CycleOutcome::Abandoned,
                    buy: LegOutcome::none(LegState::Idle),
                    sell: LegOutcome::none(LegState::Idle),
                    realized_profit: Decimal::ZERO,
                    recovery: Vec::new(),
                    started_at,
                    finished_at: Utc::now(),
                });
                return Ok(());
            }
        };

        self.execute(cycle_id, gate_plan, started_at).await
    }

    /// Pre-execution gate: fresh REST books, re-evaluation, and a bound
    /// on price drift since the plan was computed.
    async fn gate(&self, plan: &TradePlan) -> Option<TradePlan> {
        let fresh_buy = match self.buy.fetch_orderbook(&self.symbol, self.depth).await {
            Ok(book) => book,
            Err(e) => {
                warn!(venue = self.buy.name(), error = %e, "Gate refresh failed");
                return None;
            }
        };
        let fresh_sell = match self.sell.fetch_orderbook(&self.symbol, self.depth).await {
            Ok(book) => book,
            Err(e) => {
                warn!(venue = self.sell.name(), error = %e, "Gate refresh failed");
                return None;
            }
        };

        let gate_plan =
            match evaluate(&fresh_buy, &fresh_sell, self.quote_balance, &self.evaluator) {
                Ok(gate_plan) => gate_plan,
                Err(reason) => {
                    info!(reason = %reason, "Gate re-check found no opportunity, abandoning");
                    return None;
                }
            };

        let drift = (gate_plan.buy_limit_price - plan.buy_limit_price).abs()
            / plan.buy_limit_price;
        if drift > self.pre_exec_tolerance {
            info!(
                planned = %plan.buy_limit_price,
                current = %gate_plan.buy_limit_price,
                drift = %drift,
                "Buy price drifted past tolerance, abandoning"
            );
            return None;
        }
        Some(gate_plan)
    }

    async fn execute(
        &mut self,
        cycle_id: CycleId,
        plan: TradePlan,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let mut recovery_actions: Vec<RecoveryAction> = Vec::new();

        // Buy leg: limit at the gate-checked best ask.
        let mut buy_outcome = match self
            .place_buy(&plan)
            .await
        {
            Ok(order_id) => {
                info!(cycle_id = %cycle_id, order_id = %order_id, "Buy leg submitted");
                self.leg_driver
                    .drive(self.buy.as_ref(), &self.symbol, &order_id, plan.base_amount)
                    .await
            }
            Err(e) => {
                warn!(cycle_id = %cycle_id, error = %e, "Buy placement failed");
                let state = if matches!(e, Error::Rejected { .. } | Error::InvalidOrder(_)) {
                    LegState::Rejected
                } else {
                    LegState::Idle
                };
                LegOutcome::none(state)
            }
        };

        if buy_outcome.state == LegState::Unknown {
            if let Some(order_id) = buy_outcome.order_id.clone() {
                buy_outcome = self
                    .recovery
                    .resolve_buy(
                        self.buy.as_ref(),
                        &self.symbol,
                        &order_id,
                        cycle_id,
                        &mut recovery_actions,
                    )
                    .await;
            }
        }

        if buy_outcome.state == LegState::Unknown {
            let reason = "buy leg state unresolved after recovery".to_string();
            return self
                .mark_stuck(
                    cycle_id,
                    self.buy.name(),
                    plan.base_amount,
                    reason,
                    buy_outcome,
                    LegOutcome::none(LegState::Idle),
                    recovery_actions,
                    started_at,
                )
                .await;
        }

        if !buy_outcome.has_fill() {
            debug!(cycle_id = %cycle_id, state = %buy_outcome.state, "Cycle ends with no fill");
            self.stats.no_fill += 1;
            self.emit(ExecutionRecord {
                cycle_id,
                symbol: self.symbol.to_string(),
                outcome: CycleOutcome::NoFill,
                buy: buy_outcome,
                sell: LegOutcome::none(LegState::Idle),
                realized_profit: Decimal::ZERO,
                recovery: recovery_actions,
                started_at,
                finished_at: Utc::now(),
            });
            return Ok(());
        }

        self.quote_balance -= buy_outcome.filled_quote;

        // Sell leg: always the realized fill, never the planned size.
        let sell_outcome = self
            .recovery
            .sell_all(
                self.sell.as_ref(),
                &self.store,
                &self.leg_driver,
                &self.symbol,
                buy_outcome.filled_base,
                cycle_id,
                &mut recovery_actions,
            )
            .await;

        self.quote_balance += sell_outcome.filled_quote;

        if sell_outcome.filled_base < buy_outcome.filled_base {
            let residual = buy_outcome.filled_base - sell_outcome.filled_base;
            let reason = format!("residual {residual} {} unsold", self.symbol.base());
            return self
                .mark_stuck(
                    cycle_id,
                    self.sell.name(),
                    residual,
                    reason,
                    buy_outcome,
                    sell_outcome,
                    recovery_actions,
                    started_at,
                )
                .await;
        }

        let realized_profit = sell_outcome.filled_quote - buy_outcome.filled_quote;
        self.stats.completed += 1;
        self.stats.realized_profit += realized_profit;
        info!(
            cycle_id = %cycle_id,
            bought = %buy_outcome.filled_base,
            sold = %sell_outcome.filled_base,
            profit = %realized_profit,
            "Cycle completed"
        );
        self.emit(ExecutionRecord {
            cycle_id,
            symbol: self.symbol.to_string(),
            outcome: CycleOutcome::Completed,
            buy: buy_outcome,
            sell: sell_outcome,
            realized_profit,
            recovery: recovery_actions,
            started_at,
            finished_at: Utc::now(),
        });
        Ok(())
    }

    async fn place_buy(&self, plan: &TradePlan) -> Result<crate::core::domain::OrderId> {
        match self
            .buy
            .place_limit(
                &self.symbol,
                OrderSide::Buy,
                plan.base_amount,
                plan.buy_limit_price,
            )
            .await
        {
            Err(e) if e.is_transport() => {
                self.buy
                    .place_limit(
                        &self.symbol,
                        OrderSide::Buy,
                        plan.base_amount,
                        plan.buy_limit_price,
                    )
                    .await
            }
            other => other,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn mark_stuck(
        &mut self,
        cycle_id: CycleId,
        venue: &str,
        base_amount: Decimal,
        reason: String,
        buy: LegOutcome,
        sell: LegOutcome,
        recovery: Vec<RecoveryAction>,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        error!(cycle_id = %cycle_id, venue, reason = %reason, "Cycle stuck");
        self.journal.set_stuck(&StuckMarker {
            cycle_id,
            venue: venue.to_string(),
            symbol: self.symbol.to_string(),
            base_amount,
            reason: reason.clone(),
            created_at: Utc::now(),
        })?;
        self.emit(ExecutionRecord {
            cycle_id,
            symbol: self.symbol.to_string(),
            outcome: CycleOutcome::Stuck,
            buy,
            sell,
            realized_profit: Decimal::ZERO,
            recovery,
            started_at,
            finished_at: Utc::now(),
        });
        Err(Error::Stuck(reason))
    }

    fn emit(&self, record: ExecutionRecord) {
        if let Err(e) = self.journal.append(&record) {
            error!(cycle_id = %record.cycle_id, error = %e, "Failed to journal record");
        }
    }
}
