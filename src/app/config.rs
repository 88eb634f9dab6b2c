//! Engine configuration.
//!
//! Loaded from a TOML file at startup and validated before anything
//! connects; a bad value refuses to run rather than trading on defaults.
//! Monetary values are TOML strings so they parse as exact decimals.

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::core::domain::Symbol;
use crate::core::execution::{LegConfig, RecoveryConfig};
use crate::core::market::FallbackConfig;
use crate::core::strategy::{EvaluatorConfig, FeeSchedule};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub engine: EngineConfig,
    #[serde(default)]
    pub orders: OrdersConfig,
    pub mexc: MexcConfig,
    pub bingx: BingxConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Canonical pair, `BASE-QUOTE`.
    pub symbol: Symbol,
    /// Quote budget the engine may deploy.
    pub quote_balance: Decimal,
    pub min_profit_quote: Decimal,
    /// Percent of cost.
    pub min_profit_pct: Decimal,
    pub max_base_per_trade: Decimal,
    pub max_slippage_bps: Decimal,
    #[serde(default = "default_recheck_interval_ms")]
    pub recheck_interval_ms: u64,
    /// Max drift (percent) between plan price and the gate re-check.
    #[serde(default = "default_pre_exec_price_tolerance_pct")]
    pub pre_exec_price_tolerance_pct: Decimal,
    /// Fraction (percent) below best bid for the emergency unwind.
    #[serde(default = "default_emergency_discount_pct")]
    pub emergency_discount_pct: Decimal,
    #[serde(default = "default_sell_retries")]
    pub sell_retries: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OrdersConfig {
    pub order_timeout_ms: u64,
    pub order_poll_ms: u64,
    pub order_book_depth: usize,
    /// Consecutive failed status polls before a leg goes `Unknown`.
    pub max_poll_failures: u32,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            order_timeout_ms: 30_000,
            order_poll_ms: 500,
            order_book_depth: 20,
            max_poll_failures: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MexcConfig {
    #[serde(default = "default_mexc_ws_endpoints")]
    pub ws_endpoints: Vec<String>,
    #[serde(default = "default_mexc_api_url")]
    pub api_url: String,
    #[serde(default = "default_mexc_ping_interval_s")]
    pub ping_interval_s: u64,
    #[serde(default = "default_true")]
    pub rest_fallback: bool,
    #[serde(default = "default_mexc_stale_ms")]
    pub stale_ms: u64,
    #[serde(default = "default_rest_max_deviation_quote")]
    pub rest_max_deviation_quote: Decimal,
    #[serde(default = "default_base_increment")]
    pub base_increment: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BingxConfig {
    #[serde(default = "default_bingx_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_bingx_api_url")]
    pub api_url: String,
    #[serde(default = "default_bingx_depth")]
    pub depth: usize,
    #[serde(default = "default_base_increment")]
    pub base_increment: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct JournalConfig {
    pub dir: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { dir: "data".into() }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "failed to read {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|e| Error::Config(format!("parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let e = &self.engine;
        if e.quote_balance < Decimal::ZERO {
            return Err(Error::Config("quote_balance must be non-negative".into()));
        }
        if e.max_base_per_trade <= Decimal::ZERO {
            return Err(Error::Config("max_base_per_trade must be positive".into()));
        }
        if e.max_slippage_bps < Decimal::ZERO {
            return Err(Error::Config("max_slippage_bps must be non-negative".into()));
        }
        if e.recheck_interval_ms == 0 {
            return Err(Error::Config("recheck_interval_ms must be positive".into()));
        }
        if e.pre_exec_price_tolerance_pct <= Decimal::ZERO
            || e.pre_exec_price_tolerance_pct >= Decimal::ONE_HUNDRED
        {
            return Err(Error::Config(
                "pre_exec_price_tolerance_pct must be in (0, 100)".into(),
            ));
        }
        if e.emergency_discount_pct < Decimal::ZERO
            || e.emergency_discount_pct >= Decimal::ONE_HUNDRED
        {
            return Err(Error::Config(
                "emergency_discount_pct must be in [0, 100)".into(),
            ));
        }
        if self.orders.order_poll_ms == 0 || self.orders.order_timeout_ms == 0 {
            return Err(Error::Config("order timings must be positive".into()));
        }
        if self.orders.order_book_depth == 0 {
            return Err(Error::Config("order_book_depth must be positive".into()));
        }
        if self.mexc.ws_endpoints.is_empty() {
            return Err(Error::Config("mexc.ws_endpoints cannot be empty".into()));
        }
        if self.mexc.base_increment <= Decimal::ZERO || self.bingx.base_increment <= Decimal::ZERO
        {
            return Err(Error::Config("base_increment must be positive".into()));
        }
        Ok(())
    }

    /// Install the global tracing subscriber per `[logging]`.
    pub fn init_logging(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.level));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if self.logging.format == "json" {
            builder.json().init();
        } else {
            builder.init();
        }
    }

    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            min_profit_quote: self.engine.min_profit_quote,
            min_profit_pct: self.engine.min_profit_pct,
            max_base_per_trade: self.engine.max_base_per_trade,
            max_slippage_bps: self.engine.max_slippage_bps,
            base_increment: self.mexc.base_increment,
            fees: FeeSchedule::default(),
        }
    }

    pub fn leg_config(&self) -> LegConfig {
        LegConfig {
            poll_interval: Duration::from_millis(self.orders.order_poll_ms),
            timeout: Duration::from_millis(self.orders.order_timeout_ms),
            max_poll_failures: self.orders.max_poll_failures,
        }
    }

    pub fn recovery_config(&self) -> RecoveryConfig {
        RecoveryConfig {
            sell_retries: self.engine.sell_retries,
            emergency_discount: self.engine.emergency_discount_pct / Decimal::ONE_HUNDRED,
            ..RecoveryConfig::default()
        }
    }

    pub fn mexc_fallback_config(&self) -> FallbackConfig {
        FallbackConfig {
            stale_after: Duration::from_millis(self.mexc.stale_ms),
            max_deviation: self.mexc.rest_max_deviation_quote,
            depth: self.orders.order_book_depth,
        }
    }

    pub fn recheck_interval(&self) -> Duration {
        Duration::from_millis(self.engine.recheck_interval_ms)
    }

    pub fn mexc_ping_interval(&self) -> Duration {
        Duration::from_secs(self.mexc.ping_interval_s)
    }

    /// Tolerance as a fraction of price.
    pub fn pre_exec_tolerance(&self) -> Decimal {
        self.engine.pre_exec_price_tolerance_pct / Decimal::ONE_HUNDRED
    }
}

fn default_recheck_interval_ms() -> u64 {
    1_000
}
fn default_pre_exec_price_tolerance_pct() -> Decimal {
    Decimal::TWO
}
fn default_emergency_discount_pct() -> Decimal {
    Decimal::ONE
}
fn default_sell_retries() -> u32 {
    2
}
fn default_mexc_ws_endpoints() -> Vec<String> {
    vec!["wss://wbs-api.mexc.com/ws".into()]
}
fn default_mexc_api_url() -> String {
    "https://api.mexc.com".into()
}
fn default_mexc_ping_interval_s() -> u64 {
    20
}
fn default_true() -> bool {
    true
}
fn default_mexc_stale_ms() -> u64 {
    2_000
}
fn default_rest_max_deviation_quote() -> Decimal {
    Decimal::from(50)
}
fn default_base_increment() -> Decimal {
    Decimal::new(1, 6) // 0.000001
}
fn default_bingx_ws_url() -> String {
    "wss://open-api-ws.bingx.com/market".into()
}
fn default_bingx_api_url() -> String {
    "https://open-api.bingx.com".into()
}
fn default_bingx_depth() -> usize {
    20
}
