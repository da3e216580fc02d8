use std::{env, path::PathBuf, time::Duration};

use crate::{
    engine::{DEFAULT_BALANCE, DEFAULT_FEE},
    exchange::{DEFAULT_PERMITS, DEFAULT_SPACING},
};

/// Binance spot REST base URL.
pub const DEFAULT_API_URL: &str = "https://api.binance.com/api/v3";

/// Runtime configuration read from `KLINE_BTS_*` environment variables.
///
/// Unset, empty or unparsable variables fall back to the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// REST base URL, without trailing slash.
    pub api_url: String,
    /// Concurrent requests allowed by the rate limiter.
    pub max_inflight: usize,
    /// Time a limiter slot stays taken after its request.
    pub spacing: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Quote asset kept by symbol discovery.
    pub quote_asset: String,
    /// Directory holding stored series.
    pub data_dir: PathBuf,
    /// Starting quote balance of each portfolio.
    pub initial_balance: f64,
    /// Flat fee rate charged on every trade.
    pub trading_fee: f64,
    /// Days of history fetched by a dump.
    pub history_days: i64,
    /// Ticks replayed by a random-window backtest.
    pub window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            max_inflight: DEFAULT_PERMITS,
            spacing: DEFAULT_SPACING,
            timeout: Duration::from_secs(10),
            quote_asset: "USDT".to_string(),
            data_dir: PathBuf::from("data"),
            initial_balance: DEFAULT_BALANCE,
            trading_fee: DEFAULT_FEE,
            history_days: 100,
            window: 1000,
        }
    }
}

impl Config {
    /// Reads the configuration from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: env_str("KLINE_BTS_API_URL", &defaults.api_url),
            max_inflight: env_usize("KLINE_BTS_MAX_INFLIGHT", defaults.max_inflight).max(1),
            spacing: Duration::from_millis(env_u64("KLINE_BTS_SPACING_MS", defaults.spacing.as_millis() as u64)),
            timeout: Duration::from_secs(env_u64("KLINE_BTS_TIMEOUT_S", defaults.timeout.as_secs()).max(1)),
            quote_asset: env_str("KLINE_BTS_QUOTE_ASSET", &defaults.quote_asset),
            data_dir: PathBuf::from(env_str("KLINE_BTS_DATA_DIR", "data")),
            initial_balance: env_f64("KLINE_BTS_INITIAL_BALANCE", defaults.initial_balance),
            trading_fee: env_f64("KLINE_BTS_TRADING_FEE", defaults.trading_fee),
            history_days: env_u64("KLINE_BTS_HISTORY_DAYS", defaults.history_days as u64).max(1) as i64,
            window: env_usize("KLINE_BTS_WINDOW", defaults.window).max(1),
        }
    }
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
