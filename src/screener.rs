//! Tenbagger screener: flags symbols whose price rose sharply over the last three hours.
//!
//! A symbol is flagged when the latest close is at least `threshold` above the lowest low of its
//! last [`LOOKBACK`] one minute candles. The newest of them is the still-forming candle, so its
//! close is the current price.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    engine::Series,
    errors::{Error, Result},
    exchange::{Interval, KlineRequest, KlineSource},
    utils::floor_minute,
};

/// Candles inspected per symbol.
pub const LOOKBACK: u16 = 180;
/// Default rise that flags a symbol (10%).
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// A flagged symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    /// Flagged pair.
    pub symbol: String,
    /// Close time of the newest candle.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub close_time: DateTime<Utc>,
    /// Close of the newest candle.
    pub last_price: f64,
    /// Lowest low over the lookback.
    pub low_price: f64,
    /// `(last_price - low_price) / low_price`
    pub rise: f64,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}: last {} low {} (+{:.2}%)",
            self.symbol,
            self.close_time.format("%Y-%m-%d %H:%M:%S"),
            self.last_price,
            self.low_price,
            self.rise * 100.0
        )
    }
}

/// Checks one series. Returns `None` for an empty series or a rise below `threshold`.
pub fn detect(series: &Series, threshold: f64) -> Option<Signal> {
    let last = series.last()?;
    let low_price = series.candles().map(|c| c.low()).fold(f64::INFINITY, f64::min);
    if low_price <= 0.0 || !low_price.is_finite() {
        return None;
    }

    let rise = (last.close() - low_price) / low_price;
    (rise >= threshold).then(|| Signal {
        symbol: series.symbol().to_string(),
        close_time: last.close_time(),
        last_price: last.close(),
        low_price,
        rise,
    })
}

/// Request for the last [`LOOKBACK`] candles up to `now`, the forming one included.
pub fn lookback_request(symbol: &str, now: DateTime<Utc>) -> KlineRequest {
    let current = floor_minute(now);
    KlineRequest {
        symbol: symbol.to_string(),
        interval: Interval::OneMinute,
        start: current - Duration::minutes(i64::from(LOOKBACK) - 1),
        end: now,
        limit: LOOKBACK,
    }
}

/// Fetches every symbol concurrently and returns the flagged ones, in `symbols` order.
///
/// A symbol whose fetch fails is logged and skipped. A closed source fails the whole screen.
pub async fn screen<S: KlineSource>(
    source: &S,
    symbols: &[String],
    now: DateTime<Utc>,
    threshold: f64,
) -> Result<Vec<Signal>> {
    let fetches = symbols.iter().map(|symbol| async move {
        let candles = source.fetch_klines(lookback_request(symbol, now)).await?;
        Series::new(symbol.as_str(), candles)
    });

    let mut signals = Vec::new();
    for (symbol, result) in symbols.iter().zip(join_all(fetches).await) {
        match result {
            Ok(series) => signals.extend(detect(&series, threshold)),
            Err(Error::Shutdown) => return Err(Error::Shutdown),
            Err(e) => warn!(symbol = %symbol, error = %e, "screening skipped"),
        }
    }

    info!(screened = symbols.len(), flagged = signals.len(), "screen done");
    Ok(signals)
}
