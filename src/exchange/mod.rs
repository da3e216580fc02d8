//! Exchange access: rate limiting, kline requests, pagination and symbol discovery.
//!
//! - `RateLimiter`: bounded permit pool shared by every request.
//! - `BinanceClient`: one rate-limited request per call (`klines`, `symbols`).
//! - `Paginator`: splits long ranges into sub-windows fetched concurrently, merged in time order.

mod client;
mod limiter;
mod paginator;

pub use client::*;
pub use limiter::*;
pub use paginator::*;

use std::{future::Future, str::FromStr};

use chrono::{DateTime, Duration, Utc};

use crate::{
    engine::Candle,
    errors::{Error, Result},
};

/// Maximum number of rows returned by one kline request.
pub const MAX_LIMIT: u16 = 1000;

/// Kline interval. Only one minute candles are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interval {
    /// One minute candles (`1m`).
    #[default]
    OneMinute,
}

impl Interval {
    /// Returns the wire name of the interval.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
        }
    }

    /// Returns the time covered by one candle.
    pub fn duration(&self) -> Duration {
        match self {
            Self::OneMinute => Duration::minutes(1),
        }
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1m" => Ok(Self::OneMinute),
            other => Err(Error::UnsupportedInterval(other.to_string())),
        }
    }
}

/// Half-open time range `[start, end)` covered by a single kline request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl SubWindow {
    /// Time covered by one full request: `MAX_LIMIT` one minute candles.
    pub fn span() -> Duration {
        Interval::OneMinute.duration() * i32::from(MAX_LIMIT)
    }

    /// Splits `[start, end)` into consecutive sub-windows of [`SubWindow::span`], the last one
    /// clipped to `end`. Each window is computed from its position alone.
    pub fn split(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Self>> {
        if start >= end {
            return Err(Error::InvalidRange(start.timestamp_millis(), end.timestamp_millis()));
        }

        let span = Self::span();
        let span_ms = span.num_milliseconds();
        let total_ms = (end - start).num_milliseconds();
        let count = (total_ms + span_ms - 1) / span_ms;

        Ok((0..count)
            .map(|position| {
                let window_start = start + span * position as i32;
                Self {
                    start: window_start,
                    end: (window_start + span).min(end),
                }
            })
            .collect())
    }

    /// Returns the first millisecond of the window.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the exclusive end of the window.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// One kline request, with an inclusive `[start, end]` range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineRequest {
    /// Trading pair, for example `BTCUSDT`.
    pub symbol: String,
    /// Candle interval.
    pub interval: Interval,
    /// Earliest open time requested.
    pub start: DateTime<Utc>,
    /// Last millisecond requested, inclusive.
    pub end: DateTime<Utc>,
    /// Maximum number of rows, at most [`MAX_LIMIT`].
    pub limit: u16,
}

impl KlineRequest {
    /// Full-limit request for a sub-window; the exclusive end becomes the last included millisecond.
    pub fn for_window(symbol: &str, window: SubWindow) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval: Interval::OneMinute,
            start: window.start,
            end: window.end - Duration::milliseconds(1),
            limit: MAX_LIMIT,
        }
    }

    /// Checks the limit and the range before anything is sent.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(Error::InvalidLimit(self.limit));
        }
        if self.start > self.end {
            return Err(Error::InvalidRange(self.start.timestamp_millis(), self.end.timestamp_millis()));
        }
        Ok(())
    }
}

/// Something that answers kline requests, usually [`BinanceClient`].
pub trait KlineSource {
    /// Fetches the candles of one request, in time order.
    fn fetch_klines(&self, request: KlineRequest) -> impl Future<Output = Result<Vec<Candle>>> + Send;

    /// Releases network resources. Later requests fail.
    fn shutdown(&self) {}
}
