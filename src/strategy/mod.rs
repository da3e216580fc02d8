//! Trading strategies replayed by the [`Simulator`](crate::engine::Simulator).
//!
//! A strategy owns its tick buffer and the [`Portfolio`] it trades with. A fresh instance is
//! built for every simulation run and dropped at the end of it.

mod moving_average;
mod random;

pub use moving_average::*;
pub use random::*;

use crate::{
    engine::{Candle, Decision, Portfolio},
    errors::{Error, Result},
};

/// A tick-by-tick trading strategy.
pub trait Strategy {
    /// Appends one tick to the strategy's buffer.
    fn append_tick(&mut self, candle: Candle);

    /// Decides on the latest tick, mutating the portfolio on `Buy` and `Sell`.
    ///
    /// Fails with [`Error::InsufficientData`] when no tick was appended yet.
    fn decide(&mut self) -> Result<Decision>;

    /// Returns the portfolio the strategy trades with.
    fn portfolio(&self) -> &Portfolio;

    /// Close price of the latest appended tick.
    fn last_close(&self) -> Option<f64>;

    /// Equity at the latest close price.
    fn estimated_balance(&self) -> Result<f64> {
        let price = self.last_close().ok_or(Error::InsufficientData)?;
        Ok(self.portfolio().equity(price))
    }
}

/// Growing buffer of every tick a strategy has seen.
#[derive(Debug, Clone, Default)]
pub struct TickBuffer {
    candles: Vec<Candle>,
    closes: Vec<f64>,
}

impl TickBuffer {
    /// Appends a tick.
    pub fn push(&mut self, candle: Candle) {
        self.closes.push(candle.close());
        self.candles.push(candle);
    }

    /// Returns the number of ticks.
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Returns `true` if no tick was pushed.
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Returns the ticks in arrival order.
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Close prices, index-aligned with [`TickBuffer::candles`].
    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    /// Returns the close of the latest tick.
    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }

    /// Latest close, or [`Error::InsufficientData`] on an empty buffer.
    pub(crate) fn require_close(&self) -> Result<f64> {
        self.last_close().ok_or(Error::InsufficientData)
    }
}
