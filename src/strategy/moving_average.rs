use tracing::debug;

use super::{Strategy, TickBuffer};
use crate::{
    engine::{Candle, Decision, Portfolio},
    errors::{Error, Result},
};

/// Ticks averaged by the short moving average.
pub const SHORT_WINDOW: usize = 10;
/// Ticks averaged by the long moving average.
pub const LONG_WINDOW: usize = 50;
/// Ratio of the balance spent on an upward crossover.
pub const BUY_RATIO: f64 = 0.5;
/// Ratio of the assets sold on a downward crossover.
pub const SELL_RATIO: f64 = 0.2;

/// Simple moving average of `values[..=index]` over at most `window` points.
///
/// Near the start fewer points are available and the average uses all of them.
pub fn sma_at(values: &[f64], window: usize, index: usize) -> f64 {
    let start = (index + 1).saturating_sub(window);
    let points = &values[start..=index];
    points.iter().sum::<f64>() / points.len() as f64
}

/// Trades the crossover of a short and a long simple moving average of close prices.
///
/// When the short average moves above the long one it buys half of the balance, when it moves
/// below it sells a fifth of the assets. The first tick never counts as a crossover.
#[derive(Debug, Clone)]
pub struct MovingAverageCrossoverTrader {
    ticks: TickBuffer,
    portfolio: Portfolio,
    short: usize,
    long: usize,
    buy_ratio: f64,
    sell_ratio: f64,
}

impl MovingAverageCrossoverTrader {
    /// Creates a 10/50 crossover trader.
    pub fn new(portfolio: Portfolio) -> Self {
        Self {
            ticks: TickBuffer::default(),
            portfolio,
            short: SHORT_WINDOW,
            long: LONG_WINDOW,
            buy_ratio: BUY_RATIO,
            sell_ratio: SELL_RATIO,
        }
    }

    /// Overrides the average windows. `short` must be positive and smaller than `long`.
    pub fn with_windows(mut self, short: usize, long: usize) -> Result<Self> {
        if short == 0 || short >= long {
            return Err(Error::InvalidWindow(format!("short {short} must be in 1..{long}")));
        }
        self.short = short;
        self.long = long;
        Ok(self)
    }

    /// Overrides the ratios traded on an upward and a downward crossover.
    pub fn with_ratios(mut self, buy_ratio: f64, sell_ratio: f64) -> Result<Self> {
        for ratio in [buy_ratio, sell_ratio] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(Error::InvalidRatio(ratio));
            }
        }
        self.buy_ratio = buy_ratio;
        self.sell_ratio = sell_ratio;
        Ok(self)
    }

    /// Returns every tick seen so far.
    pub fn ticks(&self) -> &TickBuffer {
        &self.ticks
    }

    /// Whether the short average is above the long one at `index`.
    fn short_above_long(&self, index: usize) -> bool {
        let closes = self.ticks.closes();
        sma_at(closes, self.short, index) > sma_at(closes, self.long, index)
    }
}

impl Strategy for MovingAverageCrossoverTrader {
    fn append_tick(&mut self, candle: Candle) {
        self.ticks.push(candle);
    }

    fn decide(&mut self) -> Result<Decision> {
        let price = self.ticks.require_close()?;
        let last = self.ticks.len() - 1;
        if last == 0 {
            return Ok(Decision::Hold);
        }

        let above = self.short_above_long(last);
        if above == self.short_above_long(last - 1) {
            return Ok(Decision::Hold);
        }

        if above {
            let bought = self.portfolio.buy(self.buy_ratio, price)?;
            debug!(tick = last, price, bought, "short average crossed above long");
            Ok(Decision::Buy(self.buy_ratio))
        } else {
            let proceeds = self.portfolio.sell(self.sell_ratio, price)?;
            debug!(tick = last, price, proceeds, "short average crossed below long");
            Ok(Decision::Sell(self.sell_ratio))
        }
    }

    fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    fn last_close(&self) -> Option<f64> {
        self.ticks.last_close()
    }
}
