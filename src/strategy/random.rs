use rand::{Rng, rngs::ThreadRng};
use tracing::debug;

use super::{Strategy, TickBuffer};
use crate::{
    engine::{Candle, Decision, Portfolio},
    errors::Result,
};

/// Baseline trader acting at random: buy with probability 1/6, sell with probability 1/6,
/// hold otherwise. Ratios are drawn uniformly from `[0, 1)`.
///
/// Not deterministic unless built [`with_rng`](RandomActionTrader::with_rng) and a seeded rng.
#[derive(Debug)]
pub struct RandomActionTrader<R = ThreadRng> {
    ticks: TickBuffer,
    portfolio: Portfolio,
    rng: R,
}

impl RandomActionTrader<ThreadRng> {
    /// Creates a trader drawing from the thread-local rng.
    pub fn new(portfolio: Portfolio) -> Self {
        Self::with_rng(portfolio, rand::rng())
    }
}

impl<R: Rng> RandomActionTrader<R> {
    /// Creates a trader drawing from `rng`.
    pub fn with_rng(portfolio: Portfolio, rng: R) -> Self {
        Self {
            ticks: TickBuffer::default(),
            portfolio,
            rng,
        }
    }

    /// Returns every tick seen so far.
    pub fn ticks(&self) -> &TickBuffer {
        &self.ticks
    }
}

impl<R: Rng> Strategy for RandomActionTrader<R> {
    fn append_tick(&mut self, candle: Candle) {
        self.ticks.push(candle);
    }

    fn decide(&mut self) -> Result<Decision> {
        let price = self.ticks.require_close()?;
        let draw: f64 = self.rng.random();

        if draw < 1.0 / 6.0 {
            let ratio = self.rng.random();
            let bought = self.portfolio.buy(ratio, price)?;
            debug!(ratio, price, bought, "random buy");
            Ok(Decision::Buy(ratio))
        } else if draw < 2.0 / 6.0 {
            let ratio = self.rng.random();
            let proceeds = self.portfolio.sell(ratio, price)?;
            debug!(ratio, price, proceeds, "random sell");
            Ok(Decision::Sell(ratio))
        } else {
            Ok(Decision::Hold)
        }
    }

    fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    fn last_close(&self) -> Option<f64> {
        self.ticks.last_close()
    }
}
