//! Core simulation components.
//!
//! This module provides the fundamental types for replaying a series:
//! - `Candle` and `Series`: OHLCV rows and ordered runs of them.
//! - `Portfolio`: quote balance, base assets and fees of one run.
//! - `Decision`: what a strategy did on one tick.
//! - `Simulator`: drives a strategy over a window of a series.

mod candle;
mod decision;
mod portfolio;

pub use candle::*;
pub use decision::*;
pub use portfolio::*;

#[cfg(test)]
mod scenarios;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    errors::{Error, Result},
    strategy::Strategy,
};

/// Part of the series replayed by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Every tick of the series.
    Full,
    /// A contiguous slice of that many ticks at a random offset.
    Random(usize),
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    /// Open time of the tick.
    pub open_time: DateTime<Utc>,
    /// What the strategy decided.
    pub decision: Decision,
    /// Equity right after the decision, at the tick's close price.
    pub equity: f64,
}

/// Decisions and equity trajectory of one run, one step per replayed tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    window: Series,
    steps: Vec<Step>,
    initial_equity: f64,
    fees_paid: f64,
}

impl SimulationResult {
    /// Returns the symbol of the replayed series.
    pub fn symbol(&self) -> &str {
        self.window.symbol()
    }

    /// The ticks that were replayed.
    pub fn window(&self) -> &Series {
        &self.window
    }

    /// Returns every step, in tick order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Returns the number of replayed ticks.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no tick was replayed.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the decisions, in tick order.
    pub fn decisions(&self) -> impl Iterator<Item = Decision> + '_ {
        self.steps.iter().map(|s| s.decision)
    }

    /// Returns the equity after each tick.
    pub fn equity(&self) -> impl Iterator<Item = f64> + '_ {
        self.steps.iter().map(|s| s.equity)
    }

    /// Equity before the first tick.
    pub fn initial_equity(&self) -> f64 {
        self.initial_equity
    }

    /// Equity after the last tick.
    pub fn final_equity(&self) -> f64 {
        self.steps.last().map_or(self.initial_equity, |s| s.equity)
    }

    /// Returns the fees paid over the run.
    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }
}

/// Replays a [`Series`] tick by tick through a [`Strategy`].
///
/// The simulator never mutates the series; every run works on its own window and the strategy
/// instance it is given. A failed run leaves nothing behind.
#[derive(Debug, Clone)]
pub struct Simulator {
    series: Series,
}

impl Simulator {
    /// Creates a simulator over a non-empty series.
    pub fn new(series: Series) -> Result<Self> {
        if series.is_empty() {
            return Err(Error::CandleDataEmpty);
        }
        Ok(Self { series })
    }

    /// Returns the whole series.
    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Selects the ticks `window` covers.
    pub fn select<R: Rng + ?Sized>(&self, window: Window, rng: &mut R) -> Result<Series> {
        match window {
            Window::Full => Ok(self.series.clone()),
            Window::Random(len) => self.series.random_window(len, rng),
        }
    }

    /// Runs `strategy` over `window`, drawing random offsets from the thread rng.
    pub fn run<S: Strategy>(&self, window: Window, strategy: &mut S) -> Result<SimulationResult> {
        self.run_with_rng(window, strategy, &mut rand::rng())
    }

    /// Runs `strategy` over `window`.
    ///
    /// For every tick, in time order: `append_tick`, then `decide`, then the equity at the tick's
    /// close is recorded. The first error aborts the run.
    pub fn run_with_rng<S, R>(&self, window: Window, strategy: &mut S, rng: &mut R) -> Result<SimulationResult>
    where
        S: Strategy,
        R: Rng + ?Sized,
    {
        let window = self.select(window, rng)?;
        let first_close = window.first().map(Candle::close).ok_or(Error::CandleDataEmpty)?;
        let initial_equity = strategy.portfolio().equity(first_close);

        let mut steps = Vec::with_capacity(window.len());
        for candle in window.candles() {
            let open_time = candle.open_time();
            strategy.append_tick(candle.clone());
            let decision = strategy.decide()?;
            let equity = strategy.estimated_balance()?;
            steps.push(Step {
                open_time,
                decision,
                equity,
            });
        }

        let fees_paid = strategy.portfolio().fees_paid();
        debug!(
            symbol = window.symbol(),
            ticks = steps.len(),
            initial_equity,
            fees_paid,
            "simulation done"
        );

        Ok(SimulationResult {
            window,
            steps,
            initial_equity,
            fees_paid,
        })
    }
}
