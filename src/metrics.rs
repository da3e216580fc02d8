//! Performance metrics for simulation runs.
//!
//! This module provides tools to calculate:
//! - Total return
//! - Max drawdown
//! - Sharpe ratio
//! - Trade counts and fees
//!
//! Every figure is computed from the per-tick equity trajectory of a [`SimulationResult`].
//! It needs the `metrics` feature, enabled by default.

use std::fmt;

use serde::Serialize;

use crate::engine::*;

/// A collection of trading metrics calculated from one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    symbol: String,
    ticks: usize,
    buys: usize,
    sells: usize,
    fees: f64,
    initial_equity: f64,
    equity: Vec<f64>,
}

impl From<&SimulationResult> for Metrics {
    fn from(value: &SimulationResult) -> Self {
        Self {
            symbol: value.symbol().to_string(),
            ticks: value.len(),
            buys: value.decisions().filter(Decision::is_buy).count(),
            sells: value.decisions().filter(Decision::is_sell).count(),
            fees: value.fees_paid(),
            initial_equity: value.initial_equity(),
            equity: value.equity().collect(),
        }
    }
}

impl Metrics {
    /// Creates metrics from an equity trajectory, its starting equity and the fees paid.
    pub fn new(equity: Vec<f64>, initial_equity: f64, fees: f64) -> Self {
        Self {
            symbol: String::new(),
            ticks: equity.len(),
            buys: 0,
            sells: 0,
            fees,
            initial_equity,
            equity,
        }
    }

    /// Returns the symbol of the run.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the equity before the first tick.
    pub fn initial_equity(&self) -> f64 {
        self.initial_equity
    }

    /// Equity after the last tick.
    pub fn final_equity(&self) -> f64 {
        self.equity.last().copied().unwrap_or(self.initial_equity)
    }

    /// Returns the number of buy decisions.
    pub fn buys(&self) -> usize {
        self.buys
    }

    /// Returns the number of sell decisions.
    pub fn sells(&self) -> usize {
        self.sells
    }

    /// Returns the cumulative fees paid.
    pub fn fees(&self) -> f64 {
        self.fees
    }

    /// Computes the total return as a percentage.
    pub fn total_return(&self) -> f64 {
        (self.final_equity() - self.initial_equity) / self.initial_equity * 100.0
    }

    /// Computes the maximum drawdown as a percentage.
    pub fn max_drawdown(&self) -> f64 {
        let mut max_peak = self.initial_equity;
        let mut max_drawdown = 0.0;

        for &equity in &self.equity {
            if equity > max_peak {
                max_peak = equity;
            }
            let drawdown = (max_peak - equity) / max_peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        max_drawdown * 100.0
    }

    /// Computes the Sharpe ratio of per-tick equity returns.
    ///
    /// `risk_free_rate` is the per-tick risk-free return (usually 0.0). The ratio is NaN without
    /// ticks and infinite, or NaN, when equity never moves.
    pub fn sharpe_ratio(&self, risk_free_rate: f64) -> f64 {
        let mut returns = Vec::with_capacity(self.equity.len());
        let mut previous = self.initial_equity;

        for &equity in &self.equity {
            returns.push((equity - previous) / previous);
            previous = equity;
        }

        let mean_return = returns.iter().sum::<f64>() / returns.len() as f64;
        let std_dev = (returns.iter().map(|r| (r - mean_return).powi(2)).sum::<f64>() / returns.len() as f64).sqrt();

        (mean_return - risk_free_rate) / std_dev
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Simulation Metrics ===")?;
        if !self.symbol.is_empty() {
            writeln!(f, "Symbol: {}", self.symbol)?;
        }
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Initial Equity: {:.2}", self.initial_equity)?;
        writeln!(f, "Final Equity: {:.2}", self.final_equity())?;
        writeln!(f, "Fees paid: {:.2}", self.fees)?;
        writeln!(f, "Buys / Sells: {} / {}", self.buys, self.sells)?;
        #[allow(clippy::writeln_empty_string)]
        writeln!(f, "")?;
        writeln!(f, "Total Return: {:.2}%", self.total_return())?;
        writeln!(f, "Max Drawdown: {:.2}%", self.max_drawdown())?;
        write!(f, "Sharpe Ratio (risk-free rate = 0.0): {:.4}", self.sharpe_ratio(0.0))
    }
}

#[cfg(test)]
#[test]
fn max_drawdown() {
    let metrics = Metrics::new(vec![10000.0, 12000.0, 9000.0, 11000.0], 10000.0, 0.0);
    assert_eq!(metrics.max_drawdown(), 25.0); // (12000 - 9000) / 12000 = 25%
}

#[cfg(test)]
#[test]
fn max_drawdown_no_ticks() {
    let metrics = Metrics::new(vec![], 10000.0, 0.0);
    assert_eq!(metrics.max_drawdown(), 0.0);
}

#[cfg(test)]
#[test]
fn total_return() {
    let metrics = Metrics::new(vec![10500.0, 9800.0, 11000.0], 10000.0, 0.0);
    assert!((metrics.total_return() - 10.0).abs() < 1e-9);
    assert_eq!(Metrics::new(vec![], 10000.0, 0.0).total_return(), 0.0);
}

#[cfg(test)]
#[test]
fn sharpe_ratio() {
    let metrics = Metrics::new(vec![10000.0, 10500.0, 10300.0, 10700.0], 10000.0, 0.0);
    let sharpe = metrics.sharpe_ratio(0.0);
    assert!(sharpe > 0.0 && sharpe < 1.0);
}

#[cfg(test)]
#[test]
fn sharpe_ratio_no_ticks() {
    let metrics = Metrics::new(vec![], 10000.0, 0.0);
    assert!(metrics.sharpe_ratio(0.0).is_nan());
}

#[cfg(test)]
#[test]
fn from_simulation() {
    use crate::strategy::{MovingAverageCrossoverTrader, testing::candles};

    let mut closes = vec![90.0; 10];
    closes.extend([110.0; 10]);
    let simulator = Simulator::new(Series::new("BTCUSDT", candles(&closes)).unwrap()).unwrap();
    let mut trader = MovingAverageCrossoverTrader::new(Portfolio::default());
    let result = simulator.run(Window::Full, &mut trader).unwrap();

    let metrics = Metrics::from(&result);
    assert_eq!(metrics.symbol(), "BTCUSDT");
    assert_eq!((metrics.buys(), metrics.sells()), (1, 0));
    assert!((metrics.fees() - 5.0).abs() < 1e-9);
    assert!((metrics.total_return() + 0.05).abs() < 1e-9);
    assert!((metrics.max_drawdown() - 0.05).abs() < 1e-9);

    let report = metrics.to_string();
    assert!(report.starts_with("=== Simulation Metrics ==="));
    assert!(report.contains("Buys / Sells: 1 / 0"));
}
