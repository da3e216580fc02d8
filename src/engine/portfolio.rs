use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Default starting balance in quote units.
pub const DEFAULT_BALANCE: f64 = 10_000.0;
/// Default trading fee (0.1%).
pub const DEFAULT_FEE: f64 = 0.001;

/// Quote balance and base assets of a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    // Balance the portfolio was created with
    initial_balance: f64,
    // Quote currency available
    balance: f64,
    // Base currency held
    assets: f64,
    // Flat rate taken on every trade
    fee: f64,
    // Cumulative value lost to fees, in quote units
    fees: f64,
}

impl Default for Portfolio {
    fn default() -> Self {
        Self {
            initial_balance: DEFAULT_BALANCE,
            balance: DEFAULT_BALANCE,
            assets: 0.0,
            fee: DEFAULT_FEE,
            fees: 0.0,
        }
    }
}

impl Portfolio {
    /// Creates a portfolio holding only quote currency.
    /// Non-positive balances and fees outside `[0, 1)` are rejected.
    pub fn new(balance: f64, fee: f64) -> Result<Self> {
        if balance <= 0.0 || !balance.is_finite() {
            return Err(Error::NegZeroBalance(balance));
        }
        if !(0.0..1.0).contains(&fee) {
            return Err(Error::InvalidFee(fee));
        }

        Ok(Self {
            initial_balance: balance,
            balance,
            assets: 0.0,
            fee,
            fees: 0.0,
        })
    }

    /// Returns the balance the portfolio was created with.
    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Returns the quote balance.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Returns the base assets held.
    pub fn assets(&self) -> f64 {
        self.assets
    }

    /// Returns the fee rate.
    pub fn fee(&self) -> f64 {
        self.fee
    }

    /// Returns the value lost to fees so far.
    pub fn fees_paid(&self) -> f64 {
        self.fees
    }

    /// Balance plus the market value of held assets at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.balance + self.assets * price
    }

    /// Spends `balance * ratio` at `price`. The fee is taken out of the assets received.
    ///
    /// Returns the amount of assets bought.
    pub fn buy(&mut self, ratio: f64, price: f64) -> Result<f64> {
        check_ratio(ratio)?;
        check_price(price)?;

        let spend = self.balance * ratio;
        let bought = spend * (1.0 - self.fee) / price;

        self.assets += bought;
        self.balance -= spend;
        self.fees += spend * self.fee;
        Ok(bought)
    }

    /// Sells `assets * ratio` at `price`. The fee is taken out of the proceeds.
    ///
    /// Returns the proceeds credited to the balance.
    pub fn sell(&mut self, ratio: f64, price: f64) -> Result<f64> {
        check_ratio(ratio)?;
        check_price(price)?;

        let sold = self.assets * ratio;
        let gross = sold * price;
        let proceeds = gross * (1.0 - self.fee);

        self.assets -= sold;
        self.balance += proceeds;
        self.fees += gross * self.fee;
        Ok(proceeds)
    }
}

fn check_ratio(ratio: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&ratio) {
        return Err(Error::InvalidRatio(ratio));
    }
    Ok(())
}

fn check_price(price: f64) -> Result<()> {
    if price <= 0.0 || !price.is_finite() {
        return Err(Error::InvalidPrice(price));
    }
    Ok(())
}

#[cfg(test)]
#[test]
fn new_portfolio_valid_balance() {
    let portfolio = Portfolio::new(100.0, 0.001).unwrap();
    assert_eq!(portfolio.balance(), 100.0);
    assert_eq!(portfolio.assets(), 0.0);
    assert_eq!(portfolio.equity(50.0), 100.0);
}

#[cfg(test)]
#[test]
fn new_portfolio_invalid_balance() {
    let result = Portfolio::new(0.0, 0.001);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));

    let result = Portfolio::new(-10.0, 0.001);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));
}

#[cfg(test)]
#[test]
fn new_portfolio_invalid_fee() {
    assert!(matches!(Portfolio::new(100.0, -0.1), Err(Error::InvalidFee(_))));
    assert!(matches!(Portfolio::new(100.0, 1.0), Err(Error::InvalidFee(_))));
}

#[cfg(test)]
#[test]
fn buy_spends_balance_and_charges_fee_on_assets() {
    let mut portfolio = Portfolio::new(1000.0, 0.001).unwrap();
    let bought = portfolio.buy(0.5, 100.0).unwrap();

    assert_eq!(portfolio.balance(), 500.0);
    assert!((bought - 4.995).abs() < 1e-12);
    assert!((portfolio.assets() - 4.995).abs() < 1e-12);
    assert!((portfolio.fees_paid() - 0.5).abs() < 1e-12);
}

#[cfg(test)]
#[test]
fn sell_credits_proceeds_minus_fee() {
    let mut portfolio = Portfolio::new(1000.0, 0.0).unwrap();
    portfolio.buy(1.0, 100.0).unwrap();
    assert_eq!(portfolio.assets(), 10.0);

    let mut portfolio = Portfolio { fee: 0.01, ..portfolio };
    let proceeds = portfolio.sell(0.2, 200.0).unwrap();
    assert!((proceeds - 396.0).abs() < 1e-9);
    assert!((portfolio.assets() - 8.0).abs() < 1e-12);
    assert!((portfolio.balance() - 396.0).abs() < 1e-9);
}

#[cfg(test)]
#[test]
fn round_trip_without_fee_restores_balance() {
    let mut portfolio = Portfolio::new(1000.0, 0.0).unwrap();
    portfolio.buy(1.0, 100.0).unwrap();
    portfolio.sell(1.0, 100.0).unwrap();

    assert_eq!(portfolio.balance(), 1000.0);
    assert_eq!(portfolio.assets(), 0.0);
}

#[cfg(test)]
#[test]
fn round_trip_with_fee_loses_value() {
    let mut portfolio = Portfolio::new(1000.0, 0.001).unwrap();
    portfolio.buy(1.0, 100.0).unwrap();
    portfolio.sell(1.0, 100.0).unwrap();

    assert!(portfolio.balance() < 1000.0);
    assert!((portfolio.balance() + portfolio.fees_paid() - 1000.0).abs() < 1e-9);
}

#[cfg(test)]
#[test]
fn invalid_ratio_and_price() {
    let mut portfolio = Portfolio::new(1000.0, 0.001).unwrap();
    assert!(matches!(portfolio.buy(1.5, 100.0), Err(Error::InvalidRatio(_))));
    assert!(matches!(portfolio.sell(-0.1, 100.0), Err(Error::InvalidRatio(_))));
    assert!(matches!(portfolio.buy(0.5, 0.0), Err(Error::InvalidPrice(_))));
    assert!(matches!(portfolio.buy(0.5, f64::NAN), Err(Error::InvalidPrice(_))));
    assert_eq!(portfolio.balance(), 1000.0);
}

#[cfg(test)]
#[test]
fn initial_balance_is_kept_after_trades() {
    let mut portfolio = Portfolio::new(100.0, 0.001).unwrap();
    portfolio.buy(0.5, 10.0).unwrap();
    portfolio.sell(1.0, 12.0).unwrap();

    assert_eq!(portfolio.initial_balance(), 100.0);
    assert_ne!(portfolio.balance(), 100.0);
    assert!(portfolio.fees_paid() > 0.0);
}
