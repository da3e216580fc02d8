use std::fmt;

use serde::{Deserialize, Serialize};

/// What a strategy did on one tick, with the ratio of balance (buy) or assets (sell) acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    /// Spend this ratio of the balance on assets.
    Buy(f64),
    /// Sell this ratio of the held assets.
    Sell(f64),
    /// Do nothing.
    Hold,
}

impl Decision {
    /// Ratio acted upon, `0.0` for [`Decision::Hold`].
    pub fn ratio(&self) -> f64 {
        match self {
            Self::Buy(ratio) | Self::Sell(ratio) => *ratio,
            Self::Hold => 0.0,
        }
    }

    /// Returns `true` for a buy.
    pub fn is_buy(&self) -> bool {
        matches!(self, Self::Buy(_))
    }

    /// Returns `true` for a sell.
    pub fn is_sell(&self) -> bool {
        matches!(self, Self::Sell(_))
    }

    /// Returns `true` for a hold.
    pub fn is_hold(&self) -> bool {
        matches!(self, Self::Hold)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy(ratio) => write!(f, "BUY({ratio:.4})"),
            Self::Sell(ratio) => write!(f, "SELL({ratio:.4})"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

#[cfg(test)]
#[test]
fn hold_has_zero_ratio() {
    assert_eq!(Decision::Hold.ratio(), 0.0);
    assert_eq!(Decision::Buy(0.5).ratio(), 0.5);
    assert_eq!(Decision::Sell(0.2).ratio(), 0.2);
    assert_eq!(Decision::Sell(0.2).to_string(), "SELL(0.2000)");
}
