//! # kline-bts: Kline fetching and strategy replay
//!
//! **kline-bts** downloads one minute candlestick (OHLCV) history from the Binance spot API under a
//! shared rate budget, stitches it into continuous series and replays them tick by tick through
//! trading strategies to follow a simulated portfolio.
//!
//! ## Core Components
//! | Component        | Description                                                                         |
//! |------------------|-------------------------------------------------------------------------------------|
//! | **`RateLimiter`** | Bounded permit pool; a released permit comes back only after a spacing delay.     |
//! | **`BinanceClient`** | One rate-limited request per call: klines of a range, trading symbols.          |
//! | **`Paginator`**  | Splits long ranges into 1000 minute sub-windows fetched concurrently, merged in order. |
//! | **`Series`**     | Immutable, strictly time-ordered candles of one symbol.                            |
//! | **`Portfolio`**  | Quote balance, base assets and a flat fee.                                         |
//! | **`Strategy`**   | Tick-by-tick decisions: `RandomActionTrader`, `MovingAverageCrossoverTrader`.     |
//! | **`Simulator`**  | Replays a full or random window and records every decision and the equity.        |
//! | **`SeriesStore`** | One JSON file per symbol under a data directory.                                 |
//!
//! ## Features
//! | Feature       | Description                                                                            |
//! |---------------|----------------------------------------------------------------------------------------|
//! | **`metrics`** | Total return, max drawdown, Sharpe ratio over a run *(default)*.                      |
//! | **`optimizer`** | Parallel random-window sampling with [`rayon`](https://crates.io/crates/rayon).     |
//!
//! ## Fetching a range
//! ```no_run
//! use chrono::{Duration, Utc};
//! use kline_bts::prelude::*;
//!
//! # async fn run() -> Result<()> {
//! let client = BinanceClient::new(&Config::from_env())?;
//! let paginator = Paginator::new(client);
//!
//! let end = Utc::now();
//! let series = paginator.paginate("BTCUSDT", end - Duration::days(3), end).await?;
//! println!("{} candles", series.len());
//!
//! paginator.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Replaying a series
//! ```rust
//! use chrono::{DateTime, Duration};
//! use kline_bts::prelude::*;
//!
//! let start = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
//! let candles = (0..120)
//!     .map(|i| {
//!         let close = 100.0 + (i as f64 / 8.0).sin() * 5.0;
//!         let open_time = start + Duration::minutes(i);
//!         CandleBuilder::builder()
//!             .open(close)
//!             .high(close)
//!             .low(close)
//!             .close(close)
//!             .open_time(open_time)
//!             .close_time(open_time + Duration::milliseconds(59_999))
//!             .build()
//!             .unwrap()
//!     })
//!     .collect();
//!
//! let simulator = Simulator::new(Series::new("BTCUSDT", candles).unwrap()).unwrap();
//! let mut trader = MovingAverageCrossoverTrader::new(Portfolio::default());
//! let result = simulator.run(Window::Full, &mut trader).unwrap();
//! assert_eq!(result.len(), 120);
//!
//! #[cfg(feature = "metrics")]
//! println!("{}", Metrics::from(&result));
//! ```
//!
//! ## Error Handling
//! Every fallible call returns [`errors::Result`]. Network failures, malformed payloads and
//! exchange errors abort the request that hit them; a pagination fails as a whole. Nothing is
//! retried automatically.

#![warn(missing_docs)]

/// Runtime configuration from environment variables.
pub mod config;

/// Core simulation components: candles, series, portfolio, simulator.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Exchange access: rate limiter, client, paginator.
pub mod exchange;

/// Tenbagger screening over recent candles.
pub mod screener;

/// Series persistence.
pub mod store;

/// Trading strategies.
pub mod strategy;

/// Utility functions and helpers.
pub mod utils;

/// Performance metrics: return, drawdown, Sharpe ratio.
#[cfg(feature = "metrics")]
pub mod metrics;

/// Parallel random-window sampling.
#[cfg(feature = "optimizer")]
pub mod sampler;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::config::*;
    pub use crate::engine::*;
    pub use crate::errors::*;
    pub use crate::exchange::*;
    pub use crate::store::*;
    pub use crate::strategy::*;

    #[cfg(feature = "metrics")]
    pub use crate::metrics::*;

    #[cfg(feature = "optimizer")]
    pub use crate::sampler::*;
}
