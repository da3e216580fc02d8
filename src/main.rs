use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kline_bts::{
    config::Config,
    engine::{Portfolio, SimulationResult, Simulator, Window},
    exchange::{BinanceClient, KlineSource, Paginator},
    screener,
    store::SeriesStore,
    strategy::{MovingAverageCrossoverTrader, RandomActionTrader},
    utils::last_days,
};

/// Fetch Binance klines and replay them through trading strategies.
///
/// Settings not given on the command line come from `KLINE_BTS_*` environment variables.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Data directory (overrides KLINE_BTS_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List trading symbols quoted in the configured quote asset
    Symbols,
    /// Download recent history and store it
    Dump {
        /// Symbols to download
        symbols: Vec<String>,
        /// Download every discovered symbol
        #[arg(long, conflicts_with = "symbols")]
        all: bool,
        /// Days of history (overrides KLINE_BTS_HISTORY_DAYS)
        #[arg(long)]
        days: Option<i64>,
    },
    /// Replay a stored series through a strategy
    Backtest {
        symbol: String,
        #[arg(long, value_enum, default_value_t = StrategyKind::Ma)]
        strategy: StrategyKind,
        /// Ticks per random window (overrides KLINE_BTS_WINDOW)
        #[arg(long, conflicts_with = "full")]
        window: Option<usize>,
        /// Replay the whole series instead of a random window
        #[arg(long)]
        full: bool,
        /// Number of random windows sampled in parallel
        #[cfg(feature = "optimizer")]
        #[arg(long, default_value_t = 1, conflicts_with = "full")]
        runs: usize,
    },
    /// Flag symbols that rose sharply over the last three hours
    Screen {
        #[arg(long, default_value_t = screener::DEFAULT_THRESHOLD)]
        threshold: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyKind {
    /// 10/50 moving average crossover
    Ma,
    /// Random baseline
    Random,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Command::Symbols => {
            let client = BinanceClient::new(&config)?;
            for symbol in client.symbols().await? {
                println!("{symbol}");
            }
            client.close();
        }
        Command::Dump { symbols, all, days } => {
            let days = days.unwrap_or(config.history_days);
            dump(&config, symbols, all, days).await?;
        }
        Command::Backtest {
            symbol,
            strategy,
            window,
            full,
            #[cfg(feature = "optimizer")]
            runs,
        } => {
            let store = SeriesStore::new(&config.data_dir);
            let series = store
                .load(&symbol)
                .with_context(|| format!("no history for {symbol}, run `dump {symbol}` first"))?;
            let simulator = Simulator::new(series)?;
            let window = if full {
                Window::Full
            } else {
                Window::Random(window.unwrap_or(config.window))
            };

            #[cfg(feature = "optimizer")]
            if runs > 1 {
                let Window::Random(len) = window else {
                    bail!("--runs needs a random window");
                };
                return sample(&simulator, &config, strategy, len, runs);
            }

            let result = match strategy {
                StrategyKind::Ma => {
                    let mut trader = MovingAverageCrossoverTrader::new(portfolio(&config)?);
                    simulator.run(window, &mut trader)?
                }
                StrategyKind::Random => {
                    let mut trader = RandomActionTrader::new(portfolio(&config)?);
                    simulator.run(window, &mut trader)?
                }
            };
            report(&result);
        }
        Command::Screen { threshold } => {
            let client = BinanceClient::new(&config)?;
            let symbols = client.symbols().await?;
            let signals = screener::screen(&client, &symbols, Utc::now(), threshold).await?;
            if signals.is_empty() {
                println!("No tenbagger detected among {} symbols.", symbols.len());
            }
            for (idx, signal) in signals.iter().enumerate() {
                println!("{idx} - {signal}");
            }
            client.close();
        }
    }

    Ok(())
}

async fn dump(config: &Config, mut symbols: Vec<String>, all: bool, days: i64) -> Result<()> {
    if days <= 0 {
        bail!("days must be positive (got {days})");
    }
    let client = BinanceClient::new(config)?;
    if all {
        symbols = client.symbols().await?;
    }
    if symbols.is_empty() {
        bail!("no symbol given, pass symbols or --all");
    }

    let store = SeriesStore::new(&config.data_dir);
    let (start, end) = last_days(Utc::now(), days);
    store_history(Paginator::new(client), &store, &symbols, start, end).await?;

    info!(symbols = symbols.len(), days, "dump done");
    Ok(())
}

/// Paginates and saves every symbol in turn, stopping at the first failure.
///
/// The paginator is shut down on every exit path.
async fn store_history<S: KlineSource>(
    paginator: Paginator<S>,
    store: &SeriesStore,
    symbols: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<()> {
    let result = async {
        for symbol in symbols {
            let series = paginator
                .paginate(symbol, start, end)
                .await
                .with_context(|| format!("fetching {symbol}"))?;
            let path = store.save(&series)?;
            println!("{symbol}: {} candles -> {}", series.len(), path.display());
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    paginator.shutdown();
    result
}

fn portfolio(config: &Config) -> Result<Portfolio> {
    Portfolio::new(config.initial_balance, config.trading_fee).context("invalid portfolio settings")
}

#[cfg(feature = "optimizer")]
fn sample(simulator: &Simulator, config: &Config, kind: StrategyKind, window: usize, runs: usize) -> Result<()> {
    use kline_bts::sampler::Sampler;

    let sampler = Sampler::new(simulator, window, runs);
    let fresh = || Portfolio::new(config.initial_balance, config.trading_fee);
    let results = match kind {
        StrategyKind::Ma => sampler.run(|| fresh().map(MovingAverageCrossoverTrader::new))?,
        StrategyKind::Random => sampler.run(|| fresh().map(RandomActionTrader::new))?,
    };
    for result in &results {
        report(result);
    }
    Ok(())
}

fn report(result: &SimulationResult) {
    #[cfg(feature = "metrics")]
    println!("{}\n", kline_bts::metrics::Metrics::from(result));

    #[cfg(not(feature = "metrics"))]
    println!(
        "{}: {} ticks, equity {:.2} -> {:.2}, fees {:.2}",
        result.symbol(),
        result.len(),
        result.initial_equity(),
        result.final_equity(),
        result.fees_paid()
    );
}
