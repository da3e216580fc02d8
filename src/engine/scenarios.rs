use rand::{SeedableRng, rngs::StdRng};

use super::*;
use crate::strategy::{MovingAverageCrossoverTrader, RandomActionTrader, testing::candles};

fn series(closes: &[f64]) -> Series {
    Series::new("BTCUSDT", candles(closes)).unwrap()
}

fn sine(len: usize) -> Vec<f64> {
    (0..len).map(|i| 100.0 + (i as f64 / 9.0).sin() * 12.0).collect()
}

/// Fails on the given tick.
struct FailingStrategy {
    inner: MovingAverageCrossoverTrader,
    seen: usize,
    fail_at: usize,
}

impl Strategy for FailingStrategy {
    fn append_tick(&mut self, candle: Candle) {
        self.seen += 1;
        self.inner.append_tick(candle);
    }

    fn decide(&mut self) -> Result<Decision> {
        if self.seen == self.fail_at {
            return Err(Error::InvalidPrice(0.0));
        }
        self.inner.decide()
    }

    fn portfolio(&self) -> &Portfolio {
        self.inner.portfolio()
    }

    fn last_close(&self) -> Option<f64> {
        self.inner.last_close()
    }
}

#[test]
fn empty_series_is_rejected() {
    let empty = Series::new("BTCUSDT", vec![]).unwrap();
    assert!(matches!(Simulator::new(empty), Err(Error::CandleDataEmpty)));
}

#[test]
fn flat_series_holds_everywhere() {
    let simulator = Simulator::new(series(&[100.0; 60])).unwrap();
    let mut trader = MovingAverageCrossoverTrader::new(Portfolio::default());
    let result = simulator.run(Window::Full, &mut trader).unwrap();

    assert_eq!(result.len(), 60);
    assert!(result.decisions().all(|d| d.is_hold()));
    assert!(result.equity().all(|e| e == 10_000.0));
    assert_eq!(result.fees_paid(), 0.0);
}

#[test]
fn jump_buys_exactly_once() {
    let mut closes = vec![90.0; 10];
    closes.extend([110.0; 10]);
    let simulator = Simulator::new(series(&closes)).unwrap();
    let mut trader = MovingAverageCrossoverTrader::new(Portfolio::default());
    let result = simulator.run(Window::Full, &mut trader).unwrap();

    let buys = result.decisions().filter(|d| d.is_buy()).count();
    assert_eq!(buys, 1);
    assert_eq!(result.steps()[10].decision, Decision::Buy(0.5));
    assert_eq!(result.steps()[9].equity, 10_000.0);

    // half the balance converted, minus the fee on it
    assert!((result.steps()[10].equity - 9_995.0).abs() < 1e-9);
    assert!((result.final_equity() - 9_995.0).abs() < 1e-9);
    assert!((result.fees_paid() - 5.0).abs() < 1e-9);
}

#[test]
fn steps_follow_series_order() {
    let simulator = Simulator::new(series(&sine(200))).unwrap();
    let mut trader = MovingAverageCrossoverTrader::new(Portfolio::default());
    let result = simulator.run(Window::Full, &mut trader).unwrap();

    assert_eq!(result.len(), simulator.series().len());
    let times = result.steps().iter().map(|s| s.open_time).collect::<Vec<_>>();
    let expected = simulator.series().candles().map(|c| c.open_time()).collect::<Vec<_>>();
    assert_eq!(times, expected);
}

#[test]
fn crossovers_alternate_starting_with_buy() {
    let simulator = Simulator::new(series(&sine(400))).unwrap();
    let mut trader = MovingAverageCrossoverTrader::new(Portfolio::default());
    let result = simulator.run(Window::Full, &mut trader).unwrap();

    let trades = result.decisions().filter(|d| !d.is_hold()).collect::<Vec<_>>();
    assert!(trades.len() >= 2);
    assert!(trades[0].is_buy());
    assert!(trades.windows(2).all(|pair| pair[0].is_buy() != pair[1].is_buy()));
}

#[test]
fn moving_average_runs_are_reproducible() {
    let simulator = Simulator::new(series(&sine(300))).unwrap();

    let mut first = MovingAverageCrossoverTrader::new(Portfolio::default());
    let mut second = MovingAverageCrossoverTrader::new(Portfolio::default());
    let a = simulator.run(Window::Full, &mut first).unwrap();
    let b = simulator.run(Window::Full, &mut second).unwrap();
    assert_eq!(a, b);
}

#[test]
fn seeded_random_runs_are_reproducible() {
    let simulator = Simulator::new(series(&sine(300))).unwrap();

    let run = || {
        let mut trader = RandomActionTrader::with_rng(Portfolio::default(), StdRng::seed_from_u64(11));
        simulator
            .run_with_rng(Window::Random(120), &mut trader, &mut StdRng::seed_from_u64(3))
            .unwrap()
    };
    let (a, b) = (run(), run());
    assert_eq!(a, b);
    assert_eq!(a.len(), 120);
}

#[test]
fn random_window_is_contiguous_slice() {
    let closes = (0..100).map(|i| i as f64 + 1.0).collect::<Vec<_>>();
    let simulator = Simulator::new(series(&closes)).unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..20 {
        let mut trader = MovingAverageCrossoverTrader::new(Portfolio::default());
        let result = simulator.run_with_rng(Window::Random(30), &mut trader, &mut rng).unwrap();
        assert_eq!(result.len(), 30);

        let window = result.window().column(KlineField::Close);
        assert!(window.windows(2).all(|pair| pair[1] - pair[0] == 1.0));
        assert!(window[0] >= 1.0 && window[29] <= 100.0);
    }
}

#[test]
fn window_bounds_are_checked() {
    let simulator = Simulator::new(series(&[1.0; 10])).unwrap();
    let mut trader = MovingAverageCrossoverTrader::new(Portfolio::default());
    assert!(matches!(
        simulator.run(Window::Random(11), &mut trader),
        Err(Error::WindowTooLarge(11, 10))
    ));
    assert!(matches!(
        simulator.run(Window::Random(0), &mut trader),
        Err(Error::InvalidWindow(_))
    ));

    let result = simulator.run(Window::Random(10), &mut trader).unwrap();
    assert_eq!(result.len(), 10);
}

#[test]
fn single_tick_window_decides_without_error() {
    let simulator = Simulator::new(series(&[42.0])).unwrap();
    let mut trader = MovingAverageCrossoverTrader::new(Portfolio::default());
    let result = simulator.run(Window::Full, &mut trader).unwrap();
    assert_eq!(result.decisions().collect::<Vec<_>>(), vec![Decision::Hold]);
}

#[test]
fn failed_run_leaves_series_untouched() {
    let simulator = Simulator::new(series(&sine(80))).unwrap();
    let before = simulator.series().clone();

    let mut failing = FailingStrategy {
        inner: MovingAverageCrossoverTrader::new(Portfolio::default()),
        seen: 0,
        fail_at: 40,
    };
    assert!(matches!(
        simulator.run(Window::Full, &mut failing),
        Err(Error::InvalidPrice(_))
    ));
    assert_eq!(simulator.series(), &before);

    let mut trader = MovingAverageCrossoverTrader::new(Portfolio::default());
    let result = simulator.run(Window::Full, &mut trader).unwrap();
    assert_eq!(result.len(), 80);
    assert_eq!(result.initial_equity(), 10_000.0);
}
