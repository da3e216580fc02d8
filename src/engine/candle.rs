use std::{ops::Range, sync::Arc};

use chrono::{DateTime, Utc, serde::ts_milliseconds};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Kline columns, in the order the exchange sends them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KlineField {
    /// Kline open time.
    OpenTime,
    /// Open price.
    Open,
    /// Highest price.
    High,
    /// Lowest price.
    Low,
    /// Close price.
    Close,
    /// Base asset volume.
    Volume,
    /// Kline close time.
    CloseTime,
    /// Quote asset volume.
    QuoteVolume,
    /// Number of trades.
    Trades,
    /// Taker buy base asset volume.
    TakerBuyBaseVolume,
    /// Taker buy quote asset volume.
    TakerBuyQuoteVolume,
}

impl KlineField {
    /// Every field, in wire order.
    pub const ALL: [KlineField; 11] = [
        Self::OpenTime,
        Self::Open,
        Self::High,
        Self::Low,
        Self::Close,
        Self::Volume,
        Self::CloseTime,
        Self::QuoteVolume,
        Self::Trades,
        Self::TakerBuyBaseVolume,
        Self::TakerBuyQuoteVolume,
    ];
}

/// One 1-minute OHLCV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "ts_milliseconds")]
    open_time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(with = "ts_milliseconds")]
    close_time: DateTime<Utc>,
    quote_volume: f64,
    trades: u64,
    taker_buy_base_volume: f64,
    taker_buy_quote_volume: f64,
}

impl Candle {
    /// Returns the open time.
    pub fn open_time(&self) -> DateTime<Utc> {
        self.open_time
    }

    /// Returns the open price.
    pub fn open(&self) -> f64 {
        self.open
    }

    /// Returns the highest price.
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Returns the lowest price.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Returns the close price.
    pub fn close(&self) -> f64 {
        self.close
    }

    /// Returns the base asset volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Returns the close time.
    pub fn close_time(&self) -> DateTime<Utc> {
        self.close_time
    }

    /// Returns the quote asset volume.
    pub fn quote_volume(&self) -> f64 {
        self.quote_volume
    }

    /// Returns the number of trades.
    pub fn trades(&self) -> u64 {
        self.trades
    }

    /// Returns the taker buy base asset volume.
    pub fn taker_buy_base_volume(&self) -> f64 {
        self.taker_buy_base_volume
    }

    /// Returns the taker buy quote asset volume.
    pub fn taker_buy_quote_volume(&self) -> f64 {
        self.taker_buy_quote_volume
    }

    /// Returns a field as a number. Timestamps are Unix milliseconds.
    pub fn get(&self, field: KlineField) -> f64 {
        match field {
            KlineField::OpenTime => self.open_time.timestamp_millis() as f64,
            KlineField::Open => self.open,
            KlineField::High => self.high,
            KlineField::Low => self.low,
            KlineField::Close => self.close,
            KlineField::Volume => self.volume,
            KlineField::CloseTime => self.close_time.timestamp_millis() as f64,
            KlineField::QuoteVolume => self.quote_volume,
            KlineField::Trades => self.trades as f64,
            KlineField::TakerBuyBaseVolume => self.taker_buy_base_volume,
            KlineField::TakerBuyQuoteVolume => self.taker_buy_quote_volume,
        }
    }
}

/// Builder for [`Candle`]. Prices and times are required, volumes default to zero.
#[derive(Debug, Default)]
pub struct CandleBuilder {
    open_time: Option<DateTime<Utc>>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: f64,
    close_time: Option<DateTime<Utc>>,
    quote_volume: f64,
    trades: u64,
    taker_buy_base_volume: f64,
    taker_buy_quote_volume: f64,
}

impl CandleBuilder {
    /// Returns an empty builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the open time.
    pub fn open_time(mut self, open_time: DateTime<Utc>) -> Self {
        self.open_time = Some(open_time);
        self
    }

    /// Sets the open price.
    pub fn open(mut self, open: f64) -> Self {
        self.open = Some(open);
        self
    }

    /// Sets the highest price.
    pub fn high(mut self, high: f64) -> Self {
        self.high = Some(high);
        self
    }

    /// Sets the lowest price.
    pub fn low(mut self, low: f64) -> Self {
        self.low = Some(low);
        self
    }

    /// Sets the close price.
    pub fn close(mut self, close: f64) -> Self {
        self.close = Some(close);
        self
    }

    /// Sets the base asset volume.
    pub fn volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    /// Sets the close time.
    pub fn close_time(mut self, close_time: DateTime<Utc>) -> Self {
        self.close_time = Some(close_time);
        self
    }

    /// Sets the quote asset volume.
    pub fn quote_volume(mut self, quote_volume: f64) -> Self {
        self.quote_volume = quote_volume;
        self
    }

    /// Sets the number of trades.
    pub fn trades(mut self, trades: u64) -> Self {
        self.trades = trades;
        self
    }

    /// Sets the taker buy base asset volume.
    pub fn taker_buy_base_volume(mut self, volume: f64) -> Self {
        self.taker_buy_base_volume = volume;
        self
    }

    /// Sets the taker buy quote asset volume.
    pub fn taker_buy_quote_volume(mut self, volume: f64) -> Self {
        self.taker_buy_quote_volume = volume;
        self
    }

    /// Builds the candle, failing with [`Error::MissingField`] on the first unset price or time.
    pub fn build(self) -> Result<Candle> {
        Ok(Candle {
            open_time: self.open_time.ok_or(Error::MissingField("open_time"))?,
            open: self.open.ok_or(Error::MissingField("open"))?,
            high: self.high.ok_or(Error::MissingField("high"))?,
            low: self.low.ok_or(Error::MissingField("low"))?,
            close: self.close.ok_or(Error::MissingField("close"))?,
            volume: self.volume,
            close_time: self.close_time.ok_or(Error::MissingField("close_time"))?,
            quote_volume: self.quote_volume,
            trades: self.trades,
            taker_buy_base_volume: self.taker_buy_base_volume,
            taker_buy_quote_volume: self.taker_buy_quote_volume,
        })
    }
}

/// Candles of one symbol over one time range, ordered by open time.
///
/// A series is immutable: slicing shares or copies the underlying candles, it never edits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    symbol: String,
    candles: Arc<[Candle]>,
}

impl Series {
    /// Creates a series, checking that open times strictly increase.
    pub fn new(symbol: impl Into<String>, candles: Vec<Candle>) -> Result<Self> {
        if let Some(idx) = candles
            .windows(2)
            .position(|pair| pair[0].open_time >= pair[1].open_time)
        {
            return Err(Error::UnorderedSeries(idx + 1));
        }

        Ok(Self {
            symbol: symbol.into(),
            candles: Arc::from(candles),
        })
    }

    /// Returns the symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the number of candles.
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Returns `true` if the series holds no candle.
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Returns an iterator over the candles in time order.
    pub fn candles(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    /// Returns the oldest candle.
    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    /// Returns the most recent candle.
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Columnar view of one field.
    pub fn column(&self, field: KlineField) -> Vec<f64> {
        self.candles.iter().map(|c| c.get(field)).collect()
    }

    /// Returns the contiguous sub-series covering `range`.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start >= range.end {
            return Err(Error::InvalidWindow(format!("empty range {range:?}")));
        }
        let candles = self
            .candles
            .get(range.clone())
            .ok_or(Error::WindowTooLarge(range.end, self.len()))?;

        Ok(Self {
            symbol: self.symbol.clone(),
            candles: Arc::from(candles),
        })
    }

    /// Picks a contiguous window of `len` ticks at a uniformly random offset.
    pub fn random_window<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Result<Self> {
        if len == 0 {
            return Err(Error::InvalidWindow("window length must be positive".to_string()));
        }
        if len > self.len() {
            return Err(Error::WindowTooLarge(len, self.len()));
        }
        let start = rng.random_range(0..=self.len() - len);
        self.slice(start..start + len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use rand::{SeedableRng, rngs::StdRng};

    fn candle(minute: i64, close: f64) -> Candle {
        let open_time = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap() + Duration::minutes(minute);
        CandleBuilder::builder()
            .open(close)
            .high(close + 1.0)
            .low(close - 1.0)
            .close(close)
            .volume(2.0)
            .trades(7)
            .open_time(open_time)
            .close_time(open_time + Duration::milliseconds(59_999))
            .build()
            .unwrap()
    }

    fn series(n: i64) -> Series {
        Series::new("BTCUSDT", (0..n).map(|i| candle(i, 100.0 + i as f64)).collect()).unwrap()
    }

    #[test]
    fn builder_requires_prices_and_times() {
        let result = CandleBuilder::builder().build();
        assert!(matches!(result, Err(Error::MissingField("open_time"))));

        let open_time = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let result = CandleBuilder::builder()
            .open_time(open_time)
            .close_time(open_time + Duration::milliseconds(59_999))
            .open(1.0)
            .high(1.0)
            .low(1.0)
            .build();
        assert!(matches!(result, Err(Error::MissingField("close"))));
    }

    #[test]
    fn get_follows_wire_order() {
        let c = candle(0, 100.0);
        let row = KlineField::ALL.iter().map(|f| c.get(*f)).collect::<Vec<_>>();
        assert_eq!(row[0], 1_700_000_000_000.0);
        assert_eq!(row[4], 100.0);
        assert_eq!(row[6], 1_700_000_059_999.0);
        assert_eq!(row[8], 7.0);
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let result = Series::new("BTCUSDT", vec![candle(0, 1.0), candle(1, 1.0), candle(1, 1.0)]);
        assert!(matches!(result, Err(Error::UnorderedSeries(2))));
    }

    #[test]
    fn rejects_backwards_timestamps() {
        let result = Series::new("BTCUSDT", vec![candle(3, 1.0), candle(2, 1.0)]);
        assert!(matches!(result, Err(Error::UnorderedSeries(1))));
    }

    #[test]
    fn column_is_index_aligned() {
        let s = series(5);
        assert_eq!(s.column(KlineField::Close), vec![100.0, 101.0, 102.0, 103.0, 104.0]);
        assert_eq!(s.column(KlineField::OpenTime).len(), s.len());
    }

    #[test]
    fn slice_keeps_symbol_and_order() {
        let s = series(10).slice(2..5).unwrap();
        assert_eq!(s.symbol(), "BTCUSDT");
        assert_eq!(s.column(KlineField::Close), vec![102.0, 103.0, 104.0]);
        assert!(matches!(series(3).slice(1..4), Err(Error::WindowTooLarge(4, 3))));
    }

    #[test]
    fn random_window_stays_in_bounds() {
        let s = series(20);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let w = s.random_window(5, &mut rng).unwrap();
            assert_eq!(w.len(), 5);
            let first = w.first().unwrap().close();
            assert!((100.0..=115.0).contains(&first));
        }
        assert!(matches!(s.random_window(21, &mut rng), Err(Error::WindowTooLarge(21, 20))));
        assert!(matches!(s.random_window(0, &mut rng), Err(Error::InvalidWindow(_))));
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let s = Series::new(
            "ETHUSDT",
            vec![
                CandleBuilder::builder()
                    .open(0.1 + 0.2)
                    .high(1.0 / 3.0)
                    .low(2.0f64.sqrt())
                    .close(1e-9)
                    .volume(123456.789012345)
                    .open_time(DateTime::from_timestamp_millis(1_499_040_000_000).unwrap())
                    .close_time(DateTime::from_timestamp_millis(1_499_644_799_999).unwrap())
                    .build()
                    .unwrap(),
            ],
        )
        .unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back: Series = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
