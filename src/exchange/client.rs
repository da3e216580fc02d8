use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info};

use super::{Interval, KlineRequest, KlineSource, RateLimiter};
use crate::{
    config::Config,
    engine::{Candle, CandleBuilder, Series},
    errors::{Error, Result},
};

/// Number of values in one kline row; the last one is unused.
const ROW_WIDTH: usize = 12;

/// Exchange information, reduced to the fields symbol discovery needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    /// Every listed symbol, in exchange order.
    pub symbols: Vec<SymbolInfo>,
}

/// One listed trading pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    /// Pair name, for example `BTCUSDT`.
    pub symbol: String,
    /// Trading status.
    pub status: SymbolStatus,
    /// Asset the pair is priced in.
    pub quote_asset: String,
}

/// Trading status of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolStatus {
    /// Open for trading.
    Trading,
    /// Trading halted.
    Break,
    /// Any other status.
    #[serde(other)]
    Other,
}

/// Keeps the symbols quoted in `quote_asset` that are currently trading, in exchange order.
pub fn filter_symbols(info: &ExchangeInfo, quote_asset: &str) -> Vec<String> {
    info.symbols
        .iter()
        .filter(|s| s.quote_asset == quote_asset && s.status == SymbolStatus::Trading)
        .map(|s| s.symbol.clone())
        .collect()
}

/// Parses a `/klines` payload: an array of 12-value rows, numbers sent either as JSON numbers
/// or as decimal strings. At most `limit` rows are kept.
pub fn parse_klines(body: &[u8], limit: usize) -> Result<Vec<Candle>> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_slice(body).map_err(|e| Error::MalformedResponse(format!("klines: {e}")))?;

    rows.iter().take(limit).enumerate().map(|(idx, row)| parse_row(idx, row)).collect()
}

fn parse_row(idx: usize, row: &[Value]) -> Result<Candle> {
    if row.len() != ROW_WIDTH {
        return Err(Error::MalformedResponse(format!(
            "row {idx} has {} fields, expected {ROW_WIDTH}",
            row.len()
        )));
    }

    let number = |field: usize| -> Result<f64> {
        let value = &row[field];
        value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .filter(|n| n.is_finite())
            .ok_or_else(|| Error::MalformedResponse(format!("row {idx} field {field} is not a number: {value}")))
    };
    let time = |field: usize| -> Result<DateTime<Utc>> {
        row[field]
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| Error::MalformedResponse(format!("row {idx} field {field} is not a timestamp")))
    };
    let trades = row[8]
        .as_u64()
        .ok_or_else(|| Error::MalformedResponse(format!("row {idx} trade count is not an integer")))?;

    CandleBuilder::builder()
        .open_time(time(0)?)
        .open(number(1)?)
        .high(number(2)?)
        .low(number(3)?)
        .close(number(4)?)
        .volume(number(5)?)
        .close_time(time(6)?)
        .quote_volume(number(7)?)
        .trades(trades)
        .taker_buy_base_volume(number(9)?)
        .taker_buy_quote_volume(number(10)?)
        .build()
}

/// Binance spot REST client. Every request goes through the shared [`RateLimiter`].
///
/// The client owns its connection pool; [`BinanceClient::close`] shuts it down explicitly.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: Client,
    api_url: String,
    quote_asset: String,
    limiter: RateLimiter,
}

impl BinanceClient {
    /// Creates a client with its own connection pool and rate limiter.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("kline-bts/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            quote_asset: config.quote_asset.clone(),
            limiter: RateLimiter::new(config.max_inflight, config.spacing),
        })
    }

    /// Returns the limiter every request goes through.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Fetches at most `limit` one minute candles covering `[start, end]`.
    ///
    /// The interval and the limit are checked before anything is sent.
    pub async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u16,
    ) -> Result<Series> {
        let request = KlineRequest {
            symbol: symbol.to_string(),
            interval: interval.parse::<Interval>()?,
            start,
            end,
            limit,
        };
        let candles = self.fetch(&request).await?;
        Series::new(symbol, candles)
    }

    /// Lists trading symbols quoted in the configured quote asset.
    pub async fn symbols(&self) -> Result<Vec<String>> {
        let url = format!("{}/exchangeInfo", self.api_url);
        let body = self.get(&url, &[]).await?;
        let info: ExchangeInfo = decode(&body)?;

        let symbols = filter_symbols(&info, &self.quote_asset);
        info!(total = info.symbols.len(), kept = symbols.len(), quote = %self.quote_asset, "symbols discovered");
        Ok(symbols)
    }

    /// Closes the rate limiter; pending and later requests fail with [`Error::Shutdown`].
    pub fn close(self) {
        self.limiter.close();
    }

    async fn fetch(&self, request: &KlineRequest) -> Result<Vec<Candle>> {
        request.validate()?;

        let url = format!("{}/klines", self.api_url);
        let query = [
            ("symbol", request.symbol.clone()),
            ("interval", request.interval.as_str().to_string()),
            ("limit", request.limit.to_string()),
            ("startTime", request.start.timestamp_millis().to_string()),
            ("endTime", request.end.timestamp_millis().to_string()),
        ];
        let body = self.get(&url, &query).await?;
        let candles = parse_klines(&body, usize::from(request.limit))?;

        debug!(
            symbol = %request.symbol,
            start = %request.start,
            end = %request.end,
            rows = candles.len(),
            "klines fetched"
        );
        Ok(candles)
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>> {
        let _permit = self.limiter.acquire().await?;

        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(Error::Exchange {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }
}

impl KlineSource for BinanceClient {
    async fn fetch_klines(&self, request: KlineRequest) -> Result<Vec<Candle>> {
        self.fetch(&request).await
    }

    fn shutdown(&self) {
        self.limiter.close();
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    use super::*;

    fn client(api_url: String) -> BinanceClient {
        let config = Config {
            api_url,
            spacing: Duration::ZERO,
            ..Config::default()
        };
        BinanceClient::new(&config).unwrap()
    }

    /// Answers one request with `status` and `body`; the task yields the request line.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request: Vec<u8> = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            String::from_utf8_lossy(&request).lines().next().unwrap_or_default().to_string()
        });

        (format!("http://{addr}/"), server)
    }

    const KLINES: &str = r#"[
        [1499040000000, "0.01634790", "0.80000000", "0.01575800", "0.01577100", "148976.11427815",
         1499040059999, "2434.19055334", 308, "1756.87402397", "28.46694368", "0"],
        [1499040060000, "0.01577100", "0.01600000", "0.01570000", "0.01590000", "100.0",
         1499040119999, "1.59", 12, "50.0", "0.795", "0"]
    ]"#;

    #[test]
    fn parses_kline_rows() {
        let candles = parse_klines(KLINES.as_bytes(), 1000).unwrap();
        assert_eq!(candles.len(), 2);

        let first = &candles[0];
        assert_eq!(first.open_time().timestamp_millis(), 1499040000000);
        assert_eq!(first.open(), 0.0163479);
        assert_eq!(first.high(), 0.8);
        assert_eq!(first.close(), 0.015771);
        assert_eq!(first.close_time().timestamp_millis(), 1499040059999);
        assert_eq!(first.trades(), 308);
        assert_eq!(first.taker_buy_quote_volume(), 28.46694368);
    }

    #[test]
    fn keeps_at_most_limit_rows() {
        let candles = parse_klines(KLINES.as_bytes(), 1).unwrap();
        assert_eq!(candles.len(), 1);
    }

    #[test]
    fn accepts_numeric_prices() {
        let body = r#"[[0, 1.5, 2, 1, 1.75, 10, 59999, 17.5, 3, 5, 8.75, 0]]"#;
        let candles = parse_klines(body.as_bytes(), 1000).unwrap();
        assert_eq!(candles[0].close(), 1.75);
    }

    #[test]
    fn rejects_wrong_row_width() {
        let body = r#"[[1499040000000, "1", "1", "1", "1"]]"#;
        assert!(matches!(parse_klines(body.as_bytes(), 1000), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn rejects_non_numeric_fields() {
        let body = r#"[[1499040000000, "abc", "1", "1", "1", "1", 1499040059999, "1", 1, "1", "1", "0"]]"#;
        assert!(matches!(parse_klines(body.as_bytes(), 1000), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn rejects_error_objects() {
        let body = r#"{"code": -1121, "msg": "Invalid symbol."}"#;
        assert!(matches!(parse_klines(body.as_bytes(), 1000), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn filters_trading_usdt_symbols() {
        let body = r#"{
            "timezone": "UTC",
            "symbols": [
                {"symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT"},
                {"symbol": "ETHBTC", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "BTC"},
                {"symbol": "LUNAUSDT", "status": "BREAK", "baseAsset": "LUNA", "quoteAsset": "USDT"},
                {"symbol": "NEWUSDT", "status": "PRE_TRADING", "baseAsset": "NEW", "quoteAsset": "USDT"},
                {"symbol": "ETHUSDT", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "USDT"}
            ]
        }"#;
        let info: ExchangeInfo = decode(body.as_bytes()).unwrap();
        assert_eq!(info.symbols[3].status, SymbolStatus::Other);
        assert_eq!(filter_symbols(&info, "USDT"), vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[tokio::test]
    async fn sends_kline_query_in_milliseconds() {
        let (url, server) = serve_once("200 OK", KLINES).await;
        let client = client(url);
        let start = DateTime::from_timestamp_millis(1499040000000).unwrap();
        let end = DateTime::from_timestamp_millis(1499040119999).unwrap();

        let series = client.klines("BTCUSDT", "1m", start, end, 5).await.unwrap();
        assert_eq!(series.symbol(), "BTCUSDT");
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().close(), 0.0159);

        assert_eq!(
            server.await.unwrap(),
            "GET /klines?symbol=BTCUSDT&interval=1m&limit=5&startTime=1499040000000&endTime=1499040119999 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn error_status_maps_to_exchange_error() {
        let (url, server) = serve_once("429 Too Many Requests", r#"{"code":-1003,"msg":"Too many requests."}"#).await;
        let client = client(url);
        let now = Utc::now();

        let result = client.klines("BTCUSDT", "1m", now, now, 10).await;
        match result {
            Err(Error::Exchange { status, message }) => {
                assert_eq!(status, 429);
                assert!(message.contains("-1003"));
            }
            other => panic!("expected an exchange error, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_maps_to_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client(format!("http://{addr}"));
        let now = Utc::now();
        let result = client.klines("BTCUSDT", "1m", now, now, 10).await;
        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(client.limiter().available(), 50);
    }

    #[tokio::test]
    async fn discovers_symbols_from_exchange_info() {
        let body = r#"{"symbols": [
            {"symbol": "BTCUSDT", "status": "TRADING", "quoteAsset": "USDT"},
            {"symbol": "LUNAUSDT", "status": "BREAK", "quoteAsset": "USDT"},
            {"symbol": "ETHBTC", "status": "TRADING", "quoteAsset": "BTC"}
        ]}"#;
        let (url, server) = serve_once("200 OK", body).await;
        let client = client(url);

        assert_eq!(client.symbols().await.unwrap(), vec!["BTCUSDT"]);
        assert!(server.await.unwrap().starts_with("GET /exchangeInfo "));
    }

    #[tokio::test]
    async fn unsupported_interval_fails_before_sending() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = client(format!("http://{}", listener.local_addr().unwrap()));
        let now = Utc::now();

        let result = client.klines("BTCUSDT", "5m", now, now, 10).await;
        assert!(matches!(result, Err(Error::UnsupportedInterval(_))));
        assert_eq!(client.limiter().available(), 50);

        let accepted = tokio::time::timeout(Duration::from_millis(50), listener.accept()).await;
        assert!(accepted.is_err());
    }

    #[tokio::test]
    async fn invalid_limit_fails_before_sending() {
        let client = BinanceClient::new(&Config::default()).unwrap();
        let now = Utc::now();
        let result = client.klines("BTCUSDT", "1m", now, now, 1001).await;
        assert!(matches!(result, Err(Error::InvalidLimit(1001))));
    }

    #[tokio::test]
    async fn closed_client_rejects_requests() {
        let client = BinanceClient::new(&Config::default()).unwrap();
        let handle = client.clone();
        client.close();
        let now = Utc::now();
        let result = handle.klines("BTCUSDT", "1m", now, now, 10).await;
        assert!(matches!(result, Err(Error::Shutdown)));
    }
}
