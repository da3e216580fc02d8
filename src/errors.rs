/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the library.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request could not reach the exchange (timeout, connection, TLS).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The exchange answered with a non-success status.
    #[error("Exchange error ({status}): {message}")]
    Exchange {
        /// HTTP status code.
        status: u16,
        /// Raw body returned by the exchange.
        message: String,
    },

    /// The payload does not match the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Only the one minute interval is fetched.
    #[error("Unsupported interval: {0} (only \"1m\" is supported)")]
    UnsupportedInterval(String),

    /// A kline request asked for zero rows or more than the exchange returns at once.
    #[error("Invalid limit: {0} (expected 1..=1000)")]
    InvalidLimit(u16),

    /// The requested time range is empty or reversed.
    #[error("Invalid time range: start {0} is not before end {1}")]
    InvalidRange(i64, i64),

    /// The rate limiter was closed while a caller was waiting for a permit.
    #[error("Rate limiter is shut down")]
    Shutdown,

    /// A strategy was asked to decide before any tick was appended.
    #[error("Insufficient data: at least one tick is required")]
    InsufficientData,

    /// The candle data provided is empty. Simulating requires at least one candle.
    #[error("Candle data is empty: simulating requires at least one candle")]
    CandleDataEmpty,

    /// Candles are not strictly increasing by open time.
    #[error("Series is not strictly increasing at index {0}")]
    UnorderedSeries(usize),

    /// No persisted series exists for the symbol.
    #[error("No series stored for {0}")]
    SeriesNotFound(String),

    /// A required candle field was not set on the builder.
    #[error("Missing candle field: {0}")]
    MissingField(&'static str),

    /// The initial balance is not positive.
    #[error("Balance must be positive (got: {0})")]
    NegZeroBalance(f64),

    /// Fee rate outside `[0, 1)`.
    #[error("Invalid fee rate: {0}")]
    InvalidFee(f64),

    /// Buy/sell ratio outside `[0, 1]`.
    #[error("Invalid ratio: {0} (expected 0.0..=1.0)")]
    InvalidRatio(f64),

    /// The execution price is not a positive finite number.
    #[error("Invalid price: {0}")]
    InvalidPrice(f64),

    /// Invalid moving average windows or simulation window length.
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    /// The requested window is larger than the series.
    #[error("Window of {0} ticks exceeds the series length {1}")]
    WindowTooLarge(usize, usize),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error occurred.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
