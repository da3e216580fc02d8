use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, warn};

use super::{KlineRequest, KlineSource, SubWindow};
use crate::{engine::Series, errors::Result};

/// Fetches arbitrary time ranges as a single [`Series`].
///
/// The range is split into [`SubWindow`]s, every sub-window fetch is created up front and all of
/// them are driven concurrently; the source's rate limiter is the only throttle. Results are
/// merged by sub-window position, so completion order never affects the output.
#[derive(Debug)]
pub struct Paginator<S> {
    source: S,
}

impl<S: KlineSource> Paginator<S> {
    /// Creates a paginator over `source`.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Returns the underlying kline source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches every one minute candle of `symbol` in `[start, end)`.
    ///
    /// Fails as a whole if any sub-window fails, with the error of the earliest failing window.
    /// Other fetches still run to completion; their results are dropped.
    pub async fn paginate(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Series> {
        let windows = SubWindow::split(start, end)?;
        info!(symbol, start = %start, end = %end, windows = windows.len(), "paginating klines");

        let fetches = windows.into_iter().enumerate().map(|(position, window)| {
            let request = KlineRequest::for_window(symbol, window);
            async move {
                let result = self.source.fetch_klines(request).await;
                if let Err(e) = &result {
                    warn!(symbol, position, error = %e, "sub-window fetch failed");
                }
                result
            }
        });
        let batches = join_all(fetches).await;

        let mut candles = Vec::new();
        for batch in batches {
            candles.extend(batch?);
        }
        info!(symbol, rows = candles.len(), "pagination done");
        Series::new(symbol, candles)
    }

    /// Releases the source's network resources and hands it back.
    pub fn shutdown(self) -> S {
        self.source.shutdown();
        self.source
    }
}
