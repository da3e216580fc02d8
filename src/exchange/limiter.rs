use std::{future::Future, sync::Arc, time::Duration};

use tokio::{
    runtime::Handle,
    sync::{OwnedSemaphorePermit, Semaphore},
};

use crate::errors::{Error, Result};

/// Default number of concurrent requests.
pub const DEFAULT_PERMITS: usize = 50;
/// Default time a slot stays taken after its request is done.
pub const DEFAULT_SPACING: Duration = Duration::from_secs(1);

/// Bounded pool of request permits shared by every caller.
///
/// Callers beyond the pool size wait for a permit; they never fail because the pool is busy.
/// A released permit goes back to the pool only after `spacing`, which keeps the overall call
/// rate under `permits / spacing` per second. There is no rolling-window accounting.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    spacing: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_PERMITS, DEFAULT_SPACING)
    }
}

impl RateLimiter {
    /// Creates a pool of `permits` slots (at least one) released `spacing` after use.
    pub fn new(permits: usize, spacing: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(permits.max(1))),
            spacing,
        }
    }

    /// Returns the delay before a released slot is reusable.
    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Number of permits free right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a permit. Fails only when the limiter was closed.
    pub async fn acquire(&self) -> Result<RatePermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::Shutdown)?;

        Ok(RatePermit {
            permit: Some(permit),
            spacing: self.spacing,
        })
    }

    /// Runs `fut` while holding a permit.
    pub async fn throttle<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self.acquire().await?;
        fut.await
    }

    /// Wakes every waiter with [`Error::Shutdown`] and rejects later acquisitions.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Returns `true` once [`RateLimiter::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

/// A held slot of a [`RateLimiter`].
///
/// Dropping it releases the slot after the limiter's spacing, whichever way the holder exits.
#[derive(Debug)]
pub struct RatePermit {
    permit: Option<OwnedSemaphorePermit>,
    spacing: Duration,
}

impl Drop for RatePermit {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        if self.spacing.is_zero() {
            return;
        }
        // outside a runtime the slot is returned right away
        if let Ok(handle) = Handle::try_current() {
            let spacing = self.spacing;
            handle.spawn(async move {
                tokio::time::sleep(spacing).await;
                drop(permit);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::join_all;
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn bounds_in_flight_callers() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let done = AtomicUsize::new(0);
        let (limiter, in_flight, peak, done_ref) = (&limiter, &in_flight, &peak, &done);

        let calls = (0..5).map(move |_| async move {
            let _permit = limiter.acquire().await.unwrap();
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            done_ref.fetch_add(1, Ordering::SeqCst);
        });
        join_all(calls).await;

        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn released_slot_waits_for_spacing() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        let begin = Instant::now();

        drop(limiter.acquire().await.unwrap());
        assert_eq!(limiter.available(), 0);

        let _second = limiter.acquire().await.unwrap();
        assert!(begin.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn caller_resumes_before_slot_returns() {
        let spacing = Duration::from_secs(1);
        let limiter = RateLimiter::new(1, spacing);
        let begin = Instant::now();

        let value = limiter.throttle(async { Ok(3) }).await.unwrap();
        assert_eq!(value, 3);
        assert_eq!(begin.elapsed(), Duration::ZERO);
        assert_eq!(limiter.available(), 0);

        tokio::time::sleep(spacing - Duration::from_millis(1)).await;
        assert_eq!(limiter.available(), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_call_still_releases() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        let result: Result<()> = limiter.throttle(async { Err(Error::InsufficientData) }).await;
        assert!(result.is_err());

        let value = limiter.throttle(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_spacing_releases_immediately() {
        let limiter = RateLimiter::new(1, Duration::ZERO);
        drop(limiter.acquire().await.unwrap());
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn close_rejects_acquire() {
        let limiter = RateLimiter::new(1, Duration::ZERO);
        let held = limiter.acquire().await.unwrap();
        limiter.close();
        assert!(limiter.is_closed());
        assert!(matches!(limiter.acquire().await, Err(Error::Shutdown)));
        drop(held);
    }
}
