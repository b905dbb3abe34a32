use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};

use governor::clock::Clock;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use tokio::time::{sleep, Duration, Instant};

use crate::config::{RateLimitConfig, MIN_REQUESTS_PER_SECOND};
use crate::context::Context;
use crate::error::{Error, Result};

/// Clock backed by tokio's time source, so limiter waits follow a paused
/// runtime clock the same way `tokio::time::sleep` does.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        Instant::now().into_std()
    }
}

type DirectLimiter = governor::RateLimiter<
    NotKeyed,
    InMemoryState,
    TokioClock,
    governor::middleware::NoOpMiddleware<std::time::Instant>,
>;

/// Self-imposed rate limit. Azure DevOps does not advertise rate limits in its
/// response headers, so the client paces itself.
pub struct RateLimiter {
    inner: Option<DirectLimiter>,
    clock: TokioClock,
}

impl RateLimiter {
    /// Builds a limiter allowing `requests_per_second` with bursts of `burst`.
    ///
    /// A rate that is zero, negative, NaN or infinite, or so high that the
    /// interval between requests rounds to zero, yields an unlimited limiter.
    /// Rates below [`MIN_REQUESTS_PER_SECOND`] are raised to it. A zero burst
    /// is treated as one.
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        let clock = TokioClock;
        let quota = quota(requests_per_second, burst);
        Self {
            inner: quota.map(|quota| DirectLimiter::direct_with_clock(quota, &clock)),
            clock,
        }
    }

    pub fn unlimited() -> Self {
        Self {
            inner: None,
            clock: TokioClock,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst)
    }

    pub fn is_unlimited(&self) -> bool {
        self.inner.is_none()
    }

    /// Blocks until a request is allowed. Fails only when `ctx` is cancelled
    /// or its deadline would pass first; no permit is taken in that case.
    pub async fn wait(&self, ctx: &Context) -> Result<()> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let Some(limiter) = &self.inner else {
            return Ok(());
        };

        loop {
            let not_until = match limiter.check() {
                Ok(()) => return Ok(()),
                Err(not_until) => not_until,
            };
            let wait_time = not_until.wait_time_from(self.clock.now());

            if let Some(deadline) = ctx.deadline() {
                match Instant::now().checked_add(wait_time) {
                    Some(ready_at) if ready_at <= deadline => {}
                    _ => return Err(Error::DeadlineExceeded),
                }
            }

            tracing::debug!("Rate limited, waiting {:?}", wait_time);
            ctx.run(sleep(wait_time)).await?;
        }
    }
}

fn quota(requests_per_second: f64, burst: u32) -> Option<Quota> {
    if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
        return None;
    }
    let rate = requests_per_second.max(MIN_REQUESTS_PER_SECOND);
    let period = Duration::try_from_secs_f64(1.0 / rate).ok()?;
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(period).map(|quota| quota.allow_burst(burst))
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

/// Hands out one shared [`RateLimiter`] per connection identifier, so every
/// client for the same code host connection draws from the same bucket.
pub struct RateLimiterRegistry {
    defaults: RateLimitConfig,
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new(defaults: RateLimitConfig) -> Self {
        Self {
            defaults,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the limiter for `urn`, creating one from the registry defaults
    /// on first use.
    pub fn get(&self, urn: &str) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
        limiters
            .entry(urn.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::from_config(&self.defaults)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.limiters.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_refill() {
        let limiter = RateLimiter::new(2.0, 2);
        let ctx = Context::background();

        let start = Instant::now();
        limiter.wait(&ctx).await.unwrap();
        limiter.wait(&ctx).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.wait(&ctx).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let ctx = Context::background();
        for limiter in [
            RateLimiter::new(0.0, 0),
            RateLimiter::new(f64::NAN, 1),
            RateLimiter::new(f64::INFINITY, 1),
            RateLimiter::new(1e300, 1),
        ] {
            assert!(limiter.is_unlimited());
            for _ in 0..1000 {
                limiter.wait(&ctx).await.unwrap();
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_context_fails_without_consuming() {
        let limiter = RateLimiter::new(1.0, 1);
        let ctx = Context::background();
        ctx.cancel();

        let err = limiter.wait(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        let start = Instant::now();
        limiter.wait(&Context::background()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_shorter_than_wait_fails_fast() {
        let limiter = RateLimiter::new(0.1, 1);
        limiter.wait(&Context::background()).await.unwrap();

        let start = Instant::now();
        let ctx = Context::background().with_timeout(Duration::from_secs(1));
        let err = limiter.wait(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiny_rate_is_clamped_not_overflowed() {
        let limiter = RateLimiter::new(1e-20, 1);
        assert!(!limiter.is_unlimited());
        limiter.wait(&Context::background()).await.unwrap();

        let ctx = Context::background().with_timeout(Duration::from_secs(1));
        let err = limiter.wait(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));

        // Clamped to the minimum rate, the next permit arrives within the hour.
        let start = Instant::now();
        limiter.wait(&Context::background()).await.unwrap();
        assert!(start.elapsed() <= Duration::from_secs(3601));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait() {
        let limiter = Arc::new(RateLimiter::new(0.01, 1));
        let ctx = Context::background();
        limiter.wait(&ctx).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { limiter.wait(&ctx).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        ctx.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_registry_shares_limiter_per_urn() {
        let registry = RateLimiterRegistry::default();
        assert!(registry.is_empty());
        let a = registry.get("extsvc:azuredevops:1");
        let b = registry.get("extsvc:azuredevops:1");
        let c = registry.get("extsvc:azuredevops:2");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }
}
