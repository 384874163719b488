use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use rand::Rng;

use crate::entity::platform::Platform;

use super::errors::Result;
use super::types::{CrossIdResolver, ListingPage, RatingPlatform};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default rate limits per platform (requests per second).
pub mod rate_limits {
    /// Douban throttles aggressively and answers with captcha pages.
    pub const DOUBAN_DEFAULT_RPS: u32 = 1;
    /// IMDb GraphQL tolerates a little more.
    pub const IMDB_DEFAULT_RPS: u32 = 2;
}

/// Get the default rate limit for a platform.
pub fn default_rps_for_platform(platform: Platform) -> u32 {
    match platform {
        Platform::Douban => rate_limits::DOUBAN_DEFAULT_RPS,
        Platform::Imdb => rate_limits::IMDB_DEFAULT_RPS,
    }
}

fn quota(requests_per_second: u32) -> Quota {
    Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN))
}

/// A standalone API rate limiter using the governor crate.
///
/// ```ignore
/// use cinesync::platform::ApiRateLimiter;
///
/// let limiter = ApiRateLimiter::new(1);
/// limiter.wait().await;
/// client.write_rating("1292052", 9).await?;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a new rate limiter. A rate of 0 is treated as 1 request per second.
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            inner: Arc::new(RateLimiter::direct(quota(requests_per_second))),
        }
    }

    /// Wait until a request is allowed by the rate limiter.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}

/// Uniformly distributed pause inserted between consecutive writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    min: Duration,
    max: Duration,
}

impl Jitter {
    /// A pause drawn uniformly from `min..=max`. Bounds are swapped if reversed.
    pub fn new(min: Duration, max: Duration) -> Self {
        if max < min {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    /// No pause at all.
    pub const fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draw one delay.
    pub fn sample(&self) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        if hi <= lo {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    /// Sleep for one sampled delay.
    pub async fn sleep(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// A rate-limited wrapper around any [`RatingPlatform`].
///
/// Every network-bound trait method waits for the limiter before delegating
/// to the inner client, so callers never exceed the configured rate.
///
/// ```ignore
/// use cinesync::platform::{RateLimitedClient, rate_limits};
/// use cinesync::douban::DoubanClient;
///
/// let client = DoubanClient::new(transport, user_id, cookie);
/// let client = RateLimitedClient::new(client, rate_limits::DOUBAN_DEFAULT_RPS);
/// ```
pub struct RateLimitedClient<C> {
    inner: C,
    rate_limiter: Arc<GovernorRateLimiter>,
}

impl<C> RateLimitedClient<C> {
    pub fn new(inner: C, requests_per_second: u32) -> Self {
        Self {
            inner,
            rate_limiter: Arc::new(RateLimiter::direct(quota(requests_per_second))),
        }
    }

    /// Get a reference to the inner client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn wait(&self) {
        self.rate_limiter.until_ready().await;
    }
}

impl<C: Clone> Clone for RateLimitedClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            rate_limiter: Arc::clone(&self.rate_limiter),
        }
    }
}

#[async_trait]
impl<C: RatingPlatform> RatingPlatform for RateLimitedClient<C> {
    fn platform(&self) -> Platform {
        self.inner.platform()
    }

    fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    async fn list_page(&self, offset: usize, page_size: usize) -> Result<ListingPage> {
        self.wait().await;
        self.inner.list_page(offset, page_size).await
    }

    async fn write_rating(&self, item_id: &str, rating: u8) -> Result<()> {
        self.wait().await;
        self.inner.write_rating(item_id, rating).await
    }

    async fn validate_credentials(&self) -> Result<bool> {
        self.wait().await;
        self.inner.validate_credentials().await
    }
}

#[async_trait]
impl<C: CrossIdResolver> CrossIdResolver for RateLimitedClient<C> {
    async fn resolve_cross_id(&self, platform: Platform, local_id: &str) -> Result<Option<String>> {
        self.wait().await;
        self.inner.resolve_cross_id(platform, local_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::platform::PlatformError;

    #[derive(Default)]
    struct CountingClient {
        writes: AtomicUsize,
    }

    #[async_trait]
    impl RatingPlatform for CountingClient {
        fn platform(&self) -> Platform {
            Platform::Imdb
        }

        async fn list_page(&self, _offset: usize, _page_size: usize) -> Result<ListingPage> {
            Ok(ListingPage::default())
        }

        async fn write_rating(&self, item_id: &str, _rating: u8) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if item_id == "bad" {
                return Err(PlatformError::api(400, "rejected"));
            }
            Ok(())
        }

        async fn validate_credentials(&self) -> Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn default_rps_matches_platform_constants() {
        assert_eq!(
            default_rps_for_platform(Platform::Douban),
            rate_limits::DOUBAN_DEFAULT_RPS
        );
        assert_eq!(
            default_rps_for_platform(Platform::Imdb),
            rate_limits::IMDB_DEFAULT_RPS
        );
    }

    #[tokio::test]
    async fn api_rate_limiter_allows_first_request_immediately() {
        let limiter = ApiRateLimiter::new(0);
        limiter.wait().await;
    }

    #[test]
    fn jitter_samples_stay_within_bounds() {
        let jitter = Jitter::new(Duration::from_millis(1000), Duration::from_millis(3000));
        for _ in 0..200 {
            let d = jitter.sample();
            assert!(d >= Duration::from_millis(1000));
            assert!(d <= Duration::from_millis(3000));
        }
    }

    #[test]
    fn jitter_swaps_reversed_bounds() {
        let jitter = Jitter::new(Duration::from_secs(3), Duration::from_secs(1));
        assert_eq!(jitter.min(), Duration::from_secs(1));
        assert_eq!(jitter.max(), Duration::from_secs(3));
    }

    #[test]
    fn jitter_none_is_zero() {
        assert_eq!(Jitter::none().sample(), Duration::ZERO);
    }

    #[tokio::test]
    async fn rate_limited_client_delegates_to_inner() {
        let client = RateLimitedClient::new(CountingClient::default(), 100);

        assert_eq!(client.platform(), Platform::Imdb);
        assert!(client.validate_credentials().await.expect("validate"));
        client.write_rating("tt0111161", 8).await.expect("write");
        let err = client.write_rating("bad", 8).await.expect_err("rejected");
        assert!(matches!(err, PlatformError::Api { status: 400, .. }));
        assert_eq!(client.inner().writes.load(Ordering::SeqCst), 2);
    }
}
