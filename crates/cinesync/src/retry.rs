//! Shared retry utilities for platform operations.
//!
//! Transient failures (network errors, rate limiting, 5xx answers) are
//! retried with jittered exponential backoff; everything else is returned
//! to the caller on the first attempt.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::platform::ProgressCallback;
use crate::sync::{INITIAL_BACKOFF_MS, MAX_ATTEMPTS, MAX_BACKOFF_MS, SyncProgress};

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retries after the first attempt.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: MAX_ATTEMPTS.saturating_sub(1) as usize,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// The default backoff: 0.5 s initial delay, 5 s cap, 3 attempts in total, jittered.
#[must_use]
pub fn default_backoff() -> ExponentialBuilder {
    RetryConfig::default().into_backoff()
}

/// Execute an operation, retrying while `is_retryable` holds.
///
/// Each retry is logged at debug level and reported as
/// [`SyncProgress::RetryBackoff`] carrying `label`.
///
/// ```ignore
/// use cinesync::retry::{with_retry, RetryConfig};
///
/// let imdb = with_retry(
///     || async { client.resolve_cross_id(Platform::Douban, "1292052").await },
///     PlatformError::is_transient,
///     |e| short_error_message(e),
///     "resolve 1292052",
///     &RetryConfig::default(),
///     None,
/// ).await?;
/// ```
pub async fn with_retry<T, E, F, Fut, IsRetryable, ShortMsg>(
    mut operation: F,
    is_retryable: IsRetryable,
    short_message: ShortMsg,
    label: &str,
    config: &RetryConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
    IsRetryable: Fn(&E) -> bool + Send + Sync + 'static,
    ShortMsg: Fn(&E) -> String + Send + Sync + 'static,
{
    let label = label.to_string();

    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(config.clone().into_backoff())
        .notify(|err, dur| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            if let Some(cb) = on_progress {
                cb(SyncProgress::RetryBackoff {
                    label: label.clone(),
                    retry_after_ms: dur.as_millis() as u64,
                    attempt: current_attempt,
                });
            }
            tracing::debug!(
                "{} failed, retrying in {:?} (attempt {}): {}",
                label,
                dur,
                current_attempt,
                short_message(err)
            );
        })
        .when(is_retryable)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::platform::PlatformError;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();

        assert_eq!(config.min_delay, Duration::from_millis(INITIAL_BACKOFF_MS));
        assert_eq!(config.max_delay, Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(config.max_retries, 2);
        assert!(config.with_jitter);
    }

    #[test]
    fn test_retry_config_custom() {
        let config = RetryConfig::new(Duration::from_secs(2), Duration::from_secs(30), 3)
            .with_jitter(false);

        assert_eq!(config.min_delay, Duration::from_secs(2));
        assert_eq!(config.max_retries, 3);
        assert!(!config.with_jitter);
        let _backoff = config.into_backoff();
    }

    fn fast_config() -> RetryConfig {
        RetryConfig::new(Duration::from_millis(1), Duration::from_millis(2), 2).with_jitter(false)
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_retries_transient_errors_and_emits_progress() {
        let calls = Arc::new(AtomicU32::new(0));

        let events: Arc<Mutex<Vec<SyncProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let events_capture = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            events_capture
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event);
        });

        let calls_capture = Arc::clone(&calls);
        let mut operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                let n = calls_capture.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(PlatformError::network("connection reset"))
                } else {
                    Ok("tt0111161")
                }
            }
        };

        let result = with_retry(
            &mut operation,
            PlatformError::is_transient,
            |e: &PlatformError| e.to_string(),
            "resolve 1292052",
            &fast_config(),
            Some(&callback),
        )
        .await;

        assert_eq!(result.unwrap(), "tt0111161");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let events = events.lock().unwrap_or_else(|e| e.into_inner());
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SyncProgress::RetryBackoff { .. }))
                .count(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let mut operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(PlatformError::api(503, "unavailable"))
            }
        };

        let err = with_retry(
            &mut operation,
            PlatformError::is_transient,
            |e: &PlatformError| e.to_string(),
            "page 0",
            &fast_config(),
            None,
        )
        .await
        .expect_err("expected error");

        assert!(matches!(err, PlatformError::Api { status: 503, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn with_retry_does_not_retry_permanent_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let mut operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(PlatformError::AuthRequired)
            }
        };

        let err = with_retry(
            &mut operation,
            PlatformError::is_transient,
            |e: &PlatformError| e.to_string(),
            "validate",
            &RetryConfig::default(),
            None,
        )
        .await
        .expect_err("expected error");

        assert!(err.is_auth());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
