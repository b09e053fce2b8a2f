//! Bounded retry of image fetches
//!
//! Image fetches hit a CDN that occasionally times out, resets connections,
//! cuts bodies short or answers 429/5xx. Those failures are retried up to
//! `RetryConfig::max_attempts` more times; anything else is returned on the
//! first attempt. Delays grow exponentially up to `max_delay`, and a server
//! `Retry-After` hint stretches the wait (never beyond `max_delay`).
//!
//! # Example
//!
//! ```no_run
//! use carousel_dl::config::RetryConfig;
//! use carousel_dl::error::FetchError;
//! use carousel_dl::retry::with_retry;
//!
//! # async fn example() -> Result<u64, FetchError> {
//! let url = "https://cdn.example.com/photo.jpg";
//! let bytes = with_retry(&RetryConfig::default(), url, || async {
//!     // one download attempt
//!     Ok::<u64, FetchError>(0)
//! })
//! .await?;
//! # Ok(bytes)
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classification of a failed attempt
pub trait IsRetryable {
    /// True if another attempt may succeed
    fn is_retryable(&self) -> bool;

    /// Minimum wait the remote side asked for before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_body() || source.is_decode()
            }
            // 429 Too Many Requests and server-side errors
            FetchError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            // A short body from a CDN is usually a dropped connection
            FetchError::Truncated { .. } => true,
            FetchError::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Delay schedule for one fetch
///
/// Starts at `initial_delay` and multiplies by `backoff_multiplier` after
/// every step, saturating at `max_delay`.
#[derive(Debug)]
pub struct Backoff<'a> {
    config: &'a RetryConfig,
    next: Duration,
}

impl<'a> Backoff<'a> {
    /// Fresh schedule for `config`
    pub fn new(config: &'a RetryConfig) -> Self {
        Self {
            config,
            next: config.initial_delay.min(config.max_delay),
        }
    }

    /// Wait before the next attempt, honoring a server hint capped at `max_delay`
    pub fn next_delay(&mut self, hint: Option<Duration>) -> Duration {
        let base = self.next;
        self.next = grow(base, self.config.backoff_multiplier).min(self.config.max_delay);

        let computed = if self.config.jitter {
            add_jitter(base)
        } else {
            base
        };
        match hint {
            Some(hint) => computed.max(hint.min(self.config.max_delay)),
            None => computed,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out
///
/// `url` is the fetched address, used for log context only. The last error
/// is returned unchanged.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, url: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut backoff = Backoff::new(config);
    let mut retries: u32 = 0;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(url, attempts = retries + 1, "Fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            tracing::debug!(url, error = %error, "Fetch failed permanently");
            return Err(error);
        }
        if retries >= config.max_attempts {
            tracing::warn!(url, error = %error, attempts = retries + 1, "Giving up on fetch");
            return Err(error);
        }

        retries += 1;
        let delay = backoff.next_delay(error.retry_after());
        tracing::warn!(
            url,
            error = %error,
            retry = retries,
            max_retries = config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Fetch failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// `delay * multiplier`, saturating instead of overflowing
fn grow(delay: Duration, multiplier: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * multiplier).unwrap_or(Duration::MAX)
}

/// Random delay between `delay` and `2 * delay`
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=2.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(delay)
}
