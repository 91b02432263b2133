//! Retry decisions for failed attempts.
//!
//! A [`RetryHook`] is consulted by the transport after every attempt. The
//! stock implementation, [`RetryPolicy`], retries server errors with a linearly
//! growing delay until the attempt budget is spent.

use crate::Error;
use http::StatusCode;
use std::time::Duration;

/// The outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether another attempt should be made.
    pub should_retry: bool,
    /// How long to wait before the next attempt.
    pub delay: Duration,
}

impl RetryDecision {
    /// Stop retrying.
    pub const fn stop() -> Self {
        Self {
            should_retry: false,
            delay: Duration::ZERO,
        }
    }

    /// Retry after `delay`.
    pub const fn retry_after(delay: Duration) -> Self {
        Self {
            should_retry: true,
            delay,
        }
    }
}

/// Decides whether a failed attempt should be retried.
///
/// Implement this trait to plug custom retry logic into a
/// [`RetryingTransport`](crate::transport::RetryingTransport).
///
/// # Examples
///
/// ```
/// use routeline::retry::{RetryDecision, RetryHook};
/// use routeline::Error;
/// use http::StatusCode;
/// use std::time::Duration;
///
/// struct RetryOnRateLimit;
///
/// impl RetryHook for RetryOnRateLimit {
///     fn decide(
///         &self,
///         attempt: usize,
///         last_status: Option<StatusCode>,
///         _error: Option<&Error>,
///     ) -> RetryDecision {
///         if attempt < 3 && last_status == Some(StatusCode::TOO_MANY_REQUESTS) {
///             RetryDecision::retry_after(Duration::from_secs(1))
///         } else {
///             RetryDecision::stop()
///         }
///     }
/// }
/// ```
pub trait RetryHook: Send + Sync {
    /// Decides what to do after an attempt.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt that just finished (1-indexed)
    /// * `last_status` - The status of the response, if one was received
    /// * `error` - The transport error, if the attempt failed without a response
    fn decide(
        &self,
        attempt: usize,
        last_status: Option<StatusCode>,
        error: Option<&Error>,
    ) -> RetryDecision;
}

/// Retries 5xx responses with a linear backoff.
///
/// The delay after attempt `n` is `base_delay * n`: with a 200ms base the
/// fourth attempt is followed by an 800ms wait. There is no jitter and no
/// upper bound. Once `attempt >= max_retries` no further attempt is made, so
/// `max_retries` is also the total number of attempts.
///
/// Failures with no response at all (connection refused, timeouts) are not
/// retried unless [`retry_transport_errors`](Self::retry_transport_errors) is
/// enabled.
///
/// # Examples
///
/// ```
/// use routeline::retry::{RetryHook, RetryPolicy};
/// use http::StatusCode;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(100));
///
/// let first = policy.decide(1, Some(StatusCode::SERVICE_UNAVAILABLE), None);
/// assert!(first.should_retry);
/// assert_eq!(first.delay, Duration::from_millis(100));
///
/// let last = policy.decide(3, Some(StatusCode::SERVICE_UNAVAILABLE), None);
/// assert!(!last.should_retry);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    max_retries: usize,
    base_delay: Duration,
    retry_transport_errors: bool,
}

impl RetryPolicy {
    /// Creates a policy allowing up to `max_retries` attempts.
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            retry_transport_errors: false,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::default()
    }

    /// Also retry attempts that failed without any response.
    pub fn retry_transport_errors(mut self, enabled: bool) -> Self {
        self.retry_transport_errors = enabled;
        self
    }

    /// The attempt budget.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// The delay unit.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// The delay following the given attempt.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        self.base_delay
            .saturating_mul(attempt.try_into().unwrap_or(u32::MAX))
    }
}

impl RetryHook for RetryPolicy {
    fn decide(
        &self,
        attempt: usize,
        last_status: Option<StatusCode>,
        error: Option<&Error>,
    ) -> RetryDecision {
        if attempt >= self.max_retries {
            return RetryDecision::stop();
        }

        let retryable = match last_status {
            Some(status) => status.is_server_error(),
            None => self.retry_transport_errors && error.is_some_and(Error::is_transport_failure),
        };

        if retryable {
            RetryDecision::retry_after(self.delay_for_attempt(attempt))
        } else {
            RetryDecision::stop()
        }
    }
}
