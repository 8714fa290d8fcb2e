//! Retry utilities for blocking AWS calls
//!
//! Provides a backoff policy with full jitter and the loop that drives one
//! task's attempts.
//!
//! ```text
//!   attempt 0 ──Ok──────────────────────────────▶ success (retries = 0)
//!      │
//!     Err ─ classify ─ retryable and attempts left?
//!      │                 │ no ──────────────────▶ failure (retries = n)
//!      │                 │ yes
//!      │            sleep get_delay(n)
//!      ▼                 │
//!   attempt n+1 ◀────────┘
//! ```

mod policy;

pub use policy::RetryPolicy;

use crate::error::ClassifiedError;
use std::thread;
use tracing::debug;

/// Final state of a retried operation
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, ClassifiedError>,
    /// Retries performed, not counting the first attempt
    pub retries: u32,
}

/// Run `operation` until it succeeds or the policy gives up
///
/// The operation receives the attempt number, starting at 0. Each error is
/// classified as soon as it is returned and then dropped; only the last
/// [`ClassifiedError`] survives. Attempts are strictly sequential.
///
/// # Example
///
/// ```rust
/// use fanout::retry::{run_with_retry, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3).with_base_delay(Duration::from_millis(1));
/// let outcome = run_with_retry(&policy, "doc", |attempt| {
///     if attempt < 2 {
///         Err(std::io::Error::other("connection reset").into())
///     } else {
///         Ok(attempt)
///     }
/// });
/// assert_eq!(outcome.result.unwrap(), 2);
/// assert_eq!(outcome.retries, 2);
/// ```
pub fn run_with_retry<T, F>(policy: &RetryPolicy, label: &str, mut operation: F) -> RetryOutcome<T>
where
    F: FnMut(u32) -> anyhow::Result<T>,
{
    let mut attempt = 0;
    loop {
        let err = match operation(attempt) {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    retries: attempt,
                }
            }
            Err(err) => err,
        };

        let classified = ClassifiedError::from_error(&err);
        drop(err);

        if !policy.should_retry(classified.category, attempt) {
            if attempt > 0 {
                debug!(
                    task = label,
                    attempts = attempt + 1,
                    code = %classified.code,
                    "Giving up after retries"
                );
            }
            return RetryOutcome {
                result: Err(classified),
                retries: attempt,
            };
        }

        let delay = policy.get_delay(attempt);
        debug!(
            task = label,
            attempt = attempt,
            category = %classified.category,
            code = %classified.code,
            delay_ms = delay.as_millis() as u64,
            "Retrying after delay"
        );
        thread::sleep(delay);
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCategory, ServiceError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
    }

    fn throttled() -> anyhow::Error {
        ServiceError::new("ThrottlingException", "Rate exceeded").into()
    }

    #[test]
    fn test_succeeds_first_attempt() {
        let calls = AtomicUsize::new(0);
        let outcome = run_with_retry(&fast_policy(3), "t", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("done")
        });

        assert_eq!(outcome.result.unwrap(), "done");
        assert_eq!(outcome.retries, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retries_transient_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let outcome = run_with_retry(&fast_policy(3), "t", |_| {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(throttled())
            } else {
                Ok(42)
            }
        });

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.retries, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exhausts_retries() {
        let calls = AtomicUsize::new(0);
        let outcome: RetryOutcome<()> = run_with_retry(&fast_policy(2), "t", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(throttled())
        });

        let err = outcome.result.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Throttling);
        assert_eq!(err.code, "ThrottlingException");
        assert_eq!(outcome.retries, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_non_retryable_fails_immediately() {
        let calls = AtomicUsize::new(0);
        let outcome: RetryOutcome<()> = run_with_retry(&fast_policy(5), "t", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::new("AccessDenied", "no").into())
        });

        assert_eq!(outcome.result.unwrap_err().category, ErrorCategory::AccessDenied);
        assert_eq!(outcome.retries, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_retries() {
        let calls = AtomicUsize::new(0);
        let outcome: RetryOutcome<()> = run_with_retry(&fast_policy(0), "t", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(throttled())
        });

        assert!(outcome.result.is_err());
        assert_eq!(outcome.retries, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_attempt_numbers_are_sequential() {
        let mut seen = Vec::new();
        let _: RetryOutcome<()> = run_with_retry(&fast_policy(3), "t", |attempt| {
            seen.push(attempt);
            Err(throttled())
        });
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_sleeps_between_attempts() {
        let policy = RetryPolicy::new(2)
            .with_base_delay(Duration::from_millis(20))
            .with_jitter(false);

        let start = Instant::now();
        let _: RetryOutcome<()> = run_with_retry(&policy, "t", |_| Err(throttled()));

        // 20ms + 40ms without jitter
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
