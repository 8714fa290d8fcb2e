//! Exponential backoff policy with full jitter

use crate::error::ErrorCategory;
use crate::{FanoutError, Result};
use rand::Rng;
use std::collections::BTreeSet;
use std::time::Duration;

/// Configuration for retrying failed task attempts
///
/// The delay before retry `n` (0-indexed) is
/// `min(base_delay * exponential_base^n, max_delay)`. With jitter enabled
/// the actual sleep is drawn uniformly from `[0, that]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Growth factor per retry
    pub exponential_base: f64,

    /// Whether to apply full jitter
    pub jitter: bool,

    retryable: BTreeSet<ErrorCategory>,
}

impl RetryPolicy {
    /// Create a policy with the given retry budget and default timings
    ///
    /// # Example
    ///
    /// ```rust
    /// use fanout::retry::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new(5);
    /// assert_eq!(policy.max_retries, 5);
    /// assert!(policy.jitter);
    /// ```
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
            jitter: true,
            retryable: ErrorCategory::ALL
                .into_iter()
                .filter(ErrorCategory::is_retryable)
                .collect(),
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = base;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Also retry failures of `category`
    pub fn with_retryable(mut self, category: ErrorCategory) -> Self {
        self.retryable.insert(category);
        self
    }

    /// Never retry failures of `category`
    pub fn without_retryable(mut self, category: ErrorCategory) -> Self {
        self.retryable.remove(&category);
        self
    }

    /// Replace the retryable category table
    pub fn with_retryable_categories(mut self, categories: impl IntoIterator<Item = ErrorCategory>) -> Self {
        self.retryable = categories.into_iter().collect();
        self
    }

    pub fn retryable_categories(&self) -> impl Iterator<Item = ErrorCategory> + '_ {
        self.retryable.iter().copied()
    }

    pub fn is_retryable(&self, category: ErrorCategory) -> bool {
        self.retryable.contains(&category)
    }

    /// Check timings are usable
    pub fn validate(&self) -> Result<()> {
        if self.base_delay.is_zero() {
            return Err(FanoutError::InvalidConfig("base_delay must be > 0".into()));
        }
        if self.max_delay.is_zero() {
            return Err(FanoutError::InvalidConfig("max_delay must be > 0".into()));
        }
        if !self.exponential_base.is_finite() || self.exponential_base <= 1.0 {
            return Err(FanoutError::InvalidConfig(format!(
                "exponential_base must be a finite number > 1, got {}",
                self.exponential_base
            )));
        }
        Ok(())
    }

    /// Delay before retry `attempt` without jitter
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        let capped = delay.min(self.max_delay.as_secs_f64());

        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Delay to sleep before retry `attempt`
    pub fn get_delay(&self, attempt: u32) -> Duration {
        let capped = self.exponential_delay(attempt);
        if self.jitter && !capped.is_zero() {
            let secs = rand::thread_rng().gen_range(0.0..=capped.as_secs_f64());
            Duration::from_secs_f64(secs)
        } else {
            capped
        }
    }

    /// Whether a failure of `category` on `attempt` should be retried
    pub fn should_retry(&self, category: ErrorCategory, attempt: u32) -> bool {
        self.is_retryable(category) && attempt < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
