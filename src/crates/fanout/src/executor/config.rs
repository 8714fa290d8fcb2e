//! Executor settings

use crate::rate_limit::RateLimiterConfig;
use crate::retry::RetryPolicy;
use crate::{FanoutError, Result};
use tracing::warn;

/// Workers used when nothing else is configured
pub const DEFAULT_MAX_WORKERS: usize = 20;

/// Hard ceiling on worker threads per execution
pub const MAX_WORKERS_LIMIT: usize = 100;

/// Settings for one [`super::ParallelExecutor`]
///
/// # Example
///
/// ```rust
/// use fanout::{ParallelConfig, RetryPolicy};
///
/// let config = ParallelConfig::new(250)?.with_retry(RetryPolicy::new(5))?;
/// assert_eq!(config.max_workers(), 100);
/// assert_eq!(config.retry().max_retries, 5);
///
/// assert!(ParallelConfig::new(0).is_err());
/// # Ok::<(), fanout::FanoutError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelConfig {
    max_workers: usize,
    retry: RetryPolicy,
    rate_limiter: Option<RateLimiterConfig>,
}

impl ParallelConfig {
    /// Values above [`MAX_WORKERS_LIMIT`] are clamped, zero is rejected
    pub fn new(max_workers: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(FanoutError::InvalidConfig("max_workers must be >= 1".into()));
        }
        let max_workers = if max_workers > MAX_WORKERS_LIMIT {
            warn!(
                requested = max_workers,
                limit = MAX_WORKERS_LIMIT,
                "max_workers above limit, clamping"
            );
            MAX_WORKERS_LIMIT
        } else {
            max_workers
        };

        Ok(Self {
            max_workers,
            retry: RetryPolicy::default(),
            rate_limiter: None,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Result<Self> {
        retry.validate()?;
        self.retry = retry;
        Ok(self)
    }

    /// Limiter settings for services whose limiter does not exist yet
    pub fn with_rate_limiter(mut self, config: RateLimiterConfig) -> Result<Self> {
        config.validate()?;
        self.rate_limiter = Some(config);
        Ok(self)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn rate_limiter(&self) -> Option<&RateLimiterConfig> {
        self.rate_limiter.as_ref()
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            retry: RetryPolicy::default(),
            rate_limiter: None,
        }
    }
}
