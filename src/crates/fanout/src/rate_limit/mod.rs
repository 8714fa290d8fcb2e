//! Rate limiting utilities
//!
//! Token bucket limiter shared by every worker that calls the same AWS
//! service, and the registry that hands out one limiter per service.

mod registry;

pub use registry::{
    get_rate_limiter, reset_rate_limiters, service_config, RateLimiterRegistry, SERVICE_RATE_LIMITS,
};

use crate::{FanoutError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const MAX_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Settings for a token bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Sustained refill rate
    pub requests_per_second: f64,

    /// Bucket capacity, also the initial token count
    pub burst_size: u32,

    /// How long `acquire` waits before giving up, in seconds when serialized
    #[serde(with = "duration_secs", default = "default_wait_timeout")]
    pub wait_timeout: Duration,
}

impl RateLimiterConfig {
    /// Create a validated configuration
    ///
    /// # Example
    ///
    /// ```rust
    /// use fanout::RateLimiterConfig;
    /// use std::time::Duration;
    ///
    /// let config = RateLimiterConfig::new(20.0, 40, Duration::from_secs(30)).unwrap();
    /// assert_eq!(config.burst_size, 40);
    ///
    /// assert!(RateLimiterConfig::new(0.0, 10, Duration::from_secs(1)).is_err());
    /// ```
    pub fn new(requests_per_second: f64, burst_size: u32, wait_timeout: Duration) -> Result<Self> {
        let config = Self {
            requests_per_second,
            burst_size,
            wait_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.requests_per_second.is_finite() && self.requests_per_second > 0.0) {
            return Err(FanoutError::InvalidConfig(
                "requests_per_second must be > 0".into(),
            ));
        }
        if self.burst_size == 0 {
            return Err(FanoutError::InvalidConfig("burst_size must be >= 1".into()));
        }
        Ok(())
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            burst_size: 20,
            wait_timeout: default_wait_timeout(),
        }
    }
}

fn default_wait_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Thread-safe token bucket
///
/// Tokens refill continuously at `requests_per_second` up to `burst_size`.
/// The bucket starts full.
///
/// # Example
///
/// ```rust
/// use fanout::{RateLimiter, RateLimiterConfig};
/// use std::time::Duration;
///
/// let limiter = RateLimiter::new(RateLimiterConfig::new(10.0, 2, Duration::from_millis(10)).unwrap());
/// assert!(limiter.try_acquire(1));
/// assert!(limiter.try_acquire(1));
/// assert!(!limiter.try_acquire(1));
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    /// Refill tokens based on elapsed time
    fn refill(&mut self, config: &RateLimiterConfig) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * config.requests_per_second).min(config.burst_size as f64);
        self.last_refill = now;
    }
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: config.burst_size as f64,
                last_refill: Instant::now(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Take `tokens` if available right now
    pub fn try_acquire(&self, tokens: u32) -> bool {
        let mut state = self.state.lock();
        state.refill(&self.config);

        let wanted = tokens as f64;
        if state.tokens >= wanted {
            state.tokens -= wanted;
            true
        } else {
            false
        }
    }

    /// Wait up to the configured timeout for `tokens`
    pub fn acquire(&self, tokens: u32) -> bool {
        self.acquire_timeout(tokens, self.config.wait_timeout)
    }

    /// Wait up to `timeout` for `tokens`
    ///
    /// Returns `false` on timeout, and immediately when more tokens are
    /// requested than the bucket can ever hold.
    pub fn acquire_timeout(&self, tokens: u32, timeout: Duration) -> bool {
        if tokens > self.config.burst_size {
            debug!(
                requested = tokens,
                burst_size = self.config.burst_size,
                "Request exceeds bucket capacity"
            );
            return false;
        }

        let deadline = Instant::now().checked_add(timeout);
        loop {
            let deficit = {
                let mut state = self.state.lock();
                state.refill(&self.config);
                let wanted = tokens as f64;
                if state.tokens >= wanted {
                    state.tokens -= wanted;
                    return true;
                }
                wanted - state.tokens
            };

            let remaining = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining,
                    _ => return false,
                },
                None => MAX_POLL_INTERVAL,
            };

            let until_refilled = Duration::try_from_secs_f64(deficit / self.config.requests_per_second)
                .unwrap_or(MAX_POLL_INTERVAL);
            let sleep_for = until_refilled
                .min(remaining)
                .min(MAX_POLL_INTERVAL)
                .max(Duration::from_millis(1));
            thread::sleep(sleep_for);
        }
    }

    /// Tokens available right now
    pub fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock();
        state.refill(&self.config);
        state.tokens
    }

    /// Refill the bucket completely
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.tokens = self.config.burst_size as f64;
        state.last_refill = Instant::now();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}
