//! Settings for executions
//!
//! [`FanoutSettings`] collects worker count, retry timings and per-service
//! rate limits from a settings file (TOML, YAML or JSON, picked by
//! extension) and `FANOUT_*` environment variables, then turns them into a
//! [`ParallelConfig`] and a [`RateLimiterRegistry`].
//!
//! ```toml
//! [parallel]
//! max_workers = 8
//!
//! [retry]
//! max_retries = 5
//! base_delay_secs = 0.5
//! retryable = ["throttling", "network", "timeout", "service_error"]
//!
//! [rate_limits.ec2]
//! requests_per_second = 5.0
//! burst_size = 10
//! ```
//!
//! | Variable | Field |
//! |---|---|
//! | `FANOUT_MAX_WORKERS` | `parallel.max_workers` |
//! | `FANOUT_MAX_RETRIES` | `retry.max_retries` |
//! | `FANOUT_BASE_DELAY_SECS` | `retry.base_delay_secs` |
//! | `FANOUT_MAX_DELAY_SECS` | `retry.max_delay_secs` |
//! | `FANOUT_EXPONENTIAL_BASE` | `retry.exponential_base` |
//! | `FANOUT_JITTER` | `retry.jitter` |
//! | `FANOUT_RETRYABLE` | `retry.retryable` (comma separated) |

mod builder;
mod env;

pub use builder::ConfigBuilder;
pub use env::{build_env_key, get_env, get_env_bool, get_env_list, get_env_or, get_env_parse, get_env_parse_or};

use crate::error::ErrorCategory;
use crate::executor::{ParallelConfig, DEFAULT_MAX_WORKERS};
use crate::rate_limit::{RateLimiterConfig, RateLimiterRegistry};
use crate::retry::RetryPolicy;
use crate::{FanoutError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Prefix of the environment variables read by [`FanoutSettings::from_env`]
pub const ENV_PREFIX: &str = "FANOUT_";

/// Deserialize a TOML, YAML or JSON file, chosen by extension
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let contents = fs::read_to_string(path)?;
    debug!(path = %path.display(), format = %extension, "Loading file");

    match extension.as_str() {
        "toml" => toml::from_str(&contents).map_err(|e| parse_error("TOML", e)),
        "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| parse_error("YAML", e)),
        "json" => serde_json::from_str(&contents).map_err(|e| parse_error("JSON", e)),
        _ => Err(FanoutError::InvalidConfig(format!(
            "unsupported file extension for {} (expected .toml, .yaml, .yml or .json)",
            path.display()
        ))),
    }
}

fn parse_error(format: &'static str, err: impl std::fmt::Display) -> FanoutError {
    FanoutError::Parse {
        format,
        message: err.to_string(),
    }
}

fn secs(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| FanoutError::InvalidConfig(format!("{} must be a non-negative number of seconds, got {}", name, value)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelSettings {
    pub max_workers: usize,
}

impl Default for ParallelSettings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// Serialized form of a [`RetryPolicy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
    pub exponential_base: f64,
    pub jitter: bool,
    pub retryable: Vec<ErrorCategory>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_delay_secs: policy.base_delay.as_secs_f64(),
            max_delay_secs: policy.max_delay.as_secs_f64(),
            exponential_base: policy.exponential_base,
            jitter: policy.jitter,
            retryable: policy.retryable_categories().collect(),
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        let policy = RetryPolicy::new(self.max_retries)
            .with_base_delay(secs("base_delay_secs", self.base_delay_secs)?)
            .with_max_delay(secs("max_delay_secs", self.max_delay_secs)?)
            .with_exponential_base(self.exponential_base)
            .with_jitter(self.jitter)
            .with_retryable_categories(self.retryable.iter().copied());
        policy.validate()?;
        Ok(policy)
    }
}

/// All executor settings
///
/// # Example
///
/// ```rust
/// use fanout::config::{ConfigBuilder, FanoutSettings};
///
/// let settings = FanoutSettings::build()?;
/// let config = settings.to_parallel_config()?;
/// assert_eq!(config.max_workers(), 20);
/// assert_eq!(config.retry().max_retries, 3);
/// # Ok::<(), fanout::FanoutError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutSettings {
    pub parallel: ParallelSettings,
    pub retry: RetrySettings,
    /// Per-service limiter settings, replacing the built-in table entry
    pub rate_limits: HashMap<String, RateLimiterConfig>,
}

impl FanoutSettings {
    /// Load and validate a settings file
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Self = load_file(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings file (or defaults) with `FANOUT_*` variables applied on top
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => load_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(ENV_PREFIX)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Override fields whose `{prefix}*` variable is set
    pub fn apply_env(&mut self, prefix: &str) -> Result<&mut Self> {
        let key = |name: &str| build_env_key(prefix, name);

        if let Some(v) = get_env_parse(&key("max_workers"))? {
            self.parallel.max_workers = v;
        }
        if let Some(v) = get_env_parse(&key("max_retries"))? {
            self.retry.max_retries = v;
        }
        if let Some(v) = get_env_parse(&key("base_delay_secs"))? {
            self.retry.base_delay_secs = v;
        }
        if let Some(v) = get_env_parse(&key("max_delay_secs"))? {
            self.retry.max_delay_secs = v;
        }
        if let Some(v) = get_env_parse(&key("exponential_base"))? {
            self.retry.exponential_base = v;
        }
        if let Some(v) = get_env_bool(&key("jitter"))? {
            self.retry.jitter = v;
        }
        if let Some(v) = get_env_list(&key("retryable"))? {
            self.retry.retryable = v;
        }
        Ok(self)
    }

    pub fn to_parallel_config(&self) -> Result<ParallelConfig> {
        ParallelConfig::new(self.parallel.max_workers)?.with_retry(self.retry.to_policy()?)
    }

    /// Fresh registry honouring `rate_limits`
    pub fn rate_limiter_registry(&self) -> Arc<RateLimiterRegistry> {
        Arc::new(RateLimiterRegistry::with_overrides(self.rate_limits.clone()))
    }
}

impl ConfigBuilder for FanoutSettings {
    fn validate(&self) -> Result<()> {
        if self.parallel.max_workers == 0 {
            return Err(FanoutError::InvalidConfig("parallel.max_workers must be >= 1".into()));
        }
        self.retry.to_policy()?;
        for (service, limits) in &self.rate_limits {
            limits
                .validate()
                .map_err(|e| FanoutError::InvalidConfig(format!("rate_limits.{}: {}", service, e)))?;
        }
        Ok(())
    }

    fn from_env(prefix: &str) -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_env(prefix)?;
        Ok(settings)
    }

    /// Fields of `other` still at their default do not overwrite; rate
    /// limits are merged per service
    fn merge(&mut self, other: Self) -> &mut Self {
        let defaults = Self::default();
        if other.parallel != defaults.parallel {
            self.parallel = other.parallel;
        }

        let retry = other.retry;
        let base = defaults.retry;
        if retry.max_retries != base.max_retries {
            self.retry.max_retries = retry.max_retries;
        }
        if retry.base_delay_secs != base.base_delay_secs {
            self.retry.base_delay_secs = retry.base_delay_secs;
        }
        if retry.max_delay_secs != base.max_delay_secs {
            self.retry.max_delay_secs = retry.max_delay_secs;
        }
        if retry.exponential_base != base.exponential_base {
            self.retry.exponential_base = retry.exponential_base;
        }
        if retry.jitter != base.jitter {
            self.retry.jitter = retry.jitter;
        }
        if retry.retryable != base.retryable {
            self.retry.retryable = retry.retryable;
        }

        self.rate_limits.extend(other.rate_limits);
        self
    }
}
