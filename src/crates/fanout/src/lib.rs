//! Parallel execution core for multi-account, multi-region AWS audits
//!
//! An analyzer supplies one collector function; this crate fans it out over
//! every {account or profile} × region pair described by an execution
//! context, bounds concurrency, rate-limits calls per AWS service, retries
//! transient failures and aggregates the outcomes into one
//! [`ExecutionResult`].
//!
//! # Modules
//!
//! - `error` - Error taxonomy, classification, error chains and the secondary-error collector
//! - `retry` - Backoff policy with full jitter and the per-task retry loop
//! - `rate_limit` - Token bucket limiter and the per-service registry
//! - `result` - Task outcomes and the aggregated execution result
//! - `context` - Execution context contract, role selection and session providers
//! - `task` - Expansion of a context into tasks
//! - `executor` - Bounded worker pool and the `run_parallel` entry point
//! - `progress` - Progress tracker contract and a counting tracker
//! - `quiet` - Thread-local quiet flag
//! - `logging` - Subscriber setup and formatting helpers
//! - `config` - Settings loaded from files and environment variables
//!
//! # Example
//!
//! ```rust,ignore
//! use fanout::{run_parallel, AuditContext, SessionRequest};
//!
//! let ctx = AuditContext::profiles(vec!["dev".into(), "prod".into()], |req: &SessionRequest<'_>| {
//!     Ok(format!("{}@{}", req.identity, req.region))
//! })
//! .with_regions(vec!["us-east-1".into(), "eu-west-1".into()]);
//!
//! let result = run_parallel(&ctx, |session, _id, _name, _region| Ok(session.len()), 10, "ec2", None)?;
//! println!("{} ok, {} failed", result.success_count(), result.error_count());
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod logging;
pub mod progress;
pub mod quiet;
pub mod rate_limit;
pub mod result;
pub mod retry;
pub mod task;

pub use config::FanoutSettings;
pub use context::{
    Account, AuditContext, AuthMode, ExecutionContext, FallbackStrategy, RoleSelection,
    SessionProvider, SessionRequest,
};
pub use error::{ErrorCategory, ServiceError};
pub use executor::{run_parallel, ParallelConfig, ParallelExecutor};
pub use progress::{ParallelTracker, ProgressTracker};
pub use rate_limit::{RateLimiter, RateLimiterConfig, RateLimiterRegistry};
pub use result::{ExecutionResult, ExecutionSummary, FlatData, Gathered, TaskError, TaskResult};
pub use retry::RetryPolicy;
pub use task::{TaskBuilder, TaskSpec};

use thiserror::Error;

/// Errors raised while setting up an execution
///
/// Task failures never surface here; they are recorded as [`TaskError`]s
/// inside the [`ExecutionResult`].
#[derive(Debug, Error)]
pub enum FanoutError {
    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An environment variable could not be read or parsed
    #[error("Environment variable {key}: {message}")]
    Env { key: String, message: String },

    /// A settings file could not be parsed
    #[error("Failed to parse {format} settings: {message}")]
    Parse { format: &'static str, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for setup operations
pub type Result<T> = std::result::Result<T, FanoutError>;

/// Get version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_error_display() {
        let err = FanoutError::InvalidConfig("max_workers must be >= 1".into());
        assert_eq!(err.to_string(), "Invalid configuration: max_workers must be >= 1");

        let err = FanoutError::Env {
            key: "FANOUT_MAX_WORKERS".into(),
            message: "invalid digit found in string".into(),
        };
        assert!(err.to_string().starts_with("Environment variable FANOUT_MAX_WORKERS"));
    }
}
