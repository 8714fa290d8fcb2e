//! Error taxonomy and classification
//!
//! Every failure a task can hit is mapped onto one of nine
//! [`ErrorCategory`] values. Collector and session errors are plain
//! [`anyhow::Error`]s; structured AWS error responses travel inside them as
//! [`ServiceError`], anywhere in the source chain.
//!
//! # Features
//!
//! - Classification of arbitrary error chains (`categorize`, `get_error_code`)
//! - Error code heuristics for errors without an object (`categorize_by_code`)
//! - Error chain formatting and root cause extraction
//! - `ErrorCollector` for secondary failures that should not fail a task
//! - User-facing messages with account id masking
//!
//! # Example
//!
//! ```rust
//! use fanout::error::{categorize, ErrorCategory, ServiceError};
//!
//! let err = anyhow::Error::new(ServiceError::new("ThrottlingException", "Rate exceeded"))
//!     .context("DescribeInstances failed");
//! assert_eq!(categorize(&err), ErrorCategory::Throttling);
//! ```

mod chain;
mod classify;
mod collector;
mod display;

pub use chain::{error_chain_length, find_in_chain, format_error_chain, root_cause};
pub use classify::{
    categorize, categorize_by_code, get_error_code, is_access_denied, is_not_found, is_retryable,
    is_throttling, ClassifiedError, ServiceError, RETRYABLE_ERROR_CODES,
};
pub use collector::{
    safe_collect, try_or_default, CollectSite, CollectedError, ErrorCollector, ErrorSeverity,
};
pub use display::{format_error_for_user, mask_account_ids};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed taxonomy of task failures
///
/// Declaration order is the sort order used for grouped output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Throttling,
    AccessDenied,
    NotFound,
    Network,
    Timeout,
    ExpiredToken,
    InvalidRequest,
    ServiceError,
    Unknown,
}

impl ErrorCategory {
    /// All categories in sort order
    pub const ALL: [ErrorCategory; 9] = [
        ErrorCategory::Throttling,
        ErrorCategory::AccessDenied,
        ErrorCategory::NotFound,
        ErrorCategory::Network,
        ErrorCategory::Timeout,
        ErrorCategory::ExpiredToken,
        ErrorCategory::InvalidRequest,
        ErrorCategory::ServiceError,
        ErrorCategory::Unknown,
    ];

    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Throttling => "throttling",
            ErrorCategory::AccessDenied => "access_denied",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::ExpiredToken => "expired_token",
            ErrorCategory::InvalidRequest => "invalid_request",
            ErrorCategory::ServiceError => "service_error",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Default retry table: transient failures only
    ///
    /// `RetryPolicy` starts from this table and can widen or narrow it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Throttling | ErrorCategory::Network | ErrorCategory::Timeout
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ErrorCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| format!("unknown error category: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_values() {
        assert_eq!(ErrorCategory::Throttling.as_str(), "throttling");
        assert_eq!(ErrorCategory::AccessDenied.to_string(), "access_denied");
        assert_eq!(ErrorCategory::ExpiredToken.as_str(), "expired_token");
        assert_eq!(ErrorCategory::ALL.len(), 9);
    }

    #[test]
    fn test_category_serde() {
        let json = serde_json::to_string(&ErrorCategory::InvalidRequest).unwrap();
        assert_eq!(json, "\"invalid_request\"");

        let parsed: ErrorCategory = serde_json::from_str("\"service_error\"").unwrap();
        assert_eq!(parsed, ErrorCategory::ServiceError);
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("throttling".parse::<ErrorCategory>(), Ok(ErrorCategory::Throttling));
        assert_eq!("Access-Denied".parse::<ErrorCategory>(), Ok(ErrorCategory::AccessDenied));
        assert!("bogus".parse::<ErrorCategory>().is_err());
    }

    #[test]
    fn test_default_retry_table() {
        let retryable: Vec<_> = ErrorCategory::ALL
            .into_iter()
            .filter(ErrorCategory::is_retryable)
            .collect();
        assert_eq!(
            retryable,
            vec![ErrorCategory::Throttling, ErrorCategory::Network, ErrorCategory::Timeout]
        );
    }

    #[test]
    fn test_category_ordering() {
        assert!(ErrorCategory::Throttling < ErrorCategory::AccessDenied);
        assert!(ErrorCategory::ServiceError < ErrorCategory::Unknown);
    }
}
