//! Mapping errors onto [`ErrorCategory`]
//!
//! Classification is pure: it inspects an error chain and returns a
//! category, an error code and a message. The executor classifies every
//! failure as soon as it happens and keeps only the [`ClassifiedError`].

use super::chain::{error_chain_length, find_in_chain, format_error_chain};
use super::ErrorCategory;
use std::io;
use thiserror::Error;

/// Structured error response returned by an AWS service
///
/// Collectors wrap SDK failures in this type (directly or behind
/// `anyhow` context) so the executor can read the service error code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    /// Service error code, e.g. `ThrottlingException`
    pub code: String,
    /// Message returned by the service
    pub message: String,
    /// Service name, e.g. `ec2`
    pub service: Option<String>,
    /// API operation, e.g. `DescribeInstances`
    pub operation: Option<String>,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            service: None,
            operation: None,
        }
    }

    /// Attach the service and API operation that failed
    pub fn with_operation(mut self, service: impl Into<String>, operation: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self.operation = Some(operation.into());
        self
    }
}

/// Error codes worth retrying regardless of category
pub const RETRYABLE_ERROR_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "RateExceeded",
    "ServiceUnavailable",
    "ServiceUnavailableException",
    "InternalError",
    "InternalServiceError",
    "RequestTimeout",
    "RequestTimeoutException",
    "ProvisionedThroughputExceededException",
    "SlowDown",
];

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "RateExceeded",
    "ProvisionedThroughputExceededException",
    "SlowDown",
];

const ACCESS_DENIED_CODES: &[&str] = &["AccessDenied", "AccessDeniedException", "UnauthorizedAccess"];

const NOT_FOUND_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "NotFoundException",
    "NoSuchEntity",
    "NoSuchBucket",
    "InvalidInstanceID.NotFound",
];

const EXPIRED_TOKEN_CODES: &[&str] = &["ExpiredToken", "ExpiredTokenException"];

/// Whether a service error code signals throttling
pub fn is_throttling(code: &str) -> bool {
    THROTTLING_CODES.contains(&code)
}

/// Whether a service error code signals missing permissions
pub fn is_access_denied(code: &str) -> bool {
    ACCESS_DENIED_CODES.contains(&code)
}

/// Whether a service error code signals a missing resource
pub fn is_not_found(code: &str) -> bool {
    NOT_FOUND_CODES.contains(&code)
}

fn categorize_service_code(code: &str) -> ErrorCategory {
    if is_throttling(code) {
        ErrorCategory::Throttling
    } else if is_access_denied(code) {
        ErrorCategory::AccessDenied
    } else if is_not_found(code) {
        ErrorCategory::NotFound
    } else if code.contains("Timeout") {
        ErrorCategory::Timeout
    } else if EXPIRED_TOKEN_CODES.contains(&code) {
        ErrorCategory::ExpiredToken
    } else {
        categorize_by_code(code)
    }
}

/// Classify an error chain
///
/// A [`ServiceError`] anywhere in the chain decides the category from its
/// code. Otherwise an `std::io::Error` in the chain means a network
/// failure. Anything else is [`ErrorCategory::Unknown`].
pub fn categorize(error: &anyhow::Error) -> ErrorCategory {
    if let Some(service) = find_in_chain::<ServiceError>(error.as_ref()) {
        return categorize_service_code(&service.code);
    }
    if find_in_chain::<io::Error>(error.as_ref()).is_some() {
        return ErrorCategory::Network;
    }
    ErrorCategory::Unknown
}

/// Classify a bare error code by case-insensitive substring
///
/// The first matching row wins:
///
/// | substring | category |
/// |---|---|
/// | `accessdenied`, `unauthorized`, `forbidden` | AccessDenied |
/// | `notfound`, `nosuch`, `doesnotexist` | NotFound |
/// | `throttl`, `ratelimit`, `toomanyrequests` | Throttling |
/// | `timeout`, `timedout` | Timeout |
/// | `invalid`, `validation`, `malformed` | InvalidRequest |
/// | `internal`, `serviceunavailable`, `serviceerror` | ServiceError |
pub fn categorize_by_code(code: &str) -> ErrorCategory {
    const TABLE: &[(&[&str], ErrorCategory)] = &[
        (&["accessdenied", "unauthorized", "forbidden"], ErrorCategory::AccessDenied),
        (&["notfound", "nosuch", "doesnotexist"], ErrorCategory::NotFound),
        (&["throttl", "ratelimit", "toomanyrequests"], ErrorCategory::Throttling),
        (&["timeout", "timedout"], ErrorCategory::Timeout),
        (&["invalid", "validation", "malformed"], ErrorCategory::InvalidRequest),
        (&["internal", "serviceunavailable", "serviceerror"], ErrorCategory::ServiceError),
    ];

    let lower = code.to_lowercase();
    TABLE
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| lower.contains(needle)))
        .map(|(_, category)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}

/// Extract an error code
///
/// The service error code when there is one, the I/O error kind for I/O
/// failures, `"Error"` otherwise.
pub fn get_error_code(error: &anyhow::Error) -> String {
    if let Some(service) = find_in_chain::<ServiceError>(error.as_ref()) {
        return service.code.clone();
    }
    if let Some(io_err) = find_in_chain::<io::Error>(error.as_ref()) {
        return format!("{:?}", io_err.kind());
    }
    "Error".to_string()
}

/// Whether an error is transient by code
///
/// True for codes in [`RETRYABLE_ERROR_CODES`] and for I/O failures.
pub fn is_retryable(error: &anyhow::Error) -> bool {
    match find_in_chain::<ServiceError>(error.as_ref()) {
        Some(service) => RETRYABLE_ERROR_CODES.contains(&service.code.as_str()),
        None => find_in_chain::<io::Error>(error.as_ref()).is_some(),
    }
}

/// Everything the executor keeps from a failed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    /// Full source chain, only when there is more than one link
    pub chain: Option<String>,
}

impl ClassifiedError {
    pub fn from_error(error: &anyhow::Error) -> Self {
        let message = match find_in_chain::<ServiceError>(error.as_ref()) {
            Some(service) => service.message.clone(),
            None => format!("{:#}", error),
        };
        let chain = (error_chain_length(error.as_ref()) > 1).then(|| format_error_chain(error.as_ref()));

        Self {
            category: categorize(error),
            code: get_error_code(error),
            message,
            chain,
        }
    }

    /// Build directly from a code, for failures without an error object
    pub fn from_code(code: impl Into<String>, message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            chain: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(code: &str) -> anyhow::Error {
        anyhow::Error::new(ServiceError::new(code, "service said no"))
    }

    #[test]
    fn test_throttling_codes() {
        for code in ["Throttling", "ThrottlingException", "RequestLimitExceeded", "TooManyRequestsException", "RateExceeded"] {
            assert_eq!(categorize(&service(code)), ErrorCategory::Throttling, "code {}", code);
        }
    }

    #[test]
    fn test_access_denied_codes() {
        for code in ["AccessDenied", "AccessDeniedException", "UnauthorizedAccess"] {
            assert_eq!(categorize(&service(code)), ErrorCategory::AccessDenied, "code {}", code);
        }
    }

    #[test]
    fn test_not_found_codes() {
        for code in ["ResourceNotFoundException", "NoSuchEntity", "NoSuchBucket", "InvalidInstanceID.NotFound"] {
            assert_eq!(categorize(&service(code)), ErrorCategory::NotFound, "code {}", code);
        }
    }

    #[test]
    fn test_timeout_and_expired_token() {
        assert_eq!(categorize(&service("RequestTimeout")), ErrorCategory::Timeout);
        assert_eq!(categorize(&service("RequestTimeoutException")), ErrorCategory::Timeout);
        assert_eq!(categorize(&service("ExpiredToken")), ErrorCategory::ExpiredToken);
        assert_eq!(categorize(&service("ExpiredTokenException")), ErrorCategory::ExpiredToken);
    }

    #[test]
    fn test_other_service_codes_use_code_table() {
        assert_eq!(categorize(&service("ValidationException")), ErrorCategory::InvalidRequest);
        assert_eq!(categorize(&service("InternalError")), ErrorCategory::ServiceError);
        assert_eq!(categorize(&service("ServiceUnavailable")), ErrorCategory::ServiceError);
        assert_eq!(categorize(&service("OptInRequired")), ErrorCategory::Unknown);
    }

    #[test]
    fn test_service_error_behind_context() {
        let err = service("ThrottlingException").context("DescribeInstances in us-east-1");
        assert_eq!(categorize(&err), ErrorCategory::Throttling);
        assert_eq!(get_error_code(&err), "ThrottlingException");
    }

    #[test]
    fn test_io_errors_are_network() {
        let err = anyhow::Error::new(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(categorize(&err), ErrorCategory::Network);
        assert_eq!(get_error_code(&err), "ConnectionRefused");
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_unknown_errors() {
        let err = anyhow::anyhow!("something odd");
        assert_eq!(categorize(&err), ErrorCategory::Unknown);
        assert_eq!(get_error_code(&err), "Error");
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_categorize_by_code() {
        assert_eq!(categorize_by_code("AccessDenied"), ErrorCategory::AccessDenied);
        assert_eq!(categorize_by_code("Forbidden"), ErrorCategory::AccessDenied);
        assert_eq!(categorize_by_code("NoSuchKey"), ErrorCategory::NotFound);
        assert_eq!(categorize_by_code("StackDoesNotExist"), ErrorCategory::NotFound);
        assert_eq!(categorize_by_code("Throttled"), ErrorCategory::Throttling);
        assert_eq!(categorize_by_code("RateLimitExceeded"), ErrorCategory::Throttling);
        assert_eq!(categorize_by_code("ConnectionTimedOut"), ErrorCategory::Timeout);
        assert_eq!(categorize_by_code("MalformedPolicyDocument"), ErrorCategory::InvalidRequest);
        assert_eq!(categorize_by_code("InternalFailure"), ErrorCategory::ServiceError);
        assert_eq!(categorize_by_code("SomethingElse"), ErrorCategory::Unknown);
        assert_eq!(categorize_by_code(""), ErrorCategory::Unknown);
    }

    #[test]
    fn test_categorize_by_code_row_order() {
        // "unauthorized" beats "invalid"
        assert_eq!(categorize_by_code("InvalidUnauthorizedToken"), ErrorCategory::AccessDenied);
    }

    #[test]
    fn test_is_retryable_codes() {
        assert!(is_retryable(&service("SlowDown")));
        assert!(is_retryable(&service("ServiceUnavailable")));
        assert!(!is_retryable(&service("AccessDenied")));
        assert!(!is_retryable(&service("ValidationException")));
    }

    #[test]
    fn test_classified_error() {
        let err = service("AccessDenied").context("ListRoles");
        let classified = ClassifiedError::from_error(&err);

        assert_eq!(classified.category, ErrorCategory::AccessDenied);
        assert_eq!(classified.code, "AccessDenied");
        assert_eq!(classified.message, "service said no");
        assert!(classified.chain.unwrap().contains("Caused by: AccessDenied: service said no"));

        let plain = anyhow::anyhow!("boom");
        let classified = ClassifiedError::from_error(&plain);
        assert_eq!(classified.message, "boom");
        assert!(classified.chain.is_none());
    }
}
