//! Collection of secondary failures inside a collector
//!
//! Some calls a collector makes are optional: a tag lookup or a policy read
//! that may fail without invalidating the whole task. Those failures are
//! recorded in an [`ErrorCollector`] instead of failing the task, then
//! reported alongside the main result.

use super::classify::{categorize, categorize_by_code, get_error_code, ServiceError};
use super::chain::find_in_chain;
use super::ErrorCategory;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info, warn};

/// How much a collected error matters to the audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Data for the resource is missing
    Critical,
    /// Data is partial
    Warning,
    /// Expected condition, e.g. a permission the role lacks
    Info,
    Debug,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Critical => "critical",
            ErrorSeverity::Warning => "warning",
            ErrorSeverity::Info => "info",
            ErrorSeverity::Debug => "debug",
        }
    }
}

/// Where a secondary error happened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectSite {
    pub account_id: String,
    pub account_name: String,
    pub region: String,
    pub operation: String,
    pub resource_id: Option<String>,
}

impl CollectSite {
    pub fn new(
        account_id: impl Into<String>,
        account_name: impl Into<String>,
        region: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            account_name: account_name.into(),
            region: region.into(),
            operation: operation.into(),
            resource_id: None,
        }
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }
}

/// One recorded secondary error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectedError {
    pub timestamp: DateTime<Utc>,
    pub account_id: String,
    pub account_name: String,
    pub region: String,
    pub service: String,
    pub operation: String,
    pub error_code: String,
    pub error_message: String,
    pub severity: ErrorSeverity,
    pub category: ErrorCategory,
    pub resource_id: Option<String>,
}

impl fmt::Display for CollectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}/{} - {}.{}: {}",
            self.severity.as_str().to_uppercase(),
            self.account_name,
            self.region,
            self.service,
            self.operation,
            self.error_code
        )
    }
}

/// Thread-safe accumulator of [`CollectedError`]s for one service
///
/// Shared by reference between the workers of an execution.
#[derive(Debug)]
pub struct ErrorCollector {
    service: String,
    errors: Mutex<Vec<CollectedError>>,
}

impl ErrorCollector {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Record an error object
    ///
    /// Access-denied errors are recorded at most at [`ErrorSeverity::Info`].
    pub fn collect(&self, err: &anyhow::Error, site: &CollectSite, severity: ErrorSeverity) {
        let category = categorize(err);
        let message = match find_in_chain::<ServiceError>(err.as_ref()) {
            Some(service) => service.message.clone(),
            None => format!("{:#}", err),
        };
        self.record(get_error_code(err), message, category, site, severity);
    }

    /// Record an error known only by its code
    pub fn collect_code(
        &self,
        code: impl Into<String>,
        message: impl Into<String>,
        site: &CollectSite,
        severity: ErrorSeverity,
    ) {
        let code = code.into();
        let category = categorize_by_code(&code);
        self.record(code, message.into(), category, site, severity);
    }

    fn record(
        &self,
        error_code: String,
        error_message: String,
        category: ErrorCategory,
        site: &CollectSite,
        severity: ErrorSeverity,
    ) {
        let severity = if category == ErrorCategory::AccessDenied {
            severity.max(ErrorSeverity::Info)
        } else {
            severity
        };

        let entry = CollectedError {
            timestamp: Utc::now(),
            account_id: site.account_id.clone(),
            account_name: site.account_name.clone(),
            region: site.region.clone(),
            service: self.service.clone(),
            operation: site.operation.clone(),
            error_code,
            error_message,
            severity,
            category,
            resource_id: site.resource_id.clone(),
        };

        match severity {
            ErrorSeverity::Critical => error!(error_message = %entry.error_message, "{}", entry),
            ErrorSeverity::Warning => warn!(error_message = %entry.error_message, "{}", entry),
            ErrorSeverity::Info => info!("{}", entry),
            ErrorSeverity::Debug => debug!("{}", entry),
        }

        self.errors.lock().push(entry);
    }

    /// Snapshot of everything recorded so far
    pub fn errors(&self) -> Vec<CollectedError> {
        self.errors.lock().clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    pub fn critical_errors(&self) -> Vec<CollectedError> {
        self.with_severity(ErrorSeverity::Critical)
    }

    pub fn warning_errors(&self) -> Vec<CollectedError> {
        self.with_severity(ErrorSeverity::Warning)
    }

    fn with_severity(&self, severity: ErrorSeverity) -> Vec<CollectedError> {
        self.errors
            .lock()
            .iter()
            .filter(|e| e.severity == severity)
            .cloned()
            .collect()
    }

    /// One-line summary, e.g. `3 errors (critical: 1, warning: 2)`
    pub fn summary(&self) -> String {
        let errors = self.errors.lock();
        if errors.is_empty() {
            return "no errors".to_string();
        }
        let critical = errors.iter().filter(|e| e.severity == ErrorSeverity::Critical).count();
        let warning = errors.iter().filter(|e| e.severity == ErrorSeverity::Warning).count();
        format!("{} errors (critical: {}, warning: {})", errors.len(), critical, warning)
    }

    /// Errors grouped by `"name (id)"`
    pub fn by_account(&self) -> BTreeMap<String, Vec<CollectedError>> {
        let mut grouped: BTreeMap<String, Vec<CollectedError>> = BTreeMap::new();
        for entry in self.errors.lock().iter() {
            let key = format!("{} ({})", entry.account_name, entry.account_id);
            grouped.entry(key).or_default().push(entry.clone());
        }
        grouped
    }

    pub fn clear(&self) {
        self.errors.lock().clear();
    }
}

/// Record into an optional collector
pub fn safe_collect(
    collector: Option<&ErrorCollector>,
    err: &anyhow::Error,
    site: &CollectSite,
    severity: ErrorSeverity,
) {
    if let Some(collector) = collector {
        collector.collect(err, site, severity);
    }
}

/// Run an optional call, falling back to `default` on failure
///
/// Failures are recorded as warnings when a collector is given.
///
/// # Example
///
/// ```rust
/// use fanout::error::{try_or_default, CollectSite, ErrorCollector};
///
/// let collector = ErrorCollector::new("ec2");
/// let site = CollectSite::new("111122223333", "prod", "us-east-1", "DescribeTags");
/// let tags: Vec<String> = try_or_default(
///     || Err(anyhow::anyhow!("tag lookup failed")),
///     Vec::new(),
///     Some(&collector),
///     &site,
/// );
/// assert!(tags.is_empty());
/// assert_eq!(collector.len(), 1);
/// ```
pub fn try_or_default<T, F>(
    f: F,
    default: T,
    collector: Option<&ErrorCollector>,
    site: &CollectSite,
) -> T
where
    F: FnOnce() -> anyhow::Result<T>,
{
    match f() {
        Ok(value) => value,
        Err(err) => {
            safe_collect(collector, &err, site, ErrorSeverity::Warning);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn site() -> CollectSite {
        CollectSite::new("111122223333", "prod", "us-east-1", "DescribeTags")
    }

    #[test]
    fn test_collect_service_error() {
        let collector = ErrorCollector::new("ec2");
        let err = anyhow::Error::new(ServiceError::new("ThrottlingException", "Rate exceeded"));
        collector.collect(&err, &site(), ErrorSeverity::Warning);

        let errors = collector.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_code, "ThrottlingException");
        assert_eq!(errors[0].error_message, "Rate exceeded");
        assert_eq!(errors[0].category, ErrorCategory::Throttling);
        assert_eq!(errors[0].service, "ec2");
    }

    #[test]
    fn test_access_denied_downgraded() {
        let collector = ErrorCollector::new("iam");
        let err = anyhow::Error::new(ServiceError::new("AccessDenied", "not authorized"));
        collector.collect(&err, &site(), ErrorSeverity::Critical);

        assert_eq!(collector.errors()[0].severity, ErrorSeverity::Info);
        assert!(collector.critical_errors().is_empty());
    }

    #[test]
    fn test_collect_code() {
        let collector = ErrorCollector::new("s3");
        collector.collect_code("NoSuchBucketPolicy", "no policy", &site().with_resource("logs-bucket"), ErrorSeverity::Debug);

        let entry = &collector.errors()[0];
        assert_eq!(entry.category, ErrorCategory::NotFound);
        assert_eq!(entry.resource_id.as_deref(), Some("logs-bucket"));
    }

    #[test]
    fn test_display() {
        let collector = ErrorCollector::new("ec2");
        collector.collect_code("InternalError", "oops", &site(), ErrorSeverity::Warning);
        assert_eq!(
            collector.errors()[0].to_string(),
            "[WARNING] prod/us-east-1 - ec2.DescribeTags: InternalError"
        );
    }

    #[test]
    fn test_summary() {
        let collector = ErrorCollector::new("ec2");
        assert_eq!(collector.summary(), "no errors");
        assert!(!collector.has_errors());

        collector.collect_code("InternalError", "a", &site(), ErrorSeverity::Critical);
        collector.collect_code("InternalError", "b", &site(), ErrorSeverity::Warning);
        collector.collect_code("InternalError", "c", &site(), ErrorSeverity::Warning);

        assert_eq!(collector.summary(), "3 errors (critical: 1, warning: 2)");
        assert_eq!(collector.warning_errors().len(), 2);

        collector.clear();
        assert!(collector.is_empty());
    }

    #[test]
    fn test_by_account() {
        let collector = ErrorCollector::new("ec2");
        collector.collect_code("X", "a", &site(), ErrorSeverity::Warning);
        collector.collect_code("X", "b", &CollectSite::new("444455556666", "dev", "eu-west-1", "Op"), ErrorSeverity::Warning);
        collector.collect_code("X", "c", &site(), ErrorSeverity::Warning);

        let grouped = collector.by_account();
        assert_eq!(grouped["prod (111122223333)"].len(), 2);
        assert_eq!(grouped["dev (444455556666)"].len(), 1);
    }

    #[test]
    fn test_concurrent_collect() {
        let collector = Arc::new(ErrorCollector::new("ec2"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let collector = Arc::clone(&collector);
                thread::spawn(move || {
                    for _ in 0..25 {
                        collector.collect_code("InternalError", "x", &site(), ErrorSeverity::Debug);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(collector.len(), 200);
    }

    #[test]
    fn test_try_or_default() {
        let collector = ErrorCollector::new("ec2");

        let value = try_or_default(|| Ok(7), 0, Some(&collector), &site());
        assert_eq!(value, 7);
        assert!(collector.is_empty());

        let value = try_or_default(|| Err(anyhow::anyhow!("nope")), 0, Some(&collector), &site());
        assert_eq!(value, 0);
        assert_eq!(collector.warning_errors().len(), 1);

        let value = try_or_default(|| Err(anyhow::anyhow!("nope")), 5, None, &site());
        assert_eq!(value, 5);
    }
}
