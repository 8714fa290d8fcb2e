//! Task outcomes and the aggregated execution result

use crate::error::{ClassifiedError, ErrorCategory};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// A categorized task failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskError {
    /// Account id or profile name
    pub identifier: String,
    pub region: String,
    pub category: ErrorCategory,
    pub error_code: String,
    pub message: String,
    /// Retries performed before giving up
    pub retries: u32,
    pub timestamp: DateTime<Utc>,
    /// Formatted source chain of the last error, when it had more than one link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause_chain: Option<String>,
}

impl TaskError {
    pub fn new(
        identifier: impl Into<String>,
        region: impl Into<String>,
        category: ErrorCategory,
        error_code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            region: region.into(),
            category,
            error_code: error_code.into(),
            message: message.into(),
            retries: 0,
            timestamp: Utc::now(),
            cause_chain: None,
        }
    }

    pub fn from_classified(
        identifier: impl Into<String>,
        region: impl Into<String>,
        classified: ClassifiedError,
        retries: u32,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            region: region.into(),
            category: classified.category,
            error_code: classified.code,
            message: classified.message,
            retries,
            timestamp: Utc::now(),
            cause_chain: classified.chain,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Whether the category is transient by the default retry table
    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {}: {}",
            self.identifier, self.region, self.error_code, self.message
        )
    }
}

/// Outcome of one (identifier, region) task
///
/// Holds either the collector's data or a [`TaskError`], never both.
#[derive(Debug, Clone)]
pub struct TaskResult<T> {
    identifier: String,
    region: String,
    duration: Duration,
    outcome: Result<T, TaskError>,
}

impl<T> TaskResult<T> {
    pub fn success(identifier: impl Into<String>, region: impl Into<String>, data: T, duration: Duration) -> Self {
        Self {
            identifier: identifier.into(),
            region: region.into(),
            duration,
            outcome: Ok(data),
        }
    }

    /// Failed task; identifier and region are taken from the error
    pub fn failure(error: TaskError, duration: Duration) -> Self {
        Self {
            identifier: error.identifier.clone(),
            region: error.region.clone(),
            duration,
            outcome: Err(error),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.outcome.as_ref().err()
    }

    pub fn into_data(self) -> Option<T> {
        self.outcome.ok()
    }

    pub fn outcome(&self) -> &Result<T, TaskError> {
        &self.outcome
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration.as_nanos() as f64 / 1_000_000.0
    }
}

impl<T> fmt::Display for TaskResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_success() { "OK" } else { "FAIL" };
        write!(
            f,
            "[{}/{}] {} ({:.0}ms)",
            self.identifier,
            self.region,
            status,
            self.duration_ms()
        )
    }
}

/// Collector output that can be flattened across tasks
pub trait FlatData {
    type Item;

    fn flatten_into(&self, out: &mut Vec<Self::Item>);
}

impl<T: Clone> FlatData for Vec<T> {
    type Item = T;

    fn flatten_into(&self, out: &mut Vec<T>) {
        out.extend(self.iter().cloned());
    }
}

/// Collector output that is sometimes one item, sometimes many
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Gathered<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> FlatData for Gathered<T> {
    type Item = T;

    fn flatten_into(&self, out: &mut Vec<T>) {
        match self {
            Gathered::One(item) => out.push(item.clone()),
            Gathered::Many(items) => out.extend(items.iter().cloned()),
        }
    }
}

/// Serializable overview of an execution
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub total_duration_ms: f64,
    pub errors: Vec<TaskError>,
}

/// Immutable aggregate of every task outcome of one execution
///
/// Counts are computed once at construction.
#[derive(Debug, Clone)]
pub struct ExecutionResult<T> {
    results: Vec<TaskResult<T>>,
    success_count: usize,
    error_count: usize,
}

impl<T> Default for ExecutionResult<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> From<Vec<TaskResult<T>>> for ExecutionResult<T> {
    fn from(results: Vec<TaskResult<T>>) -> Self {
        Self::new(results)
    }
}

impl<T> ExecutionResult<T> {
    pub fn new(results: Vec<TaskResult<T>>) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        let error_count = results.len() - success_count;
        Self {
            results,
            success_count,
            error_count,
        }
    }

    /// Results in completion order
    pub fn results(&self) -> &[TaskResult<T>] {
        &self.results
    }

    pub fn total_count(&self) -> usize {
        self.results.len()
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn successful(&self) -> impl Iterator<Item = &TaskResult<T>> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskResult<T>> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// Sum of task durations, not wall-clock time
    pub fn total_duration_ms(&self) -> f64 {
        self.results.iter().map(TaskResult::duration_ms).sum()
    }

    pub fn has_any_success(&self) -> bool {
        self.success_count > 0
    }

    pub fn has_any_failure(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_failures_only(&self) -> bool {
        self.success_count == 0 && self.error_count > 0
    }

    /// Data of every successful task
    pub fn get_data(&self) -> Vec<&T> {
        self.results.iter().filter_map(TaskResult::data).collect()
    }

    pub fn into_data(self) -> Vec<T> {
        self.results.into_iter().filter_map(TaskResult::into_data).collect()
    }

    /// Data of every successful task, concatenated
    pub fn get_flat_data(&self) -> Vec<T::Item>
    where
        T: FlatData,
    {
        let mut out = Vec::new();
        for data in self.results.iter().filter_map(TaskResult::data) {
            data.flatten_into(&mut out);
        }
        out
    }

    pub fn get_errors(&self) -> Vec<&TaskError> {
        self.results.iter().filter_map(TaskResult::error).collect()
    }

    pub fn get_errors_by_category(&self) -> BTreeMap<ErrorCategory, Vec<&TaskError>> {
        let mut grouped: BTreeMap<ErrorCategory, Vec<&TaskError>> = BTreeMap::new();
        for error in self.results.iter().filter_map(TaskResult::error) {
            grouped.entry(error.category).or_default().push(error);
        }
        grouped
    }

    /// Multi-line failure report grouped by category
    ///
    /// Empty when nothing failed. At most `max_per_category` errors are
    /// listed per category, the rest are counted as `+N more`.
    pub fn get_error_summary(&self, max_per_category: usize) -> String {
        if self.error_count == 0 {
            return String::new();
        }

        let mut lines = vec![format!("{} task(s) failed", self.error_count)];
        for (category, errors) in self.get_errors_by_category() {
            lines.push(format!("  [{}] {}", category, errors.len()));
            for error in errors.iter().take(max_per_category) {
                lines.push(format!(
                    "    - {}/{}: {}",
                    error.identifier, error.region, error.error_code
                ));
            }
            if errors.len() > max_per_category {
                lines.push(format!("    +{} more", errors.len() - max_per_category));
            }
        }
        lines.join("\n")
    }

    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            total: self.total_count(),
            success: self.success_count,
            failed: self.error_count,
            total_duration_ms: self.total_duration_ms(),
            errors: self.get_errors().into_iter().cloned().collect(),
        }
    }
}
