//! Shared helpers for integration tests

#![allow(dead_code)]

use fanout::{
    Account, AuditContext, ParallelConfig, ParallelExecutor, RateLimiterConfig, RateLimiterRegistry,
    RetryPolicy, RoleSelection, ServiceError, SessionRequest,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub type Provider = fn(&SessionRequest<'_>) -> anyhow::Result<String>;
pub type TestContext = AuditContext<Provider>;

/// Session is `identity|role|region`
pub fn describe_session(req: &SessionRequest<'_>) -> anyhow::Result<String> {
    Ok(format!("{}|{}|{}", req.identity, req.role.unwrap_or("-"), req.region))
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn profile_context(profiles: &[&str], regions: &[&str]) -> TestContext {
    AuditContext::profiles(strings(profiles), describe_session as Provider).with_regions(strings(regions))
}

pub fn federated_context(accounts: &[(&str, &str)], roles: RoleSelection, regions: &[&str]) -> TestContext {
    let accounts = accounts.iter().map(|(id, name)| Account::new(*id, *name)).collect();
    AuditContext::federated(accounts, roles, describe_session as Provider).with_regions(strings(regions))
}

/// Retries with millisecond delays
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries)
        .with_base_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(5))
}

/// Registry that never throttles `service`
pub fn unlimited_registry(service: &str) -> Arc<RateLimiterRegistry> {
    let mut overrides = HashMap::new();
    overrides.insert(
        service.to_string(),
        RateLimiterConfig::new(10_000.0, 10_000, Duration::from_secs(5)).unwrap(),
    );
    Arc::new(RateLimiterRegistry::with_overrides(overrides))
}

pub fn executor<'c>(ctx: &'c TestContext, workers: usize, retries: u32, service: &str) -> ParallelExecutor<'c, TestContext> {
    let config = ParallelConfig::new(workers).unwrap().with_retry(fast_retry(retries)).unwrap();
    ParallelExecutor::new(ctx, config).with_registry(unlimited_registry(service))
}

pub fn service_error(code: &str) -> anyhow::Error {
    ServiceError::new(code, format!("{} raised by test", code))
        .with_operation("ec2", "DescribeInstances")
        .into()
}
