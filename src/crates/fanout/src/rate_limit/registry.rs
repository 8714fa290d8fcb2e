//! Per-service limiter registry

use super::{RateLimiter, RateLimiterConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

/// Default `(requests_per_second, burst_size)` per AWS service
///
/// Services not listed fall back to the `default` row.
pub const SERVICE_RATE_LIMITS: &[(&str, f64, u32)] = &[
    ("default", 10.0, 20),
    ("ec2", 20.0, 40),
    ("iam", 10.0, 20),
    ("organizations", 4.0, 8),
    ("sts", 10.0, 20),
    ("s3", 50.0, 100),
    ("cloudwatch", 20.0, 40),
    ("logs", 10.0, 20),
    ("lambda", 10.0, 20),
    ("rds", 10.0, 20),
    ("dynamodb", 20.0, 40),
    ("apigateway", 5.0, 10),
    ("efs", 10.0, 20),
    ("elb", 10.0, 20),
    ("kinesis", 5.0, 10),
    ("sqs", 20.0, 40),
    ("sns", 20.0, 40),
    ("kms", 20.0, 40),
    ("fsx", 5.0, 10),
    ("route53", 5.0, 10),
    ("cloudfront", 5.0, 10),
];

/// Built-in limiter settings for `service`
pub fn service_config(service: &str) -> RateLimiterConfig {
    let lookup = |name: &str| {
        SERVICE_RATE_LIMITS
            .iter()
            .find(|(row, _, _)| *row == name)
            .map(|(_, rps, burst)| (*rps, *burst))
    };
    let (requests_per_second, burst_size) = lookup(service)
        .or_else(|| lookup("default"))
        .unwrap_or((10.0, 20));

    RateLimiterConfig {
        requests_per_second,
        burst_size,
        wait_timeout: Duration::from_secs(30),
    }
}

/// Hands out one shared [`RateLimiter`] per service name
///
/// Lookup and insertion happen under one lock, so concurrent first calls
/// for a service get the same limiter.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
    overrides: HashMap<String, RateLimiterConfig>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose limiters use `overrides` instead of the built-in table
    pub fn with_overrides(overrides: HashMap<String, RateLimiterConfig>) -> Self {
        Self {
            limiters: Mutex::new(HashMap::new()),
            overrides,
        }
    }

    /// Process-wide registry used when none is injected
    pub fn global() -> Arc<RateLimiterRegistry> {
        static GLOBAL: OnceLock<Arc<RateLimiterRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(RateLimiterRegistry::new())))
    }

    /// Settings a new limiter for `service` would get
    pub fn config_for(&self, service: &str) -> RateLimiterConfig {
        self.overrides
            .get(service)
            .copied()
            .unwrap_or_else(|| service_config(service))
    }

    pub fn get_or_create(&self, service: &str) -> Arc<RateLimiter> {
        self.get_or_create_with(service, self.config_for(service))
    }

    /// Get the limiter for `service`, creating it from `config` if absent
    ///
    /// An existing limiter is returned unchanged even if `config` differs.
    pub fn get_or_create_with(&self, service: &str, config: RateLimiterConfig) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock();
        if let Some(existing) = limiters.get(service) {
            if existing.config() != &config {
                debug!(service = service, "Keeping existing rate limiter with different settings");
            }
            return Arc::clone(existing);
        }

        debug!(
            service = service,
            requests_per_second = config.requests_per_second,
            burst_size = config.burst_size,
            "Creating rate limiter"
        );
        let limiter = Arc::new(RateLimiter::new(config));
        limiters.insert(service.to_string(), Arc::clone(&limiter));
        limiter
    }

    /// Drop every limiter; the next lookup creates fresh ones
    pub fn reset_all(&self) {
        self.limiters.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.limiters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.lock().is_empty()
    }
}

/// Limiter for `service` from the process-wide registry
pub fn get_rate_limiter(service: &str) -> Arc<RateLimiter> {
    RateLimiterRegistry::global().get_or_create(service)
}

/// Clear the process-wide registry
pub fn reset_rate_limiters() {
    RateLimiterRegistry::global().reset_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_service_table() {
        let ec2 = service_config("ec2");
        assert_eq!(ec2.requests_per_second, 20.0);
        assert_eq!(ec2.burst_size, 40);

        let iam = service_config("iam");
        assert_eq!(iam.requests_per_second, 10.0);
        assert_eq!(iam.burst_size, 20);

        let orgs = service_config("organizations");
        assert!(orgs.requests_per_second <= 5.0);
        assert!(orgs.burst_size <= 10);

        let unknown = service_config("some-new-service");
        assert_eq!(unknown.requests_per_second, 10.0);
        assert_eq!(unknown.burst_size, 20);
    }

    #[test]
    fn test_table_rows_are_valid() {
        for (service, _, _) in SERVICE_RATE_LIMITS {
            assert!(service_config(service).validate().is_ok(), "service {}", service);
        }
    }

    #[test]
    fn test_same_service_same_limiter() {
        let registry = RateLimiterRegistry::new();
        let a = registry.get_or_create("ec2");
        let b = registry.get_or_create("ec2");
        let c = registry.get_or_create("iam");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_get_or_create_with_keeps_existing() {
        let registry = RateLimiterRegistry::new();
        let custom = RateLimiterConfig::new(1.0, 1, Duration::from_secs(1)).unwrap();
        let first = registry.get_or_create_with("s3", custom);
        let second = registry.get_or_create_with("s3", RateLimiterConfig::default());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.config().burst_size, 1);
    }

    #[test]
    fn test_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert("ec2".to_string(), RateLimiterConfig::new(2.0, 3, Duration::from_secs(5)).unwrap());
        let registry = RateLimiterRegistry::with_overrides(overrides);

        assert_eq!(registry.get_or_create("ec2").config().burst_size, 3);
        assert_eq!(registry.get_or_create("iam").config().burst_size, 20);
    }

    #[test]
    fn test_reset_all() {
        let registry = RateLimiterRegistry::new();
        let before = registry.get_or_create("ec2");
        registry.reset_all();
        assert!(registry.is_empty());

        let after = registry.get_or_create("ec2");
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_concurrent_first_calls_share_limiter() {
        let registry = Arc::new(RateLimiterRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.get_or_create("dynamodb"))
            })
            .collect();

        let limiters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(limiters.iter().all(|l| Arc::ptr_eq(l, &limiters[0])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_global_registry() {
        let a = get_rate_limiter("registry-test-service");
        let b = get_rate_limiter("registry-test-service");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&RateLimiterRegistry::global(), &RateLimiterRegistry::global()));
    }
}
