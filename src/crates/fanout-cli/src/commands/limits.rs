//! `fanout limits`: effective rate limits per service

use anyhow::Result;
use fanout::rate_limit::SERVICE_RATE_LIMITS;
use fanout::{FanoutSettings, RateLimiterRegistry};
use std::collections::BTreeSet;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct LimitRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Requests/s")]
    requests_per_second: f64,
    #[tabled(rename = "Burst")]
    burst_size: u32,
    #[tabled(rename = "Wait timeout (s)")]
    wait_timeout: f64,
    #[tabled(rename = "Source")]
    source: &'static str,
}

fn row(settings: &FanoutSettings, registry: &RateLimiterRegistry, service: &str) -> LimitRow {
    let config = registry.config_for(service);
    LimitRow {
        service: service.to_string(),
        requests_per_second: config.requests_per_second,
        burst_size: config.burst_size,
        wait_timeout: config.wait_timeout.as_secs_f64(),
        source: if settings.rate_limits.contains_key(service) {
            "settings"
        } else {
            "built-in"
        },
    }
}

pub fn handle(settings: &FanoutSettings, service: Option<&str>) -> Result<()> {
    let services: BTreeSet<&str> = match service {
        Some(service) => BTreeSet::from([service]),
        None => SERVICE_RATE_LIMITS
            .iter()
            .map(|(name, _, _)| *name)
            .chain(settings.rate_limits.keys().map(String::as_str))
            .collect(),
    };

    let registry = settings.rate_limiter_registry();
    let rows: Vec<LimitRow> = services
        .into_iter()
        .map(|service| row(settings, &registry, service))
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}
