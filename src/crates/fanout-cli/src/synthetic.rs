//! Synthetic sessions and collector for dry runs

use anyhow::{ensure, Result};
use fanout::{Gathered, ServiceError, SessionRequest};
use rand::Rng;
use std::thread;
use std::time::Duration;

/// Stand-in for an AWS session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedSession {
    pub identity: String,
    pub role: Option<String>,
    pub region: String,
}

pub fn open_session(request: &SessionRequest<'_>) -> anyhow::Result<SimulatedSession> {
    Ok(SimulatedSession {
        identity: request.identity.to_string(),
        role: request.role.map(str::to_string),
        region: request.region.to_string(),
    })
}

/// Failure mix and latency of the synthetic collector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Simulation {
    pub fail_rate: f64,
    pub throttle_rate: f64,
    pub latency: Duration,
}

impl Simulation {
    pub fn new(fail_rate: f64, throttle_rate: f64, latency: Duration) -> Result<Self> {
        ensure!((0.0..=1.0).contains(&fail_rate), "--fail-rate must be within 0..=1, got {}", fail_rate);
        ensure!(
            (0.0..=1.0).contains(&throttle_rate),
            "--throttle-rate must be within 0..=1, got {}",
            throttle_rate
        );
        Ok(Self {
            fail_rate,
            throttle_rate,
            latency,
        })
    }

    /// One collector call
    ///
    /// Fails with `AccessDenied` at `fail_rate`, with `Throttling` at
    /// `throttle_rate`, otherwise lists a few fake resource ids.
    pub fn collect(&self, session: &SimulatedSession, service: &str) -> anyhow::Result<Gathered<String>> {
        let mut rng = rand::thread_rng();
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        if rng.gen_bool(self.fail_rate) {
            return Err(ServiceError::new(
                "AccessDenied",
                format!("{} is not authorized to call {}", session.identity, service),
            )
            .with_operation(service, "List")
            .into());
        }
        if rng.gen_bool(self.throttle_rate) {
            return Err(ServiceError::new("Throttling", "Rate exceeded")
                .with_operation(service, "List")
                .into());
        }

        let count = rng.gen_range(0..4);
        let ids = (0..count)
            .map(|_| format!("{}-{}-{:08x}", service, session.region, rng.gen::<u32>()))
            .collect::<Vec<_>>();
        Ok(match ids.len() {
            1 => Gathered::One(ids.into_iter().next().unwrap_or_default()),
            _ => Gathered::Many(ids),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout::error::{categorize, ErrorCategory};
    use fanout::FlatData;

    fn session() -> SimulatedSession {
        open_session(&SessionRequest {
            identity: "111122223333",
            role: Some("Audit"),
            region: "us-east-1",
        })
        .unwrap()
    }

    #[test]
    fn test_open_session() {
        let session = session();
        assert_eq!(session.role.as_deref(), Some("Audit"));
        assert_eq!(session.region, "us-east-1");
    }

    #[test]
    fn test_rates_are_validated() {
        assert!(Simulation::new(1.5, 0.0, Duration::ZERO).is_err());
        assert!(Simulation::new(0.0, -0.1, Duration::ZERO).is_err());
        assert!(Simulation::new(1.0, 1.0, Duration::ZERO).is_ok());
    }

    #[test]
    fn test_always_fail() {
        let sim = Simulation::new(1.0, 0.0, Duration::ZERO).unwrap();
        let err = sim.collect(&session(), "ec2").unwrap_err();
        assert_eq!(categorize(&err), ErrorCategory::AccessDenied);
    }

    #[test]
    fn test_always_throttle() {
        let sim = Simulation::new(0.0, 1.0, Duration::ZERO).unwrap();
        let err = sim.collect(&session(), "ec2").unwrap_err();
        assert_eq!(categorize(&err), ErrorCategory::Throttling);
    }

    #[test]
    fn test_success_lists_resources() {
        let sim = Simulation::new(0.0, 0.0, Duration::ZERO).unwrap();
        let mut ids = Vec::new();
        sim.collect(&session(), "ec2").unwrap().flatten_into(&mut ids);
        assert!(ids.len() < 4);
        assert!(ids.iter().all(|id| id.starts_with("ec2-us-east-1-")));
    }
}
