//! `fanout simulate`: run the executor against synthetic sessions

use crate::context_file::ContextFile;
use crate::progress::ProgressBarTracker;
use crate::synthetic::{open_session, Simulation};
use anyhow::{Context, Result};
use colored::Colorize;
use fanout::error::format_error_for_user;
use fanout::{quiet, FanoutSettings, ParallelExecutor};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Failures listed per category in the text report
const ERRORS_PER_CATEGORY: usize = 3;

pub struct SimulateArgs<'a> {
    pub context: &'a Path,
    pub service: &'a str,
    pub fail_rate: f64,
    pub throttle_rate: f64,
    pub latency_ms: u64,
    pub json: bool,
}

pub fn handle(settings: &FanoutSettings, args: SimulateArgs<'_>) -> Result<()> {
    let simulation = Simulation::new(args.fail_rate, args.throttle_rate, Duration::from_millis(args.latency_ms))?;
    let ctx = ContextFile::load(args.context)?.into_context(open_session);
    let config = settings.to_parallel_config().context("invalid executor settings")?;
    let executor = ParallelExecutor::new(&ctx, config).with_registry(settings.rate_limiter_registry());

    let tracker = if args.json || quiet::is_quiet() {
        ProgressBarTracker::hidden()
    } else {
        ProgressBarTracker::new(args.service)
    };

    info!(service = args.service, "Starting simulation");
    let result = executor.execute(
        |session, _, _, _| simulation.collect(session, args.service),
        args.service,
        Some(&tracker),
    );
    tracker.finish();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.summary())?);
        return Ok(());
    }

    let resources = result.get_flat_data();
    println!(
        "{} {} succeeded, {} {} failed, {} resource(s) in {:.0}ms",
        "✓".green(),
        result.success_count(),
        "✗".red(),
        result.error_count(),
        resources.len(),
        result.total_duration_ms()
    );

    if result.has_any_failure() {
        println!();
        println!("{}", result.get_error_summary(ERRORS_PER_CATEGORY).yellow());
        println!();
        for error in result.get_errors().into_iter().take(ERRORS_PER_CATEGORY) {
            println!("  {} {}/{}: {}", "•".red(), error.identifier, error.region, format_error_for_user(error));
        }
    }
    Ok(())
}
