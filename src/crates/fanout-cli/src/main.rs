//! # fanout
//!
//! Plan and simulate parallel multi-account audits from the command line.

mod commands;
mod context_file;
mod progress;
mod synthetic;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use fanout::logging::{self, LogOptions};
use fanout::{quiet, FanoutSettings};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "fanout")]
#[command(about = "Plan and simulate parallel multi-account, multi-region executions", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "FANOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tasks a context file expands into
    Plan {
        /// Context file
        #[arg(long)]
        context: PathBuf,
    },

    /// Print the effective rate limits
    Limits {
        /// Only this service
        #[arg(short, long)]
        service: Option<String>,
    },

    /// Run the executor with a synthetic collector
    Simulate {
        /// Context file
        #[arg(long)]
        context: PathBuf,

        /// Service whose rate limiter is used
        #[arg(short, long, default_value = "ec2")]
        service: String,

        /// Probability that a call fails with AccessDenied
        #[arg(long, default_value_t = 0.0)]
        fail_rate: f64,

        /// Probability that a call is throttled
        #[arg(long, default_value_t = 0.0)]
        throttle_rate: f64,

        /// Latency of every call in milliseconds
        #[arg(long, default_value_t = 50)]
        latency_ms: u64,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn run(cli: Cli) -> Result<()> {
    logging::init(LogOptions {
        verbosity: cli.verbose,
        ..Default::default()
    })?;
    logging::install_panic_hook();
    if cli.quiet {
        quiet::set_quiet(true);
    }

    let settings = FanoutSettings::resolve(cli.config.as_deref()).context("failed to load settings")?;

    match cli.command {
        Commands::Plan { context } => commands::plan::handle(&context),
        Commands::Limits { service } => commands::limits::handle(&settings, service.as_deref()),
        Commands::Simulate {
            context,
            service,
            fail_rate,
            throttle_rate,
            latency_ms,
            json,
        } => commands::simulate::handle(
            &settings,
            commands::simulate::SimulateArgs {
                context: &context,
                service: &service,
                fail_rate,
                throttle_rate,
                latency_ms,
                json,
            },
        ),
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
