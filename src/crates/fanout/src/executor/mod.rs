//! Bounded parallel execution
//!
//! [`ParallelExecutor::execute`] expands the context into tasks and runs
//! them on a pool of scoped worker threads that lives only for the call.
//! Tasks travel to the workers over one channel and results come back over
//! another, so results are collected in completion order.
//!
//! ```text
//!             ┌──────────┐  tasks  ┌──────────┐ results ┌────────────┐
//! TaskBuilder ┤ producer ├────────▶│ worker×N ├────────▶│ collecting │──▶ ExecutionResult
//!             └──────────┘         └──────────┘         │   thread   │
//!                           limiter → session → retry   └────────────┘
//!                                                        progress hooks
//! ```
//!
//! Per task a worker waits for a rate-limiter token, opens the session and
//! runs the collector under the retry policy. Nothing a task does can fail
//! the execution: every error, including a panic, becomes a failed
//! [`TaskResult`].
//!
//! A caught panic still reaches the process panic hook, which prints to
//! stderr by default. Binaries that draw progress bars or run quiet can
//! install [`crate::logging::install_panic_hook`] to keep worker panics out
//! of the terminal.

mod config;

pub use config::{ParallelConfig, DEFAULT_MAX_WORKERS, MAX_WORKERS_LIMIT};

use crate::context::ExecutionContext;
use crate::error::{ClassifiedError, ErrorCategory};
use crate::logging::format_duration;
use crate::progress::ProgressTracker;
use crate::quiet;
use crate::rate_limit::{RateLimiter, RateLimiterRegistry};
use crate::result::{ExecutionResult, TaskError, TaskResult};
use crate::retry::run_with_retry;
use crate::task::{TaskBuilder, TaskSpec};
use crossbeam::channel::{self, Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Error code recorded when the worker machinery fails a task
pub const EXECUTOR_ERROR_CODE: &str = "ExecutorError";

/// Error code recorded when no rate-limiter token arrived in time
pub const RATE_LIMIT_TIMEOUT_CODE: &str = "RateLimitTimeout";

/// Name prefix of executor worker threads
pub const WORKER_THREAD_PREFIX: &str = "fanout-worker-";

/// Runs one collector across every task of a context
pub struct ParallelExecutor<'c, C> {
    ctx: &'c C,
    config: ParallelConfig,
    registry: Arc<RateLimiterRegistry>,
}

impl<'c, C: ExecutionContext> ParallelExecutor<'c, C> {
    /// Executor using the process-wide rate-limiter registry
    pub fn new(ctx: &'c C, config: ParallelConfig) -> Self {
        Self {
            ctx,
            config,
            registry: RateLimiterRegistry::global(),
        }
    }

    /// Use `registry` instead of the process-wide one
    pub fn with_registry(mut self, registry: Arc<RateLimiterRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &ParallelConfig {
        &self.config
    }

    /// Run `collector` for every task and gather the outcomes
    ///
    /// The collector receives `(session, identifier, display_name, region)`
    /// and is called concurrently from up to `max_workers` threads. Calls
    /// are rate-limited under the `service` limiter. `progress` sees
    /// `set_total` once and `on_complete` once per task, on this thread.
    pub fn execute<T, F>(
        &self,
        collector: F,
        service: &str,
        progress: Option<&dyn ProgressTracker>,
    ) -> ExecutionResult<T>
    where
        F: Fn(&C::Session, &str, &str, &str) -> anyhow::Result<T> + Sync,
        T: Send,
    {
        let tasks = TaskBuilder::new(self.ctx).build();
        if tasks.is_empty() {
            warn!(service = service, mode = %self.ctx.auth_mode(), "No tasks to execute");
            return ExecutionResult::default();
        }

        let total = tasks.len();
        if let Some(progress) = progress {
            progress.set_total(total);
        }

        let limiter = match self.config.rate_limiter() {
            Some(config) => self.registry.get_or_create_with(service, *config),
            None => self.registry.get_or_create(service),
        };
        let workers = self.config.max_workers().min(total);
        let quiet = quiet::inherit_quiet_state();
        let started = Instant::now();

        info!(
            service = service,
            tasks = total,
            max_workers = workers,
            mode = %self.ctx.auth_mode(),
            "Starting parallel execution"
        );

        let (task_tx, task_rx) = channel::unbounded();
        for task in tasks {
            if task_tx.send(task).is_err() {
                break;
            }
        }
        drop(task_tx);

        let mut results = thread::scope(|scope| {
            let (result_tx, result_rx) = channel::unbounded();

            for index in 0..workers {
                let worker = Worker {
                    executor: self,
                    collector: &collector,
                    limiter: &limiter,
                    service,
                    tasks: task_rx.clone(),
                    results: result_tx.clone(),
                };
                let spawned = thread::Builder::new()
                    .name(format!("{}{}", WORKER_THREAD_PREFIX, index))
                    .spawn_scoped(scope, move || {
                        quiet::set_quiet(quiet);
                        worker.run();
                    });
                if let Err(err) = spawned {
                    error!(service = service, worker = index, error = %err, "Failed to spawn worker thread");
                }
            }
            drop(result_tx);

            let mut results = Vec::with_capacity(total);
            for result in result_rx.iter() {
                if let Some(progress) = progress {
                    progress.on_complete(result.is_success());
                }
                results.push(result);
            }
            results
        });

        results.extend(fail_unclaimed(&task_rx, started, progress));

        let result = ExecutionResult::new(results);
        info!(
            service = service,
            success = result.success_count(),
            failed = result.error_count(),
            elapsed = %format_duration(started.elapsed()),
            "Parallel execution finished"
        );
        result
    }

    fn run_task<T, F>(
        &self,
        task: TaskSpec<'c, C::Session>,
        collector: &F,
        limiter: &RateLimiter,
        service: &str,
        started: Instant,
    ) -> TaskResult<T>
    where
        F: Fn(&C::Session, &str, &str, &str) -> anyhow::Result<T>,
    {
        let label = task.label();

        if !limiter.acquire(1) {
            warn!(task = %label, service = service, "Timed out waiting for rate limiter");
            let err = TaskError::new(
                task.identifier,
                task.region,
                ErrorCategory::Throttling,
                RATE_LIMIT_TIMEOUT_CODE,
                "Rate limiter timeout",
            );
            return TaskResult::failure(err, started.elapsed());
        }

        let session = match task.open_session() {
            Ok(session) => session,
            Err(err) => {
                let classified = ClassifiedError::from_error(&err);
                debug!(task = %label, code = %classified.code, "Failed to open session");
                let err = TaskError::from_classified(task.identifier, task.region, classified, 0);
                return TaskResult::failure(err, started.elapsed());
            }
        };

        let outcome = run_with_retry(self.config.retry(), &label, |_| {
            collector(&session, &task.identifier, &task.display_name, &task.region)
        });

        match outcome.result {
            Ok(data) => TaskResult::success(task.identifier, task.region, data, started.elapsed()),
            Err(classified) => {
                debug!(
                    task = %label,
                    category = %classified.category,
                    code = %classified.code,
                    retries = outcome.retries,
                    "Task failed"
                );
                let err = TaskError::from_classified(task.identifier, task.region, classified, outcome.retries);
                TaskResult::failure(err, started.elapsed())
            }
        }
    }
}

/// State one worker thread needs
struct Worker<'e, 'c, C: ExecutionContext, F, T> {
    executor: &'e ParallelExecutor<'c, C>,
    collector: &'e F,
    limiter: &'e RateLimiter,
    service: &'e str,
    tasks: Receiver<TaskSpec<'c, C::Session>>,
    results: Sender<TaskResult<T>>,
}

impl<'c, C, F, T> Worker<'_, 'c, C, F, T>
where
    C: ExecutionContext,
    F: Fn(&C::Session, &str, &str, &str) -> anyhow::Result<T>,
{
    fn run(self) {
        for task in self.tasks.iter() {
            let result = self.run_guarded(task);
            if self.results.send(result).is_err() {
                break;
            }
        }
    }

    fn run_guarded(&self, task: TaskSpec<'c, C::Session>) -> TaskResult<T> {
        let started = Instant::now();
        let identifier = task.identifier.clone();
        let region = task.region.clone();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.executor
                .run_task(task, self.collector, self.limiter, self.service, started)
        }));

        outcome.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!(task = %format!("{}/{}", identifier, region), panic = %message, "Task panicked");
            let err = TaskError::new(identifier, region, ErrorCategory::Unknown, EXECUTOR_ERROR_CODE, message);
            TaskResult::failure(err, started.elapsed())
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("task panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("task panicked: {}", message)
    } else {
        "task panicked".to_string()
    }
}

/// Build an executor and run `collector` in one call
///
/// # Example
///
/// ```rust
/// use fanout::{run_parallel, AuditContext, SessionRequest};
///
/// let ctx = AuditContext::profiles(vec!["dev".into(), "prod".into()], |req: &SessionRequest<'_>| -> anyhow::Result<String> {
///     Ok(req.identity.to_string())
/// })
/// .with_regions(vec!["us-east-1".into(), "eu-west-1".into()]);
///
/// let result = run_parallel(&ctx, |session, _id, _name, region| Ok(format!("{}@{}", session, region)), 4, "sts", None)?;
/// assert_eq!(result.success_count(), 4);
/// # Ok::<(), fanout::FanoutError>(())
/// ```
pub fn run_parallel<C, T, F>(
    ctx: &C,
    collector: F,
    max_workers: usize,
    service: &str,
    progress: Option<&dyn ProgressTracker>,
) -> crate::Result<ExecutionResult<T>>
where
    C: ExecutionContext,
    F: Fn(&C::Session, &str, &str, &str) -> anyhow::Result<T> + Sync,
    T: Send,
{
    let config = ParallelConfig::new(max_workers)?;
    Ok(ParallelExecutor::new(ctx, config).execute(collector, service, progress))
}

/// Fail every task still queued in `tasks`
///
/// Only non-empty when workers could not be spawned.
fn fail_unclaimed<S, T>(
    tasks: &Receiver<TaskSpec<'_, S>>,
    started: Instant,
    progress: Option<&dyn ProgressTracker>,
) -> Vec<TaskResult<T>> {
    tasks
        .try_iter()
        .map(|task| {
            if let Some(progress) = progress {
                progress.on_complete(false);
            }
            TaskResult::failure(
                TaskError::new(
                    task.identifier,
                    task.region,
                    ErrorCategory::Unknown,
                    EXECUTOR_ERROR_CODE,
                    "task was not picked up by any worker",
                ),
                started.elapsed(),
            )
        })
        .collect()
}
