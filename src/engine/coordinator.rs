//! Run coordination: fan executions out over a fresh worker pool, then wait
//! for the pool to drain within the configured timeout.
//!
//! A run moves through `Idle → Submitting → Draining` and ends in exactly one
//! of `Terminated`, `TimedOut` or `Interrupted`. Every `(execution, thread)`
//! pair becomes one pool task and all tasks are queued before waiting starts,
//! so executions overlap each other as far as the pool size allows.
//!
//! The timeout is cooperative. When it fires the coordinator stops waiting and
//! reports the failure; tasks still running are left to finish on their own.

#![allow(missing_docs)]

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::config::ConcurrencySettings;
use crate::core::errors::{LoadError, Result};
use crate::engine::allocator::IterationAllocator;
use crate::engine::interrupt::InterruptHandle;
use crate::engine::pool::{FailureHook, TaskFailure, Termination, WorkerPool};
use crate::logger::jsonl::{EventLog, EventType, LogEntry, Severity};

/// Default worker count.
pub const DEFAULT_THREADS: usize = 1;
/// Default wait bound for a run, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

// ──────────────────── plan ────────────────────

/// Resolved thread count and timeout for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyPlan {
    pub threads: usize,
    pub timeout_secs: u64,
}

impl Default for ConcurrencyPlan {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ConcurrencyPlan {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ──────────────────── configuration set ────────────────────

/// Configuration instances keyed by their type.
///
/// Executions use it to find the configuration they need at run time, e.g.
/// the [`ConcurrencyConfig`] whose allocator splits their iterations.
#[derive(Default)]
pub struct ConfigurationSet {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ConfigurationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Store `value`, replacing any previous entry of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let entry = Arc::clone(self.entries.get(&TypeId::of::<T>())?);
        entry.downcast::<T>().ok()
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ConfigurationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationSet")
            .field("entries", &self.entries.len())
            .finish()
    }
}

// ──────────────────── execution ────────────────────

/// One unit of work, run once per worker thread index.
///
/// The scenario and assertions are passed through untouched; what they mean
/// is up to the implementation.
pub trait Execution<S, A>: Send + Sync {
    fn execute(
        &self,
        thread_index: usize,
        scenario: &S,
        configurations: &ConfigurationSet,
        assertions: &[A],
    ) -> Result<()>;
}

// ──────────────────── run state ────────────────────

/// Where a coordinator is in its current (or last) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Submitting,
    Draining,
    Terminated,
    TimedOut,
    Interrupted,
}

impl RunPhase {
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Submitting | Self::Draining)
    }
}

/// Summary of a run that terminated within its timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub phase: RunPhase,
    pub threads: usize,
    pub executions: usize,
    pub tasks_submitted: usize,
    pub tasks_completed: usize,
    /// Tasks that returned an error or panicked. These do not fail the run.
    pub tasks_failed: usize,
    pub elapsed_ms: u64,
}

// ──────────────────── coordinator ────────────────────

/// Thread count, timeout and iteration split for load runs, plus the `submit`
/// entry point that executes them.
///
/// Built with chained setters:
///
/// ```rust,no_run
/// use std::time::Duration;
/// use loadcore::engine::coordinator::ConcurrencyConfig;
///
/// # fn main() -> loadcore::core::errors::Result<()> {
/// let config = ConcurrencyConfig::new()
///     .threads(4)?
///     .timeout(Duration::from_secs(30))?;
/// assert_eq!(config.nb_iterations_for_thread(0, 10)?, 3);
/// # Ok(())
/// # }
/// ```
///
/// No pool exists until `submit` runs; each run gets a pool sized to the
/// thread count at that moment, and the pool is drained before `submit`
/// returns or gives up waiting.
#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    plan: ConcurrencyPlan,
    allocator: Arc<IterationAllocator>,
    interrupt: InterruptHandle,
    events: Option<EventLog>,
    phase: Arc<Mutex<RunPhase>>,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            plan: ConcurrencyPlan::default(),
            allocator: Arc::new(single_thread_allocator()),
            interrupt: InterruptHandle::new(),
            events: None,
            phase: Arc::new(Mutex::new(RunPhase::Idle)),
        }
    }
}

impl ConcurrencyConfig {
    /// One thread, 600-second timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[concurrency]` section of the config file.
    pub fn from_settings(settings: &ConcurrencySettings) -> Result<Self> {
        Self::new()
            .threads(settings.threads)?
            .timeout_secs(settings.timeout_secs)
    }

    /// Set the worker count. Rebuilds the iteration allocator for the new count.
    pub fn threads(mut self, threads: usize) -> Result<Self> {
        self.allocator = Arc::new(IterationAllocator::new(threads)?);
        self.plan.threads = threads;
        Ok(self)
    }

    /// Set the run timeout, truncated to whole seconds. Must be at least one second.
    pub fn timeout(mut self, timeout: Duration) -> Result<Self> {
        let secs = timeout.as_secs();
        if secs == 0 {
            return Err(LoadError::invalid_config(format!(
                "timeout must be at least one second, got {timeout:?}"
            )));
        }
        self.plan.timeout_secs = secs;
        Ok(self)
    }

    pub fn timeout_secs(self, secs: u64) -> Result<Self> {
        self.timeout(Duration::from_secs(secs))
    }

    /// Record run lifecycle events and task failures in `log`.
    #[must_use]
    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.events = Some(log);
        self
    }

    /// Share an existing interrupt handle instead of the coordinator's own.
    #[must_use]
    pub fn with_interrupt(mut self, handle: InterruptHandle) -> Self {
        self.interrupt = handle;
        self
    }

    pub fn nb_threads(&self) -> usize {
        self.plan.threads
    }

    pub fn timeout_in_seconds(&self) -> u64 {
        self.plan.timeout_secs
    }

    pub fn plan(&self) -> ConcurrencyPlan {
        self.plan
    }

    pub fn allocator(&self) -> &IterationAllocator {
        &self.allocator
    }

    /// Handle that interrupts this coordinator's wait.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Phase of the current or most recent run.
    pub fn phase(&self) -> RunPhase {
        *self.phase.lock()
    }

    /// Iterations out of `total` that thread `thread_index` should run.
    pub fn nb_iterations_for_thread(&self, thread_index: usize, total: u64) -> Result<u64> {
        self.allocator.iterations_for_thread(thread_index, total)
    }

    /// Run every execution on every thread index and wait for all of them.
    ///
    /// Returns [`LoadError::ExecutionTimedOut`] if the pool has not drained
    /// within the timeout and [`LoadError::ExecutionInterrupted`] if the
    /// interrupt handle fires first. Failures inside individual tasks are
    /// counted in the report, not returned.
    pub fn submit<S, A>(
        &self,
        executions: &[Arc<dyn Execution<S, A>>],
        scenario: Arc<S>,
        configurations: Arc<ConfigurationSet>,
        assertions: Arc<[A]>,
    ) -> Result<RunReport>
    where
        S: Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        self.check_registered_threads(&configurations)?;
        self.enter_phase(RunPhase::Submitting)?;
        let started = Instant::now();
        let threads = self.plan.threads;

        self.warn_on_divergent_timeout(&configurations);

        let pool = match self.build_pool(threads) {
            Ok(pool) => pool,
            Err(err) => {
                self.set_phase(RunPhase::Idle);
                return Err(err);
            }
        };

        let mut start = LogEntry::new(EventType::RunStart, Severity::Info);
        start.threads = Some(threads);
        start.timeout_secs = Some(self.plan.timeout_secs);
        start.tasks = Some(executions.len() * threads);
        self.record(&start);

        for execution in executions {
            for thread_index in 0..threads {
                let execution = Arc::clone(execution);
                let scenario = Arc::clone(&scenario);
                let configurations = Arc::clone(&configurations);
                let assertions = Arc::clone(&assertions);
                let queued = pool.submit(move || {
                    execution
                        .execute(thread_index, &scenario, &configurations, &assertions)
                        .map_err(|err| LoadError::TaskFailed {
                            thread_index,
                            details: err.to_string(),
                        })
                });
                if let Err(err) = queued {
                    pool.begin_draining();
                    self.set_phase(RunPhase::Idle);
                    return Err(err);
                }
            }
        }

        self.set_phase(RunPhase::Draining);
        pool.begin_draining();

        let outcome = pool.await_termination(self.plan.timeout(), Some(&self.interrupt));
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Termination::Completed => {
                self.set_phase(RunPhase::Terminated);
                let report = RunReport {
                    phase: RunPhase::Terminated,
                    threads,
                    executions: executions.len(),
                    tasks_submitted: pool.submitted(),
                    tasks_completed: pool.completed(),
                    tasks_failed: pool.failed(),
                    elapsed_ms,
                };
                let mut done = LogEntry::new(EventType::RunComplete, Severity::Info);
                done.threads = Some(threads);
                done.tasks = Some(report.tasks_submitted);
                done.tasks_failed = Some(report.tasks_failed);
                done.duration_ms = Some(elapsed_ms);
                self.record(&done);
                Ok(report)
            }
            Termination::TimedOut => {
                self.set_phase(RunPhase::TimedOut);
                let err = LoadError::ExecutionTimedOut {
                    timeout_secs: self.plan.timeout_secs,
                };
                let mut entry = LogEntry::new(EventType::RunTimeout, Severity::Critical);
                entry.timeout_secs = Some(self.plan.timeout_secs);
                entry.tasks = Some(pool.submitted());
                entry.tasks_failed = Some(pool.failed());
                entry.duration_ms = Some(elapsed_ms);
                entry.error_code = Some(err.code().to_string());
                self.record(&entry);
                Err(err)
            }
            Termination::Interrupted(cause) => {
                self.set_phase(RunPhase::Interrupted);
                let mut entry = LogEntry::new(EventType::RunInterrupted, Severity::Critical)
                    .with_details(cause.reason());
                entry.duration_ms = Some(elapsed_ms);
                entry.error_code = Some("LC-2003".to_string());
                self.record(&entry);
                Err(LoadError::ExecutionInterrupted { source: cause })
            }
        }
    }

    fn enter_phase(&self, next: RunPhase) -> Result<()> {
        let mut phase = self.phase.lock();
        if phase.is_active() {
            return Err(LoadError::RunInProgress {
                details: format!("{:?}", *phase),
            });
        }
        *phase = next;
        Ok(())
    }

    fn set_phase(&self, next: RunPhase) {
        *self.phase.lock() = next;
    }

    fn build_pool(&self, threads: usize) -> Result<WorkerPool> {
        let Some(log) = self.events.clone() else {
            return WorkerPool::new(threads);
        };
        let hook: FailureHook = Arc::new(move |failure: &TaskFailure| {
            let mut entry = LogEntry::new(EventType::TaskFailed, Severity::Warning)
                .with_details(failure.details.clone());
            entry.worker = Some(failure.worker);
            entry.error_code = Some("LC-2004".to_string());
            log.record(&entry);
        });
        WorkerPool::with_failure_hook(threads, hook)
    }

    /// Executions such as `Times` split their work by the concurrency config
    /// in the set, so it must agree with the thread count used for fan-out.
    fn check_registered_threads(&self, configurations: &ConfigurationSet) -> Result<()> {
        let Some(registered) = configurations.get::<Self>() else {
            return Ok(());
        };
        if registered.nb_threads() == self.plan.threads {
            return Ok(());
        }
        let err = LoadError::invalid_config(format!(
            "configuration set carries {} threads, run uses {}",
            registered.nb_threads(),
            self.plan.threads
        ));
        let mut entry = LogEntry::new(EventType::ConfigDivergence, Severity::Critical)
            .with_details(err.to_string());
        entry.threads = Some(self.plan.threads);
        entry.error_code = Some(err.code().to_string());
        self.record(&entry);
        Err(err)
    }

    /// The wait always uses this coordinator's own timeout. A different
    /// concurrency config in the set is reported, never obeyed.
    fn warn_on_divergent_timeout(&self, configurations: &ConfigurationSet) {
        let Some(registered) = configurations.get::<Self>() else {
            return;
        };
        if registered.timeout_in_seconds() == self.plan.timeout_secs {
            return;
        }
        let details = format!(
            "configuration set carries timeout {}s, run uses {}s",
            registered.timeout_in_seconds(),
            self.plan.timeout_secs
        );
        if self.events.is_some() {
            self.record(
                &LogEntry::new(EventType::ConfigDivergence, Severity::Warning)
                    .with_details(details),
            );
        } else {
            eprintln!("[LC-RUN] warning: {details}");
        }
    }

    fn record(&self, entry: &LogEntry) {
        if let Some(log) = &self.events {
            log.record(entry);
        }
    }
}

fn single_thread_allocator() -> IterationAllocator {
    match IterationAllocator::new(DEFAULT_THREADS) {
        Ok(allocator) => allocator,
        Err(_) => unreachable!("DEFAULT_THREADS is positive"),
    }
}

// ──────────────────── tests ────────────────────
