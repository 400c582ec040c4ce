//! `Times`: run a scenario a fixed number of times in total, split across threads.

#![allow(missing_docs)]

use crate::core::errors::{LoadError, Result};
use crate::engine::coordinator::{ConcurrencyConfig, ConfigurationSet, Execution};

/// Per-iteration step of a workload.
pub trait Scenario<A>: Send + Sync {
    fn run_iteration(
        &self,
        ctx: &IterationContext,
        configurations: &ConfigurationSet,
        assertions: &[A],
    ) -> Result<()>;
}

/// Where an iteration sits in the overall run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationContext {
    pub thread_index: usize,
    /// Position within this thread's share, starting at 0.
    pub iteration: u64,
    /// Position in the round-robin dealing across all threads. Across a run
    /// the seeds cover `0..total` exactly once.
    pub seed: u64,
}

/// Execution that runs `total` iterations split over the run's threads.
///
/// The thread count and split come from the [`ConcurrencyConfig`] registered
/// in the configuration set. Iterations stop early if that config's interrupt
/// handle fires; the first failing iteration ends this thread's share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Times {
    total: u64,
}

impl Times {
    pub const fn new(total: u64) -> Self {
        Self { total }
    }

    pub const fn total(&self) -> u64 {
        self.total
    }
}

/// Shorthand for [`Times::new`].
pub const fn times(total: u64) -> Times {
    Times::new(total)
}

impl<S, A> Execution<S, A> for Times
where
    S: Scenario<A>,
{
    fn execute(
        &self,
        thread_index: usize,
        scenario: &S,
        configurations: &ConfigurationSet,
        assertions: &[A],
    ) -> Result<()> {
        let concurrency = configurations
            .get::<ConcurrencyConfig>()
            .ok_or_else(|| LoadError::invalid_config("no concurrency config registered"))?;
        let threads = concurrency.nb_threads() as u64;
        let share = concurrency.nb_iterations_for_thread(thread_index, self.total)?;
        let interrupt = concurrency.interrupt_handle();

        for iteration in 0..share {
            if interrupt.is_interrupted() {
                break;
            }
            let ctx = IterationContext {
                thread_index,
                iteration,
                seed: thread_index as u64 + iteration * threads,
            };
            scenario.run_iteration(&ctx, configurations, assertions)?;
        }
        Ok(())
    }
}
