#![forbid(unsafe_code)]

//! loadcore — execution core for load generation.
//!
//! Splits a total number of iterations fairly across a fixed pool of worker
//! threads, runs one task per `(execution, thread)` pair, and waits for the
//! pool to drain within a timeout:
//! 1. **Allocator** — round-robin iteration split, memoized per total
//! 2. **Worker pool** — fixed size, one-shot draining, cooperative timeout
//! 3. **Coordinator** — fan-out, wait, and timeout/interrupt reporting
//! 4. **Generators** — thread-safe test data for scenarios
//!
//! # Library usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use loadcore::prelude::*;
//!
//! # fn main() -> loadcore::Result<()> {
//! let config = ConcurrencyConfig::new().threads(4)?.timeout_secs(60)?;
//! let configurations = Arc::new(ConfigurationSet::new().with(config.clone()));
//! let scenario = Arc::new(PayloadScenario::new(Arc::new(fixed_length(128))));
//! let executions: Vec<Arc<dyn Execution<PayloadScenario, PayloadCheck>>> =
//!     vec![Arc::new(times(10_000))];
//! let checks: Arc<[PayloadCheck]> =
//!     Arc::from(vec![PayloadCheck::Length(128), PayloadCheck::UniformFill]);
//!
//! let report = config.submit(&executions, scenario, configurations, checks)?;
//! assert_eq!(report.tasks_submitted, 4);
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod core;
pub mod engine;
pub mod generator;
pub mod logger;
pub mod workload;

pub use crate::core::errors::{LoadError, Result};
