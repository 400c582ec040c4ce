//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use loadcore::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, ConcurrencySettings, LoggingSettings, WorkloadSettings};
pub use crate::core::errors::{LoadError, Result};

// Engine
pub use crate::engine::allocator::{IterationAllocator, IterationTable, assigned_iterations};
pub use crate::engine::coordinator::{
    ConcurrencyConfig, ConcurrencyPlan, ConfigurationSet, Execution, RunPhase, RunReport,
};
pub use crate::engine::interrupt::{InterruptHandle, Interrupted};
pub use crate::engine::pool::{PoolState, Termination, WorkerPool};

// Generators
pub use crate::generator::{ByteBufferGenerator, Generator, SeededByteBufferGenerator, fixed_length};

// Logging
pub use crate::logger::jsonl::{EventLog, JsonlConfig};

// Workloads
pub use crate::workload::{IterationContext, PayloadCheck, PayloadScenario, Scenario, Times, times};
