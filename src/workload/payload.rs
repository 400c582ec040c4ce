//! Payload scenario: draw a buffer per iteration and check it.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::core::errors::{LoadError, Result};
use crate::engine::coordinator::ConfigurationSet;
use crate::generator::Generator;
use crate::generator::bytes::is_uniform;
use crate::workload::times::{IterationContext, Scenario};

/// Checks applied to every generated buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadCheck {
    /// Buffer is exactly this many bytes.
    Length(usize),
    /// Every byte equals the first.
    UniformFill,
}

impl PayloadCheck {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Length(_) => "length",
            Self::UniformFill => "uniform_fill",
        }
    }

    pub fn check(&self, buf: &[u8]) -> Result<()> {
        match *self {
            Self::Length(expected) if buf.len() != expected => Err(LoadError::AssertionFailed {
                assertion: self.name(),
                details: format!("expected {expected} bytes, got {}", buf.len()),
            }),
            Self::UniformFill if !is_uniform(buf) => Err(LoadError::AssertionFailed {
                assertion: self.name(),
                details: format!("mixed fill in {}-byte buffer", buf.len()),
            }),
            _ => Ok(()),
        }
    }
}

/// Scenario that generates one byte buffer per iteration.
pub struct PayloadScenario {
    generator: Arc<dyn Generator<Vec<u8>>>,
    iterations: AtomicU64,
    bytes: AtomicU64,
}

impl PayloadScenario {
    pub fn new(generator: Arc<dyn Generator<Vec<u8>>>) -> Self {
        Self {
            generator,
            iterations: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// Iterations completed so far, across all threads.
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Bytes generated so far, across all threads.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl Scenario<PayloadCheck> for PayloadScenario {
    fn run_iteration(
        &self,
        ctx: &IterationContext,
        _configurations: &ConfigurationSet,
        assertions: &[PayloadCheck],
    ) -> Result<()> {
        let buf = self.generator.generate(ctx.seed);
        for assertion in assertions {
            assertion.check(&buf)?;
        }
        self.iterations.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(buf.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

impl fmt::Debug for PayloadScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadScenario")
            .field("iterations", &self.iterations())
            .field("bytes", &self.bytes())
            .finish_non_exhaustive()
    }
}
