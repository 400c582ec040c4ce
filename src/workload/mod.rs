//! Ready-made executions and scenarios built on the engine.

pub mod payload;
pub mod times;

pub use payload::{PayloadCheck, PayloadScenario};
pub use times::{IterationContext, Scenario, Times, times};
