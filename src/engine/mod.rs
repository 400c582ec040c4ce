//! Execution engine: iteration allocator, worker pool, and run coordinator.

pub mod allocator;
pub mod coordinator;
pub mod interrupt;
pub mod pool;
