//! Test-data generators consumed by worker threads.
//!
//! Every generator is shared by all workers of a run, so implementations must
//! be `Send + Sync` and must not corrupt one call's output with another's. Any
//! randomness comes from a per-thread source (`rand::rng()`) or from a source
//! built fresh for the call.

pub mod bytes;

pub use bytes::{ByteBufferGenerator, SeededByteBufferGenerator, fixed_length};

/// Produces a value of type `T` from a seed.
///
/// The seed is part of the contract, but an implementation may ignore it and
/// draw from its own thread-safe random source instead.
pub trait Generator<T>: Send + Sync {
    /// Produce one value.
    fn generate(&self, seed: u64) -> T;
}

/// Any thread-safe closure over the seed is a generator.
impl<T, F> Generator<T> for F
where
    F: Fn(u64) -> T + Send + Sync,
{
    fn generate(&self, seed: u64) -> T {
        self(seed)
    }
}
