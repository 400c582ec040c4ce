//! Fixed-length byte buffers filled with a single random value.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::generator::Generator;

/// Generator of `length`-byte buffers whose bytes all share one value drawn
/// from the calling thread's random source. The seed is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteBufferGenerator {
    length: usize,
}

impl ByteBufferGenerator {
    /// A generator of buffers exactly `length` bytes long. Zero gives empty buffers.
    #[must_use]
    pub const fn fixed_length(length: usize) -> Self {
        Self { length }
    }

    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }
}

impl Generator<Vec<u8>> for ByteBufferGenerator {
    fn generate(&self, _seed: u64) -> Vec<u8> {
        let fill: u8 = rand::rng().random();
        vec![fill; self.length]
    }
}

/// Shorthand for [`ByteBufferGenerator::fixed_length`].
#[must_use]
pub const fn fixed_length(length: usize) -> ByteBufferGenerator {
    ByteBufferGenerator::fixed_length(length)
}

/// Like [`ByteBufferGenerator`], but the fill value is derived from the seed,
/// so equal seeds always yield equal buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededByteBufferGenerator {
    length: usize,
}

impl SeededByteBufferGenerator {
    #[must_use]
    pub const fn fixed_length(length: usize) -> Self {
        Self { length }
    }
}

impl Generator<Vec<u8>> for SeededByteBufferGenerator {
    fn generate(&self, seed: u64) -> Vec<u8> {
        let fill: u8 = StdRng::seed_from_u64(seed).random();
        vec![fill; self.length]
    }
}

/// Whether every byte of `buf` equals the first one. Empty buffers qualify.
#[must_use]
pub fn is_uniform(buf: &[u8]) -> bool {
    buf.first().is_none_or(|&first| buf.iter().all(|&b| b == first))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn buffers_have_configured_length() {
        let generator = fixed_length(64);
        for seed in 0..20 {
            let buf = generator.generate(seed);
            assert_eq!(buf.len(), 64);
            assert!(is_uniform(&buf));
        }
    }

    #[test]
    fn zero_length_is_empty_not_error() {
        let buf = fixed_length(0).generate(1);
        assert!(buf.is_empty());
        assert!(is_uniform(&buf));
    }

    #[test]
    fn seeded_generator_is_deterministic() {
        let generator = SeededByteBufferGenerator::fixed_length(16);
        assert_eq!(generator.generate(42), generator.generate(42));
        assert_eq!(generator.generate(42).len(), 16);
        assert!(is_uniform(&generator.generate(9)));
    }

    #[test]
    fn uniformity_check() {
        assert!(is_uniform(&[3, 3, 3]));
        assert!(!is_uniform(&[3, 3, 4]));
    }

    #[test]
    fn concurrent_calls_never_mix_buffers() {
        let generator: Arc<dyn Generator<Vec<u8>>> = Arc::new(fixed_length(4096));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let generator = Arc::clone(&generator);
                thread::spawn(move || {
                    for i in 0..200 {
                        let buf = generator.generate(t * 1_000 + i);
                        assert_eq!(buf.len(), 4096);
                        assert!(is_uniform(&buf));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
