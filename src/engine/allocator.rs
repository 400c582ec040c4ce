//! Fair split of a total iteration count across a fixed number of threads.
//!
//! Iterations are dealt round-robin, one at a time: thread 0 takes iteration 0,
//! thread 1 takes iteration 1, and so on, wrapping back to thread 0. The closed
//! form below produces exactly the same per-thread counts without the loop.
//!
//! Tables are memoized per total. The whole cache sits behind one mutex, so the
//! first thread to ask for a given total computes the table while every other
//! thread asking for it blocks, then all of them share the same `Arc`.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::core::errors::{LoadError, Result};

/// Iterations dealt to `thread_index` when `total` iterations are spread
/// round-robin over `thread_count` threads.
///
/// Threads below `total % thread_count` get one extra iteration.
///
/// # Panics
///
/// Panics when `thread_count` is zero or `thread_index >= thread_count`; both
/// are caller bugs. [`IterationAllocator`] validates before calling this.
#[must_use]
pub fn assigned_iterations(thread_index: usize, total: u64, thread_count: usize) -> u64 {
    assert!(thread_count > 0, "thread_count must be positive");
    assert!(
        thread_index < thread_count,
        "thread_index {thread_index} out of range for {thread_count} threads"
    );
    let threads = thread_count as u64;
    let base = total / threads;
    let remainder = total % threads;
    if (thread_index as u64) < remainder {
        base + 1
    } else {
        base
    }
}

/// Per-thread iteration counts for one `(total, thread_count)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationTable {
    total: u64,
    per_thread: Vec<u64>,
}

impl IterationTable {
    /// Build the full table for every thread index.
    #[must_use]
    pub fn compute(total: u64, thread_count: usize) -> Self {
        let per_thread = (0..thread_count)
            .map(|i| assigned_iterations(i, total, thread_count))
            .collect();
        Self { total, per_thread }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn thread_count(&self) -> usize {
        self.per_thread.len()
    }

    pub fn get(&self, thread_index: usize) -> Option<u64> {
        self.per_thread.get(thread_index).copied()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.per_thread
    }
}

/// Memoizing allocator bound to a single thread count.
///
/// Changing the thread count means building a new allocator; a table computed
/// for one count is never consulted for another.
///
/// Tables are kept for the allocator's whole lifetime, one per distinct total
/// ever requested, so memory grows with the number of distinct totals. A run
/// uses one total per execution; callers cycling through many totals on one
/// coordinator should rebuild it with `threads(n)` to start a fresh cache.
#[derive(Debug)]
pub struct IterationAllocator {
    thread_count: usize,
    tables: Mutex<HashMap<u64, Arc<IterationTable>>>,
    computations: AtomicUsize,
}

impl IterationAllocator {
    /// Create an allocator for `thread_count` threads. Zero threads is rejected.
    pub fn new(thread_count: usize) -> Result<Self> {
        if thread_count == 0 {
            return Err(LoadError::invalid_config("thread count must be positive"));
        }
        Ok(Self {
            thread_count,
            tables: Mutex::new(HashMap::new()),
            computations: AtomicUsize::new(0),
        })
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Shared table for `total`, computing it on first request.
    pub fn table(&self, total: u64) -> Arc<IterationTable> {
        let mut tables = self.tables.lock();
        let table = tables.entry(total).or_insert_with(|| {
            self.computations.fetch_add(1, Ordering::Relaxed);
            Arc::new(IterationTable::compute(total, self.thread_count))
        });
        Arc::clone(table)
    }

    /// Compute the table for `total` ahead of the run.
    pub fn precompute(&self, total: u64) {
        let _ = self.table(total);
    }

    /// Iterations assigned to `thread_index` out of `total`.
    pub fn iterations_for_thread(&self, thread_index: usize, total: u64) -> Result<u64> {
        if thread_index >= self.thread_count {
            return Err(LoadError::InvalidThreadIndex {
                thread_index,
                thread_count: self.thread_count,
            });
        }
        self.table(total)
            .get(thread_index)
            .ok_or(LoadError::InvalidThreadIndex {
                thread_index,
                thread_count: self.thread_count,
            })
    }

    /// Number of tables currently cached.
    pub fn cached_tables(&self) -> usize {
        self.tables.lock().len()
    }

    /// Number of tables computed so far. Each distinct total counts once.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use proptest::prelude::*;

    use super::*;

    /// Literal round-robin dealing, used as the oracle for the closed form.
    fn dealt(total: u64, thread_count: usize) -> Vec<u64> {
        let mut counts = vec![0u64; thread_count];
        for i in 0..total {
            counts[(i % thread_count as u64) as usize] += 1;
        }
        counts
    }

    #[test]
    fn ten_over_three() {
        let table = IterationTable::compute(10, 3);
        assert_eq!(table.as_slice(), &[4, 3, 3]);
    }

    #[test]
    fn four_over_four() {
        let table = IterationTable::compute(4, 4);
        assert_eq!(table.as_slice(), &[1, 1, 1, 1]);
    }

    #[test]
    fn zero_total_gives_zero_everywhere() {
        let table = IterationTable::compute(0, 5);
        assert!(table.as_slice().iter().all(|&n| n == 0));
    }

    #[test]
    fn single_thread_takes_everything() {
        assert_eq!(assigned_iterations(0, 12_345, 1), 12_345);
    }

    #[test]
    fn fewer_iterations_than_threads() {
        let table = IterationTable::compute(2, 5);
        assert_eq!(table.as_slice(), &[1, 1, 0, 0, 0]);
    }

    #[test]
    fn zero_threads_rejected() {
        let err = IterationAllocator::new(0).unwrap_err();
        assert_eq!(err.code(), "LC-1001");
    }

    #[test]
    fn out_of_range_thread_index_rejected() {
        let alloc = IterationAllocator::new(3).unwrap();
        let err = alloc.iterations_for_thread(3, 10).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidThreadIndex {
                thread_index: 3,
                thread_count: 3
            }
        ));
        // The bad index must not have triggered a computation.
        assert_eq!(alloc.computations(), 0);
    }

    #[test]
    fn table_is_computed_once_per_total() {
        let alloc = IterationAllocator::new(3).unwrap();
        for i in 0..3 {
            alloc.iterations_for_thread(i, 10).unwrap();
        }
        alloc.iterations_for_thread(0, 10).unwrap();
        assert_eq!(alloc.computations(), 1);

        // A different total gets its own table instead of the stale one.
        assert_eq!(alloc.iterations_for_thread(0, 3).unwrap(), 1);
        assert_eq!(alloc.computations(), 2);
    }

    #[test]
    fn cache_holds_one_table_per_distinct_total() {
        let alloc = IterationAllocator::new(4).unwrap();
        for _ in 0..3 {
            for total in [5, 50, 500] {
                alloc.precompute(total);
            }
        }
        assert_eq!(alloc.cached_tables(), 3);
        assert_eq!(alloc.computations(), 3);
    }

    #[test]
    fn precompute_fills_cache() {
        let alloc = IterationAllocator::new(2).unwrap();
        alloc.precompute(7);
        assert_eq!(alloc.computations(), 1);
        assert_eq!(alloc.iterations_for_thread(1, 7).unwrap(), 3);
        assert_eq!(alloc.computations(), 1);
    }

    #[test]
    fn concurrent_first_access_computes_once() {
        let threads = 8;
        let alloc = Arc::new(IterationAllocator::new(threads).unwrap());
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let alloc = Arc::clone(&alloc);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    alloc.iterations_for_thread(i, 1_003).unwrap()
                })
            })
            .collect();

        let counts: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(alloc.computations(), 1);
        assert_eq!(counts.iter().sum::<u64>(), 1_003);
        assert_eq!(counts, dealt(1_003, threads));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Counts always sum to the total and differ by at most one.
        #[test]
        fn split_is_fair(total in 0u64..50_000, threads in 1usize..64) {
            let table = IterationTable::compute(total, threads);
            let counts = table.as_slice();
            prop_assert_eq!(counts.iter().sum::<u64>(), total);
            let max = counts.iter().copied().max().unwrap_or(0);
            let min = counts.iter().copied().min().unwrap_or(0);
            prop_assert!(max - min <= 1, "max {} min {}", max, min);
        }

        /// Closed form agrees with literal round-robin dealing.
        #[test]
        fn closed_form_matches_dealing(total in 0u64..5_000, threads in 1usize..32) {
            let table = IterationTable::compute(total, threads);
            let expected = dealt(total, threads);
            prop_assert_eq!(table.as_slice(), expected.as_slice());
        }

        /// Repeated queries return identical values.
        #[test]
        fn queries_are_stable(total in 0u64..10_000, threads in 1usize..16) {
            let alloc = IterationAllocator::new(threads).unwrap();
            let first: Vec<u64> = (0..threads)
                .map(|i| alloc.iterations_for_thread(i, total).unwrap())
                .collect();
            let second: Vec<u64> = (0..threads)
                .map(|i| alloc.iterations_for_thread(i, total).unwrap())
                .collect();
            prop_assert_eq!(first, second);
            prop_assert_eq!(alloc.computations(), 1);
        }
    }
}
