//! Stress tests: contention on the allocator cache, the worker pool and the
//! byte generators.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use loadcore::engine::allocator::IterationAllocator;
use loadcore::engine::coordinator::{ConcurrencyConfig, ConfigurationSet, Execution};
use loadcore::engine::pool::{Termination, WorkerPool};
use loadcore::generator::bytes::is_uniform;
use loadcore::generator::{Generator, fixed_length};
use loadcore::workload::{PayloadCheck, PayloadScenario, times};

/// Stress report emitted at the end of each scenario.
struct StressReport {
    scenario: String,
    metrics: Vec<(String, String)>,
}

impl StressReport {
    fn new(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            metrics: Vec::new(),
        }
    }

    fn metric(&mut self, key: &str, value: impl std::fmt::Display) {
        self.metrics.push((key.to_string(), value.to_string()));
    }

    fn emit(&self) -> String {
        let mut out = String::new();
        writeln!(out, "═══ Stress: {} ═══", self.scenario).unwrap();
        for (k, v) in &self.metrics {
            writeln!(out, "  {k}: {v}").unwrap();
        }
        out
    }
}

#[test]
fn allocator_first_access_storm_computes_each_total_once() {
    const CALLERS: usize = 32;
    let allocator = Arc::new(IterationAllocator::new(7).unwrap());
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|caller| {
            let allocator = Arc::clone(&allocator);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut seen = Vec::new();
                for total in [10_u64, 1_000, 99_999] {
                    seen.push(allocator.iterations_for_thread(caller % 7, total).unwrap());
                }
                seen
            })
        })
        .collect();

    for (caller, handle) in handles.into_iter().enumerate() {
        let seen = handle.join().unwrap();
        let index = caller % 7;
        let expected: Vec<u64> = [10_u64, 1_000, 99_999]
            .iter()
            .map(|&total| loadcore::engine::allocator::assigned_iterations(index, total, 7))
            .collect();
        assert_eq!(seen, expected);
    }
    assert_eq!(allocator.computations(), 3);
}

#[test]
fn pool_drains_thousands_of_small_tasks() {
    let mut report = StressReport::new("pool_drain");
    let pool = WorkerPool::new(8).unwrap();
    let sum = Arc::new(AtomicU64::new(0));

    let started = Instant::now();
    for i in 1..=5_000_u64 {
        let sum = Arc::clone(&sum);
        pool.submit(move || {
            sum.fetch_add(i, Ordering::Relaxed);
            Ok(())
        })
        .unwrap();
    }
    pool.begin_draining();
    let outcome = pool.await_termination(Duration::from_secs(30), None);

    report.metric("elapsed_ms", started.elapsed().as_millis());
    report.metric("completed", pool.completed());
    eprintln!("{}", report.emit());

    assert!(matches!(outcome, Termination::Completed));
    assert_eq!(pool.completed(), 5_000);
    assert_eq!(sum.load(Ordering::Relaxed), 5_000 * 5_001 / 2);
}

#[test]
fn generator_shared_across_threads_keeps_every_buffer_uniform() {
    let generator = Arc::new(fixed_length(256));
    let bad = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let generator = Arc::clone(&generator);
            let bad = Arc::clone(&bad);
            thread::spawn(move || {
                for seed in 0..2_000 {
                    let buf = generator.generate(seed);
                    if buf.len() != 256 || !is_uniform(&buf) {
                        bad.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(bad.load(Ordering::Relaxed), 0);
}

#[test]
fn large_payload_run_splits_exactly() {
    let mut report = StressReport::new("payload_run");
    let config = ConcurrencyConfig::new()
        .threads(12)
        .unwrap()
        .timeout_secs(60)
        .unwrap();
    let scenario = Arc::new(PayloadScenario::new(Arc::new(fixed_length(512))));
    let configurations = Arc::new(ConfigurationSet::new().with(config.clone()));
    let executions: Vec<Arc<dyn Execution<PayloadScenario, PayloadCheck>>> =
        vec![Arc::new(times(50_001)), Arc::new(times(7))];
    let checks: Arc<[PayloadCheck]> =
        Arc::from(vec![PayloadCheck::Length(512), PayloadCheck::UniformFill]);

    let result = config
        .submit(&executions, Arc::clone(&scenario), configurations, checks)
        .unwrap();

    report.metric("elapsed_ms", result.elapsed_ms);
    report.metric("iterations", scenario.iterations());
    eprintln!("{}", report.emit());

    assert_eq!(result.tasks_submitted, 24);
    assert_eq!(result.tasks_failed, 0);
    assert_eq!(scenario.iterations(), 50_008);
}
