//! Fixed-size worker pool with one-shot draining and bounded waiting.
//!
//! Tasks travel over an unbounded crossbeam channel to `size` named worker
//! threads. [`WorkerPool::begin_draining`] drops the only sender, so workers
//! finish whatever is queued and exit once the channel reports disconnection.
//! Each worker also holds a clone of a completion sender; when the last worker
//! exits, the completion receiver disconnects and
//! [`WorkerPool::await_termination`] returns.
//!
//! Waiting never cancels anything. A timed-out wait leaves the remaining tasks
//! running on their detached threads.

#![allow(missing_docs)]

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use parking_lot::Mutex;

use crate::core::errors::{LoadError, Result};
use crate::engine::interrupt::{InterruptHandle, Interrupted};

/// Longest single sleep inside `await_termination` before re-checking the
/// interrupt handle.
const WAIT_SLICE: Duration = Duration::from_millis(50);

type Task = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Callback invoked on the worker thread whenever a task fails or panics.
pub type FailureHook = Arc<dyn Fn(&TaskFailure) + Send + Sync>;

/// Lifecycle of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Accepting submissions.
    Open,
    /// No new submissions; queued and running tasks still finishing.
    Draining,
    /// Every worker has exited.
    Terminated,
}

/// Result of waiting for a pool to terminate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Completed,
    TimedOut,
    Interrupted(Interrupted),
}

/// A task that returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Index of the pool worker that ran the task.
    pub worker: usize,
    pub details: String,
    pub panicked: bool,
}

#[derive(Default)]
struct PoolShared {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    live_workers: AtomicUsize,
    on_failure: Option<FailureHook>,
}

impl PoolShared {
    fn record_failure(&self, failure: &TaskFailure) {
        self.failed.fetch_add(1, Ordering::AcqRel);
        match &self.on_failure {
            Some(hook) => hook(failure),
            None => eprintln!(
                "[LC-POOL] worker {} task failed: {}",
                failure.worker, failure.details
            ),
        }
    }
}

/// Fixed set of worker threads fed from one queue.
pub struct WorkerPool {
    size: usize,
    sender: Mutex<Option<channel::Sender<Task>>>,
    done_rx: channel::Receiver<()>,
    shared: Arc<PoolShared>,
}

impl WorkerPool {
    /// Spawn a pool of exactly `size` workers.
    pub fn new(size: usize) -> Result<Self> {
        Self::build(size, None)
    }

    /// Spawn a pool that reports task failures to `hook` instead of stderr.
    pub fn with_failure_hook(size: usize, hook: FailureHook) -> Result<Self> {
        Self::build(size, Some(hook))
    }

    fn build(size: usize, on_failure: Option<FailureHook>) -> Result<Self> {
        if size == 0 {
            return Err(LoadError::invalid_config("worker pool size must be positive"));
        }

        let (task_tx, task_rx) = channel::unbounded::<Task>();
        let (done_tx, done_rx) = channel::bounded::<()>(0);
        let shared = Arc::new(PoolShared {
            on_failure,
            ..PoolShared::default()
        });

        for worker in 0..size {
            let task_rx = task_rx.clone();
            let done_tx = done_tx.clone();
            let shared_for_worker = Arc::clone(&shared);
            shared.live_workers.fetch_add(1, Ordering::AcqRel);

            let spawned = thread::Builder::new()
                .name(format!("loadcore-worker-{worker}"))
                .spawn(move || worker_loop(worker, &task_rx, &shared_for_worker, done_tx));

            if let Err(source) = spawned {
                shared.live_workers.fetch_sub(1, Ordering::AcqRel);
                // Dropping task_tx releases the workers already started.
                return Err(LoadError::Runtime {
                    details: format!("failed to spawn worker {worker}: {source}"),
                });
            }
        }

        Ok(Self {
            size,
            sender: Mutex::new(Some(task_tx)),
            done_rx,
            shared,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a task. Never blocks; fails once draining has begun.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let sender = self.sender.lock();
        let Some(tx) = sender.as_ref() else {
            return Err(LoadError::PoolShutdown);
        };
        tx.send(Box::new(task))
            .map_err(|_| LoadError::PoolShutdown)?;
        self.shared.submitted.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Stop accepting submissions. Queued tasks still run. Idempotent.
    pub fn begin_draining(&self) {
        self.sender.lock().take();
    }

    /// Block until every worker has exited, the timeout elapses, or `interrupt`
    /// fires, whichever comes first.
    ///
    /// Calling this before [`WorkerPool::begin_draining`] can only end in a
    /// timeout or an interruption, since workers keep waiting for more tasks.
    /// A timeout too large to place on the clock means no deadline at all.
    pub fn await_termination(
        &self,
        timeout: Duration,
        interrupt: Option<&InterruptHandle>,
    ) -> Termination {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if matches!(
                self.done_rx.try_recv(),
                Err(channel::TryRecvError::Disconnected)
            ) {
                return Termination::Completed;
            }
            if let Some(cause) = interrupt.and_then(InterruptHandle::cause) {
                return Termination::Interrupted(cause);
            }

            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Termination::TimedOut;
                    }
                    (deadline - now).min(WAIT_SLICE)
                }
                None => WAIT_SLICE,
            };
            match self.done_rx.recv_timeout(slice) {
                Err(channel::RecvTimeoutError::Disconnected) => return Termination::Completed,
                Ok(()) | Err(channel::RecvTimeoutError::Timeout) => {}
            }
        }
    }

    pub fn state(&self) -> PoolState {
        if self.sender.lock().is_some() {
            PoolState::Open
        } else if self.shared.live_workers.load(Ordering::Acquire) == 0 {
            PoolState::Terminated
        } else {
            PoolState::Draining
        }
    }

    pub fn submitted(&self) -> usize {
        self.shared.submitted.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> usize {
        self.shared.completed.load(Ordering::Acquire)
    }

    pub fn failed(&self) -> usize {
        self.shared.failed.load(Ordering::Acquire)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers are detached; they exit after draining the queue.
        self.begin_draining();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("state", &self.state())
            .field("submitted", &self.submitted())
            .field("completed", &self.completed())
            .field("failed", &self.failed())
            .finish()
    }
}

fn worker_loop(
    worker: usize,
    task_rx: &channel::Receiver<Task>,
    shared: &PoolShared,
    done_tx: channel::Sender<()>,
) {
    for task in task_rx.iter() {
        let failure = match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(TaskFailure {
                worker,
                details: err.to_string(),
                panicked: false,
            }),
            Err(payload) => Some(TaskFailure {
                worker,
                details: panic_message(payload.as_ref()),
                panicked: true,
            }),
        };
        if let Some(failure) = failure {
            shared.record_failure(&failure);
        }
        shared.completed.fetch_add(1, Ordering::AcqRel);
    }
    shared.live_workers.fetch_sub(1, Ordering::AcqRel);
    drop(done_tx);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic with non-string payload".to_string()
    }
}
