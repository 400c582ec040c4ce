//! Interruption of the coordinating thread's wait.
//!
//! A waiting thread cannot be interrupted from outside in Rust, so the wait is
//! made observable instead: [`WorkerPool::await_termination`] polls an
//! [`InterruptHandle`] between short wait slices. Any clone of the handle may
//! request the interruption, including an OS signal hook when the `signals`
//! feature is enabled.
//!
//! [`WorkerPool::await_termination`]: crate::engine::pool::WorkerPool::await_termination

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Cause attached to an interrupted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interrupted {
    reason: String,
}

impl Interrupted {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Human-readable reason given by whoever requested the interruption.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interrupted: {}", self.reason)
    }
}

impl std::error::Error for Interrupted {}

/// Shared interruption flag for one coordinator.
///
/// The flag is sticky: once set it stays set until [`InterruptHandle::clear`]
/// is called, so a run started on an interrupted handle ends immediately.
#[derive(Clone, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request interruption of the current wait.
    pub fn interrupt(&self, reason: impl Into<String>) {
        {
            let mut slot = self.reason.lock();
            if slot.is_none() {
                *slot = Some(reason.into());
            }
        }
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// The interruption cause, if one was requested.
    ///
    /// Signal hooks set the flag without a reason; those report a generic one.
    pub fn cause(&self) -> Option<Interrupted> {
        if !self.is_interrupted() {
            return None;
        }
        let reason = self
            .reason
            .lock()
            .clone()
            .unwrap_or_else(|| "termination signal received".to_string());
        Some(Interrupted::new(reason))
    }

    /// Reset the flag so the handle can guard another run.
    pub fn clear(&self) {
        *self.reason.lock() = None;
        self.flag.store(false, Ordering::Release);
    }

    /// Route SIGINT and SIGTERM into this handle.
    ///
    /// Registration is best-effort; failures are logged to stderr but not fatal.
    #[cfg(feature = "signals")]
    pub fn register_os_signals(&self) {
        use signal_hook::consts::{SIGINT, SIGTERM};

        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.flag)) {
            eprintln!("[LC-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.flag)) {
            eprintln!("[LC-SIGNAL] failed to register SIGINT: {e}");
        }
    }
}

impl fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}
