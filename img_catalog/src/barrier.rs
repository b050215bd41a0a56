//! Fan-out/fan-in join barrier
//!
//! Counts outstanding jobs and runs a completion callback exactly once, when
//! the count first returns to zero. Each unit of work holds a
//! [`BarrierToken`]; dropping the token leaves the barrier, so a job that
//! panics still counts as finished.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Callback = Box<dyn FnOnce() + Send>;

pub struct JoinBarrier {
    outstanding: AtomicUsize,
    fired: AtomicBool,
    on_zero: Mutex<Option<Callback>>,
}

impl JoinBarrier {
    pub fn new<F>(on_zero: F) -> Arc<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Arc::new(Self {
            outstanding: AtomicUsize::new(0),
            fired: AtomicBool::new(false),
            on_zero: Mutex::new(Some(Box::new(on_zero))),
        })
    }

    /// Register one unit of work. Must happen before the work is started.
    pub fn enter(self: &Arc<Self>) -> BarrierToken {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        BarrierToken {
            barrier: Arc::clone(self),
        }
    }

    fn leave(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        let callback = self
            .on_zero
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// One registered unit of work; leaves the barrier on drop.
#[must_use = "dropping the token immediately leaves the barrier"]
pub struct BarrierToken {
    barrier: Arc<JoinBarrier>,
}

impl Drop for BarrierToken {
    fn drop(&mut self) {
        self.barrier.leave();
    }
}
