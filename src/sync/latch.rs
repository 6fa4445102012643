//! In-flight task accounting for the worker pools.

use std::sync::{Arc, Condvar, Mutex};

/// Tracks tasks submitted to a pool that have not yet completed.
///
/// The dispatcher increments the count before enqueueing each task; workers
/// decrement it through a [`CompletionGuard`], which fires on drop so a
/// panicking task still counts as finished. Without that, a single dead
/// worker would leave the drain wait — and with it every device parked on
/// the shared barrier — blocked forever; instead the panic surfaces later
/// when the worker is joined.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    pending: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records one submitted task.
    pub(crate) fn submit(&self) {
        *self.pending.lock().expect("in-flight count poisoned") += 1;
    }

    /// Records one completed task.
    pub(crate) fn complete(&self) {
        let mut pending = self.pending.lock().expect("in-flight count poisoned");
        *pending -= 1;
        if *pending == 0 {
            self.idle.notify_all();
        }
    }

    /// Blocks until every submitted task has completed.
    pub(crate) fn wait_idle(&self) {
        let mut pending = self.pending.lock().expect("in-flight count poisoned");
        while *pending > 0 {
            pending = self.idle.wait(pending).expect("in-flight count poisoned");
        }
    }
}

/// Marks one task complete when dropped.
pub(crate) struct CompletionGuard {
    latch: Arc<InFlight>,
}

impl CompletionGuard {
    pub(crate) fn new(latch: Arc<InFlight>) -> Self {
        Self { latch }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.latch.complete();
    }
}
