//! Counting semaphore used to wake the reader worker.
//!
//! The real-time consumer only ever posts, the worker is the only thread that
//! waits. Posting is an atomic increment plus a thread unpark, neither of which
//! can block on the worker.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::thread::{self, Thread};

#[derive(Debug)]
pub(crate) struct WakeSignal {
    permits: AtomicUsize,
    exit: AtomicBool,
    waiter: OnceLock<Thread>,
}

impl WakeSignal {
    pub(crate) fn new(initial_permits: usize) -> Self {
        Self {
            permits: AtomicUsize::new(initial_permits),
            exit: AtomicBool::new(false),
            waiter: OnceLock::new(),
        }
    }

    /// Registers the calling thread as the one that waits. Posts made before
    /// this are kept as permits.
    pub(crate) fn attach_current_thread(&self) {
        let _ = self.waiter.set(thread::current());
    }

    /// Adds one permit and wakes the waiter.
    pub(crate) fn post(&self) {
        self.permits.fetch_add(1, Ordering::Release);
        if let Some(waiter) = self.waiter.get() {
            waiter.unpark();
        }
    }

    /// Blocks until a permit is available and takes it.
    pub(crate) fn wait(&self) {
        loop {
            let permits = self.permits.load(Ordering::Acquire);
            if permits == 0 {
                // a post between the load and here leaves the unpark token set
                thread::park();
                continue;
            }
            if self
                .permits
                .compare_exchange_weak(permits, permits - 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Asks the waiter to exit the next time it wakes, and wakes it.
    pub(crate) fn request_exit(&self) {
        self.exit.store(true, Ordering::Release);
        self.post();
    }

    pub(crate) fn exit_requested(&self) -> bool {
        self.exit.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn permits(&self) -> usize {
        self.permits.load(Ordering::Acquire)
    }
}
