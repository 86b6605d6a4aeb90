//! Reference counting and teardown sequencing
//!
//! A player is torn down in three steps: signal (state forced to END,
//! queue aborted, engine joined), drain (message loop joined), free (last
//! reference gone). [`Lifecycle`] records which step has been reached so
//! that every step runs exactly once no matter how many threads ask for it.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Count of live holders of a player handle
#[derive(Debug)]
pub struct RefCount {
    count: AtomicUsize,
}

impl RefCount {
    /// Start with one holder
    pub fn new() -> Self {
        Self {
            count: AtomicUsize::new(1),
        }
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Add a holder; the caller must already hold one. Returns the new count.
    pub fn inc(&self) -> usize {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Add a holder only if at least one still exists
    pub fn try_inc(&self) -> bool {
        let mut current = self.count.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Drop a holder. Returns `true` for exactly one call: the one that
    /// takes the count from 1 to 0. The count never goes below zero.
    pub fn dec(&self) -> bool {
        let mut current = self.count.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                log::error!("Reference count decremented below zero");
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return current == 1,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress of a handle's destruction sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TeardownPhase {
    /// Accepting commands
    Live,
    /// Signal step in progress on some thread
    Signaling,
    /// Engine stopped and queue aborted
    Signaled,
    /// Message loop joined
    Drained,
    /// Last reference dropped
    Released,
}

/// Guards the teardown sequence
#[derive(Debug)]
pub struct Lifecycle {
    phase: Mutex<TeardownPhase>,
    signaled: Condvar,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(TeardownPhase::Live),
            signaled: Condvar::new(),
        }
    }

    pub fn phase(&self) -> TeardownPhase {
        *self.phase.lock()
    }

    /// Run `signal` if the handle is still live.
    ///
    /// The phase lock is released while `signal` runs, so [`phase`](Self::phase)
    /// never blocks on a teardown. A concurrent caller waits until the
    /// signal step has finished and then returns `false`.
    pub fn signal<F: FnOnce()>(&self, signal: F) -> bool {
        let mut phase = self.phase.lock();
        if *phase != TeardownPhase::Live {
            while *phase == TeardownPhase::Signaling {
                self.signaled.wait(&mut phase);
            }
            return false;
        }
        *phase = TeardownPhase::Signaling;
        drop(phase);

        signal();

        *self.phase.lock() = TeardownPhase::Signaled;
        self.signaled.notify_all();
        true
    }

    pub fn mark_drained(&self) {
        let mut phase = self.phase.lock();
        if *phase == TeardownPhase::Signaled {
            *phase = TeardownPhase::Drained;
        }
    }

    /// Returns `true` the first time the handle is marked released
    pub fn mark_released(&self) -> bool {
        let mut phase = self.phase.lock();
        if *phase == TeardownPhase::Released {
            return false;
        }
        *phase = TeardownPhase::Released;
        true
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
