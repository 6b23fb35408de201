//! Thread-safe signal collection.
//!
//! [`SignalStore`] is the only state shared between worker threads. Every
//! access, whether a mutation or an aggregate read, goes through one
//! [`Mutex`]. Critical sections are in-memory only (push, clone, swap), so
//! the lock is never held across I/O.
//!
//! # Ordering
//!
//! Appends form a single total order. A [`snapshot`](SignalStore::snapshot)
//! contains every signal whose [`add`](SignalStore::add) returned before the
//! snapshot was requested. Relative order between concurrent appends is
//! unspecified.
//!
//! # Poisoning
//!
//! Each critical section leaves the sequence valid even if it unwinds, so a
//! poisoned lock is recovered rather than propagated. Store operations never
//! fail.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::types::Signal;

/// Ordered, lock-protected collection of signals.
#[derive(Debug, Default)]
pub struct SignalStore {
    signals: Mutex<Vec<Signal>>,
}

impl SignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `signals`.
    pub fn with_contents(signals: Vec<Signal>) -> Self {
        Self {
            signals: Mutex::new(signals),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Signal>> {
        self.signals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a signal.
    pub fn add(&self, signal: Signal) {
        let mut signals = self.lock();
        signals.push(signal);
        debug!(count = signals.len(), "Signal added to store");
    }

    /// Consistent copy of the current contents, in store order.
    pub fn snapshot(&self) -> Vec<Signal> {
        self.lock().clone()
    }

    /// Run `f` against the locked contents without copying them.
    ///
    /// `f` must not call back into this store.
    pub fn with_signals<T>(&self, f: impl FnOnce(&[Signal]) -> T) -> T {
        let signals = self.lock();
        f(&signals)
    }

    /// Swap in `signals` wholesale, returning the previous contents.
    pub fn replace(&self, signals: Vec<Signal>) -> Vec<Signal> {
        let mut guard = self.lock();
        let previous = std::mem::replace(&mut *guard, signals);
        debug!(
            previous = previous.len(),
            current = guard.len(),
            "Store contents replaced"
        );
        previous
    }

    /// Remove every signal.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total number of samples across all signals.
    pub fn sample_count(&self) -> usize {
        self.with_signals(|signals| signals.iter().map(|s| s.data().len()).sum())
    }
}
