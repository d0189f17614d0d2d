//! Owner counting for control blocks.
//!
//! `Count::dec` reports whether the caller released the last owner. The
//! check and the subtraction are one atomic read-modify-write, so among any
//! set of racing decrements exactly one observes the 1 -> 0 transition.

use core::sync::atomic::{fence, AtomicUsize, Ordering};

/// Counts above this abort the process instead of risking wrap-around.
const MAX_COUNT: usize = isize::MAX as usize;

/// A source of counted ownership.
pub trait Count {
    /// Register one more owner.
    fn inc(&self);

    /// Release one owner. Returns true if the count is now zero.
    fn dec(&self) -> bool;

    /// Snapshot of the current count; may be stale by the time it is read.
    fn load(&self) -> usize;
}

/// Thread-safe owner count, starting at 1 for the creating handle.
#[derive(Debug)]
#[repr(transparent)]
pub struct AtomicCount {
    count: AtomicUsize,
}

impl AtomicCount {
    pub const fn new(initial: usize) -> Self {
        Self {
            count: AtomicUsize::new(initial),
        }
    }
}

impl Default for AtomicCount {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Count for AtomicCount {
    #[inline]
    fn inc(&self) {
        // A new owner can only be made from an existing one, so no
        // synchronization with other owners is needed here.
        let old = self.count.fetch_add(1, Ordering::Relaxed);
        if old > MAX_COUNT {
            // Follow Arc semantics: abort on overflow rather than continue unsafely.
            std::process::abort();
        }
    }

    #[inline]
    fn dec(&self) -> bool {
        let old = self.count.fetch_sub(1, Ordering::Release);
        debug_assert!(old > 0, "AtomicCount underflow");
        if old != 1 {
            return false;
        }
        // Pairs with the Release above on every other owner's decrement, so
        // all their accesses to the value happen-before teardown.
        fence(Ordering::Acquire);
        true
    }

    #[inline]
    fn load(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as Hits;

    #[test]
    fn starts_at_one_and_reports_last_release() {
        let c = AtomicCount::default();
        assert_eq!(c.load(), 1);
        c.inc();
        c.inc();
        assert_eq!(c.load(), 3);
        assert!(!c.dec());
        assert!(!c.dec());
        assert!(c.dec());
        assert_eq!(c.load(), 0);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn underflow_is_caught_in_debug() {
        let res = std::panic::catch_unwind(|| {
            let c = AtomicCount::new(0);
            c.dec();
        });
        assert!(res.is_err(), "expected underflow to panic in debug builds");
    }

    #[test]
    fn exactly_one_racing_decrement_sees_zero() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;
        for _ in 0..20 {
            let c = AtomicCount::new(THREADS * PER_THREAD);
            let zero_hits = Hits::new(0);
            std::thread::scope(|s| {
                for _ in 0..THREADS {
                    s.spawn(|| {
                        for _ in 0..PER_THREAD {
                            if c.dec() {
                                zero_hits.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    });
                }
            });
            assert_eq!(zero_hits.load(Ordering::Relaxed), 1);
            assert_eq!(c.load(), 0);
        }
    }
}
