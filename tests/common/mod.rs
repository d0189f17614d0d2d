// Shared helpers for the integration suites: allocators that count their
// calls and a value type that counts live instances.
#![allow(dead_code)]

use shared_ptr::{AllocError, Allocator, Global};
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct AllocStats {
    pub allocs: AtomicUsize,
    pub deallocs: AtomicUsize,
    pub fail_next: AtomicBool,
}

impl AllocStats {
    pub fn allocs(&self) -> usize {
        self.allocs.load(Ordering::SeqCst)
    }

    pub fn deallocs(&self) -> usize {
        self.deallocs.load(Ordering::SeqCst)
    }
}

/// Global-backed allocator that counts calls; can be told to fail once.
#[derive(Clone, Debug, Default)]
pub struct CountingAlloc {
    pub stats: Arc<AllocStats>,
}

impl CountingAlloc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.stats.fail_next.store(true, Ordering::SeqCst);
    }
}

unsafe impl Allocator for CountingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if self.stats.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AllocError);
        }
        self.stats.allocs.fetch_add(1, Ordering::SeqCst);
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.stats.deallocs.fetch_add(1, Ordering::SeqCst);
        Global.deallocate(ptr, layout)
    }
}

/// Counts live instances: +1 on construction and clone, -1 on drop.
#[derive(Debug)]
pub struct Counted {
    live: Arc<AtomicIsize>,
}

impl Counted {
    pub fn new(live: &Arc<AtomicIsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self { live: live.clone() }
    }
}

impl Clone for Counted {
    fn clone(&self) -> Self {
        Self::new(&self.live)
    }
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn live(counter: &Arc<AtomicIsize>) -> isize {
    counter.load(Ordering::SeqCst)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
