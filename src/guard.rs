//! Scope-bound owner of one raw allocation.
//!
//! A guard is armed right after memory is obtained and before anything that
//! can fail runs against it. If the scope is left early (error return or
//! unwinding panic) the guard hands the memory back to its allocator. Once
//! every fallible step has succeeded the guard is disarmed and the memory
//! belongs to whatever was built in it.

use crate::allocator::Allocator;
use crate::error::AllocError;
use core::alloc::Layout;
use core::ptr::NonNull;

/// Move-only holder of a raw allocation; releases it on drop unless disarmed.
pub struct AllocGuard<'a, A: Allocator + ?Sized> {
    ptr: NonNull<u8>,
    layout: Layout,
    alloc: &'a A,
    armed: bool,
}

impl<'a, A: Allocator + ?Sized> AllocGuard<'a, A> {
    /// Take responsibility for memory already obtained from `alloc`.
    ///
    /// # Safety
    /// `ptr` must have been returned by `alloc.allocate(layout)` and not
    /// released since.
    pub unsafe fn new(ptr: NonNull<u8>, layout: Layout, alloc: &'a A) -> Self {
        Self {
            ptr,
            layout,
            alloc,
            armed: true,
        }
    }

    /// Allocate `layout` from `alloc` and arm a guard over the result.
    pub fn allocate(alloc: &'a A, layout: Layout) -> Result<Self, AllocError> {
        let ptr = alloc.allocate(layout).map_err(|e| {
            log::debug!(
                "allocation of {} bytes (align {}) failed",
                layout.size(),
                layout.align()
            );
            e
        })?;
        // SAFETY: freshly allocated with this layout.
        Ok(unsafe { Self::new(ptr, layout, alloc) })
    }

    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Relax the guard: the memory is no longer released on drop.
    #[inline]
    pub fn disarm(&mut self) -> NonNull<u8> {
        self.armed = false;
        self.ptr
    }
}

impl<'a, A: Allocator + ?Sized> Drop for AllocGuard<'a, A> {
    fn drop(&mut self) {
        if self.armed {
            log::trace!(
                "rolling back allocation of {} bytes at {:p}",
                self.layout.size(),
                self.ptr
            );
            // SAFETY: armed means we still own the allocation.
            unsafe { self.alloc.deallocate(self.ptr, self.layout) };
        }
    }
}

/// Disarm several guards, last acquired first.
#[macro_export]
macro_rules! disarm {
    () => {};
    ($g:expr $(, $rest:expr)* $(,)?) => {{
        $crate::disarm!($($rest),*);
        $g.disarm();
    }};
}
