//! Layout-based allocator interface used by every control block.
//!
//! An allocator hands out raw, uninitialized memory for a `Layout` and takes
//! it back with the same `Layout`. Because requests are untyped, the same
//! allocator value serves the managed value, the separate control block and
//! the combined in-place block; no per-type rebinding is needed.

use crate::error::AllocError;
use core::alloc::Layout;
use core::ptr::NonNull;

/// Source of raw memory for shared values and their control blocks.
///
/// # Safety
///
/// Implementors must ensure that:
/// - a successful `allocate` returns memory valid for reads and writes of
///   `layout.size()` bytes, aligned to `layout.align()`;
/// - memory stays valid until passed back to `deallocate` on this allocator
///   (or a clone of it) with the same layout;
/// - a zero-sized request returns a dangling, well-aligned pointer which
///   `deallocate` accepts as a no-op.
pub unsafe trait Allocator {
    /// Allocate memory fitting `layout`.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Release memory previously returned by `allocate`.
    ///
    /// # Safety
    /// - `ptr` must come from `allocate` on this allocator.
    /// - `layout` must be the layout it was allocated with.
    /// - `ptr` must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

unsafe impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout)
    }
}

unsafe impl<A: Allocator + ?Sized> Allocator for std::sync::Arc<A> {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout)
    }
}

/// The process-wide global allocator, i.e. the one `Box` uses.
///
/// Memory obtained from `Box::into_raw` may be released through `Global`
/// with `Layout::for_value` of the boxed value.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Global;

unsafe impl Allocator for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling(layout));
        }
        // SAFETY: layout has non-zero size.
        let raw = unsafe { std::alloc::alloc(layout) };
        NonNull::new(raw).ok_or(AllocError)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            std::alloc::dealloc(ptr.as_ptr(), layout)
        }
    }
}

/// Well-aligned dangling pointer for zero-sized requests.
#[inline]
pub(crate) fn dangling(layout: Layout) -> NonNull<u8> {
    // Alignment is a non-zero power of two.
    NonNull::new(layout.align() as *mut u8).unwrap_or(NonNull::dangling())
}
