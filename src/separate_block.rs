//! Control block for an adopted value living in its own allocation.

use crate::allocator::Allocator;
use crate::control_block::{BlockHeader, ControlBlock};
use crate::error::AllocError;
use core::alloc::Layout;
use core::ptr::{self, NonNull};

#[repr(C)]
pub(crate) struct SeparateBlock<T: ?Sized, A: Allocator> {
    header: BlockHeader,
    alloc: A,
    value: NonNull<T>,
}

impl<T: ?Sized, A: Allocator> SeparateBlock<T, A> {
    /// Allocate a block (from `alloc`) that takes ownership of `value`.
    ///
    /// If the block cannot be allocated the value is dropped and its memory
    /// released before the error is returned, so ownership of `value` always
    /// transfers.
    ///
    /// # Safety
    /// `value` must point to a live `T` allocated by `alloc` with
    /// `Layout::for_value` of that `T`, and nothing else may free it.
    pub(crate) unsafe fn adopt(
        value: NonNull<T>,
        alloc: A,
    ) -> Result<NonNull<BlockHeader>, AllocError> {
        let layout = Layout::new::<Self>();
        let mem = match alloc.allocate(layout) {
            Ok(mem) => mem,
            Err(e) => {
                log::debug!("control block allocation failed; releasing adopted value");
                release_value(value, &alloc);
                return Err(e);
            }
        };
        let block = mem.cast::<Self>();
        block.as_ptr().write(Self {
            header: BlockHeader::new::<Self>(),
            alloc,
            value,
        });
        Ok(block.cast())
    }
}

/// Drop the value, then hand its memory back to `alloc`.
unsafe fn release_value<T: ?Sized, A: Allocator>(value: NonNull<T>, alloc: &A) {
    let layout = Layout::for_value(value.as_ref());
    ptr::drop_in_place(value.as_ptr());
    alloc.deallocate(value.cast(), layout);
}

unsafe impl<T: ?Sized, A: Allocator> ControlBlock for SeparateBlock<T, A> {
    unsafe fn get_ptr(this: NonNull<Self>) -> NonNull<u8> {
        (*this.as_ptr()).value.cast()
    }

    unsafe fn destroy(this: NonNull<Self>) {
        let block = this.as_ptr();
        let value = (*block).value;
        // Move the allocator out: it must outlive the block's own memory.
        let alloc = ptr::read(ptr::addr_of!((*block).alloc));
        release_value(value, &alloc);
        alloc.deallocate(this.cast(), Layout::new::<Self>());
    }
}
