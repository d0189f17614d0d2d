//! Type-erased control blocks.
//!
//! Every control block starts with a `BlockHeader` (`#[repr(C)]`, first
//! field) holding the owner count and a static vtable. Handles only ever see
//! `NonNull<BlockHeader>`; the vtable recovers the concrete layout when the
//! value's address is needed or when the last owner tears the block down.
//!
//! Two layouts implement `ControlBlock`:
//! - `SeparateBlock`: value lives in its own allocation, adopted by pointer.
//! - `InPlaceBlock`: value is embedded in the block's single allocation.

use crate::counter::{AtomicCount, Count};
use core::ptr::NonNull;

/// Per-layout operations, one static instance per concrete block type.
pub(crate) struct BlockVTable {
    get_ptr: unsafe fn(NonNull<BlockHeader>) -> NonNull<u8>,
    destroy: unsafe fn(NonNull<BlockHeader>),
}

/// Common prefix of every control block.
#[repr(C)]
pub(crate) struct BlockHeader {
    count: AtomicCount,
    vtable: &'static BlockVTable,
}

impl BlockHeader {
    /// Header for a block of type `B`, owned by its creating handle.
    pub(crate) fn new<B: ControlBlock>() -> Self {
        Self {
            count: AtomicCount::new(1),
            vtable: &B::VTABLE,
        }
    }
}

/// A concrete control-block layout.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` with a `BlockHeader` as their first
/// field, so a `NonNull<Self>` and a `NonNull<BlockHeader>` to the same
/// block are interchangeable.
pub(crate) unsafe trait ControlBlock: Sized {
    const VTABLE: BlockVTable = BlockVTable {
        get_ptr: erased_get_ptr::<Self>,
        destroy: erased_destroy::<Self>,
    };

    /// Address of the managed value.
    ///
    /// # Safety
    /// `this` must point to a live block.
    unsafe fn get_ptr(this: NonNull<Self>) -> NonNull<u8>;

    /// Drop the managed value and free every allocation this block owns,
    /// including the block itself.
    ///
    /// # Safety
    /// Called at most once, after the count reached zero. `this` is dangling
    /// afterwards.
    unsafe fn destroy(this: NonNull<Self>);
}

unsafe fn erased_get_ptr<B: ControlBlock>(h: NonNull<BlockHeader>) -> NonNull<u8> {
    B::get_ptr(h.cast())
}

unsafe fn erased_destroy<B: ControlBlock>(h: NonNull<BlockHeader>) {
    B::destroy(h.cast())
}

/// Register one more owner of the block.
///
/// # Safety
/// The caller must already own a count on a live block.
#[inline]
pub(crate) unsafe fn increment(block: NonNull<BlockHeader>) {
    block.as_ref().count.inc();
}

/// Release one owner; the caller that releases the last one destroys the
/// block.
///
/// # Safety
/// The caller must own a count on a live block and give it up here.
#[inline]
pub(crate) unsafe fn decrement(block: NonNull<BlockHeader>) {
    let header = block.as_ref();
    // Read the vtable while our count still pins the block.
    let destroy = header.vtable.destroy;
    if header.count.dec() {
        log::trace!("last owner released control block {:p}", block);
        destroy(block);
    }
}

/// Address of the value managed by the block.
///
/// # Safety
/// The caller must own a count on a live block.
#[inline]
pub(crate) unsafe fn get_ptr(block: NonNull<BlockHeader>) -> NonNull<u8> {
    let get = block.as_ref().vtable.get_ptr;
    get(block)
}

/// Current owner count of the block.
///
/// # Safety
/// The caller must own a count on a live block.
#[inline]
pub(crate) unsafe fn use_count(block: NonNull<BlockHeader>) -> usize {
    block.as_ref().count.load()
}
