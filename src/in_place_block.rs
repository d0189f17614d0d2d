//! Control block with the value embedded in the same allocation.
//!
//! Construction is two-phase: the combined block is allocated and guarded
//! first, then the value's constructor runs. If the constructor returns an
//! error or panics, the guard hands the block's memory back to the
//! allocator; nothing was written into it that needs dropping. The guard is
//! disarmed only after the value is in place.

use crate::allocator::Allocator;
use crate::control_block::{BlockHeader, ControlBlock};
use crate::error::SharedError;
use crate::guard::AllocGuard;
use core::alloc::Layout;
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

#[repr(C)]
pub(crate) struct InPlaceBlock<T, A: Allocator> {
    header: BlockHeader,
    alloc: MaybeUninit<A>,
    value: MaybeUninit<T>,
}

impl<T, A: Allocator> InPlaceBlock<T, A> {
    /// Allocate a combined block from `alloc` and construct its value with
    /// `init`. Returns the block and the address of the embedded value.
    pub(crate) fn try_new_with<E, F>(
        alloc: A,
        init: F,
    ) -> Result<(NonNull<BlockHeader>, NonNull<T>), SharedError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let mut guard = AllocGuard::allocate(&alloc, Layout::new::<Self>())?;
        let block = guard.as_ptr().cast::<Self>().as_ptr();

        let value = init().map_err(|e| {
            log::debug!("in-place construction failed; releasing block {:p}", block);
            SharedError::Construct(e)
        })?;

        // SAFETY: `block` is a live, suitably aligned allocation for `Self`.
        let value_ptr = unsafe {
            ptr::addr_of_mut!((*block).header).write(BlockHeader::new::<Self>());
            let slot = ptr::addr_of_mut!((*block).value).cast::<T>();
            slot.write(value);
            NonNull::new_unchecked(slot)
        };
        guard.disarm();
        drop(guard);

        // The allocator moves in last, once nothing borrows it.
        unsafe { ptr::addr_of_mut!((*block).alloc).cast::<A>().write(alloc) };

        // SAFETY: allocations are non-null.
        let header = unsafe { NonNull::new_unchecked(block) }.cast::<BlockHeader>();
        Ok((header, value_ptr))
    }
}

unsafe impl<T, A: Allocator> ControlBlock for InPlaceBlock<T, A> {
    unsafe fn get_ptr(this: NonNull<Self>) -> NonNull<u8> {
        NonNull::new_unchecked(ptr::addr_of_mut!((*this.as_ptr()).value)).cast()
    }

    unsafe fn destroy(this: NonNull<Self>) {
        let block = this.as_ptr();
        ptr::drop_in_place(ptr::addr_of_mut!((*block).value).cast::<T>());
        let alloc = ptr::read(ptr::addr_of!((*block).alloc).cast::<A>());
        alloc.deallocate(this.cast(), Layout::new::<Self>());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Global;
    use crate::control_block::{decrement, get_ptr, use_count};
    use crate::error::AllocError;
    use std::cell::Cell;
    use std::convert::Infallible;

    #[derive(Default)]
    struct Tally {
        allocs: Cell<usize>,
        frees: Cell<usize>,
        fail: bool,
    }

    unsafe impl Allocator for Tally {
        fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
            if self.fail {
                return Err(AllocError);
            }
            self.allocs.set(self.allocs.get() + 1);
            Global.allocate(layout)
        }
        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            self.frees.set(self.frees.get() + 1);
            Global.deallocate(ptr, layout)
        }
    }

    #[test]
    fn single_allocation_holds_block_and_value() {
        let t = Tally::default();
        let (b, v) = InPlaceBlock::<String, &Tally>::try_new_with(&t, || {
            Ok::<_, Infallible>("hello".to_string())
        })
        .unwrap();
        unsafe {
            assert_eq!(v.as_ref(), "hello");
            assert_eq!(get_ptr(b), v.cast::<u8>());
            assert_eq!(use_count(b), 1);
        }
        assert_eq!(t.allocs.get(), 1);
        unsafe { decrement(b) };
        assert_eq!(t.frees.get(), 1);
    }

    #[test]
    fn constructor_error_releases_block_once() {
        let t = Tally::default();
        let res = InPlaceBlock::<u64, &Tally>::try_new_with(&t, || Err("bad object"));
        assert!(matches!(res, Err(SharedError::Construct("bad object"))));
        assert_eq!(t.allocs.get(), 1);
        assert_eq!(t.frees.get(), 1);
    }

    #[test]
    fn allocation_failure_skips_constructor() {
        let t = Tally {
            fail: true,
            ..Tally::default()
        };
        let ran = Cell::new(false);
        let res = InPlaceBlock::<u64, &Tally>::try_new_with(&t, || {
            ran.set(true);
            Ok::<_, Infallible>(1)
        });
        assert!(matches!(res, Err(SharedError::Alloc(AllocError))));
        assert!(!ran.get());
        assert_eq!(t.frees.get(), 0);
    }

    #[test]
    fn constructor_panic_releases_block_once() {
        let t = Tally::default();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = InPlaceBlock::<u64, &Tally>::try_new_with(&t, || -> Result<u64, Infallible> {
                panic!("bad object")
            });
        }));
        assert!(res.is_err());
        assert_eq!(t.allocs.get(), 1);
        assert_eq!(t.frees.get(), 1);
    }
}
