//! RefCount: the smallest owning unit of a control block.
//!
//! A non-empty `RefCount` always accounts for exactly one count on its
//! block. Cloning takes another count before the clone exists; dropping
//! gives the count back, and the drop that gives back the last one destroys
//! the block. Equality is block identity, never value equality.

use crate::allocator::Allocator;
use crate::control_block::{self, BlockHeader};
use crate::error::{AllocError, SharedError};
use crate::in_place_block::InPlaceBlock;
use crate::separate_block::SeparateBlock;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ptr::NonNull;

pub struct RefCount {
    block: Option<NonNull<BlockHeader>>,
}

impl RefCount {
    /// A handle owning nothing.
    pub const fn empty() -> Self {
        Self { block: None }
    }

    /// Build a separate control block around an existing value.
    ///
    /// # Safety
    /// See `SeparateBlock::adopt`.
    pub(crate) unsafe fn adopt<T: ?Sized, A: Allocator>(
        value: NonNull<T>,
        alloc: A,
    ) -> Result<Self, AllocError> {
        let block = SeparateBlock::adopt(value, alloc)?;
        Ok(Self { block: Some(block) })
    }

    /// Build an in-place control block and construct its value; also yields
    /// the value's address.
    pub(crate) fn try_new_in_place<T, A, E, F>(
        alloc: A,
        init: F,
    ) -> Result<(Self, NonNull<T>), SharedError<E>>
    where
        A: Allocator,
        F: FnOnce() -> Result<T, E>,
    {
        let (block, value) = InPlaceBlock::try_new_with(alloc, init)?;
        Ok((Self { block: Some(block) }, value))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.block.is_none()
    }

    /// Number of handles sharing the block; 0 when empty.
    #[inline]
    pub fn use_count(&self) -> usize {
        match self.block {
            // SAFETY: we own a count, so the block is live.
            Some(b) => unsafe { control_block::use_count(b) },
            None => 0,
        }
    }

    /// Address of the managed value, as recorded by the control block.
    #[inline]
    pub fn get_ptr(&self) -> Option<NonNull<u8>> {
        // SAFETY: we own a count, so the block is live.
        self.block.map(|b| unsafe { control_block::get_ptr(b) })
    }

    /// Exchange blocks with `other`. Counts are untouched.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(&mut self.block, &mut other.block);
    }

    /// Copy-and-swap: take a count on `other`'s block, then release ours.
    pub fn assign(&mut self, other: &Self) {
        let mut tmp = other.clone();
        self.swap(&mut tmp);
    }

    /// Identity of the block, for hashing and formatting.
    #[inline]
    pub(crate) fn addr(&self) -> usize {
        self.block.map_or(0, |b| b.as_ptr() as usize)
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::empty()
    }
}

impl Clone for RefCount {
    #[inline]
    fn clone(&self) -> Self {
        if let Some(b) = self.block {
            // SAFETY: we own a count, so the block is live.
            unsafe { control_block::increment(b) };
        }
        Self { block: self.block }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl Drop for RefCount {
    #[inline]
    fn drop(&mut self) {
        if let Some(b) = self.block.take() {
            // SAFETY: we own a count and give it up here.
            unsafe { control_block::decrement(b) };
        }
    }
}

impl PartialEq for RefCount {
    fn eq(&self, other: &Self) -> bool {
        self.block == other.block
    }
}

impl Eq for RefCount {}

impl Hash for RefCount {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCount")
            .field("block", &(self.addr() as *const ()))
            .field("use_count", &self.use_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Global;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Noisy(Arc<AtomicUsize>);

    impl Drop for Noisy {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn in_place(drops: &Arc<AtomicUsize>) -> RefCount {
        let d = drops.clone();
        RefCount::try_new_in_place(Global, move || Ok::<_, Infallible>(Noisy(d)))
            .unwrap()
            .0
    }

    #[test]
    fn empty_handles_are_equal_and_count_nothing() {
        let a = RefCount::empty();
        let b = RefCount::default();
        assert!(a.is_empty());
        assert_eq!(a, b);
        assert_eq!(a.use_count(), 0);
        assert!(a.get_ptr().is_none());
        let c = a.clone();
        assert!(c.is_empty());
    }

    #[test]
    fn clone_and_drop_track_use_count() {
        let drops = Arc::new(AtomicUsize::new(0));
        let a = in_place(&drops);
        assert_eq!(a.use_count(), 1);
        let b = a.clone();
        assert_eq!(a.use_count(), 2);
        assert_eq!(a, b);
        drop(a);
        assert_eq!(b.use_count(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(b);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_blocks_compare_unequal() {
        let drops = Arc::new(AtomicUsize::new(0));
        let a = in_place(&drops);
        let b = in_place(&drops);
        assert_ne!(a, b);
    }

    #[test]
    fn assign_moves_ownership_between_blocks() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a = in_place(&drops);
        let b = in_place(&drops);
        let keep_old = a.clone();
        a.assign(&b);
        assert_eq!(a, b);
        assert_eq!(b.use_count(), 2);
        assert_eq!(keep_old.use_count(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(keep_old);
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        a.assign(&RefCount::empty());
        assert!(a.is_empty());
        assert_eq!(b.use_count(), 1);
    }

    #[test]
    fn self_assignment_keeps_the_block_alive() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a = in_place(&drops);
        let alias = RefCount { block: a.block };
        a.assign(&alias);
        core::mem::forget(alias);
        assert_eq!(a.use_count(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn swap_exchanges_blocks() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a = in_place(&drops);
        let mut b = RefCount::empty();
        let a_ptr = a.get_ptr();
        a.swap(&mut b);
        assert!(a.is_empty());
        assert_eq!(b.get_ptr(), a_ptr);
    }
}
