//! `Shared<T>`: the user-facing shared-ownership pointer.
//!
//! A `Shared` pairs a `RefCount` with a cached pointer to the value, so
//! dereferencing never goes through the control block. The two are either
//! both present (owning) or both absent (empty).

use crate::allocator::{Allocator, Global};
use crate::error::{AllocError, SharedError};
use crate::in_place_block::InPlaceBlock;
use crate::ref_count::RefCount;
use crate::separate_block::SeparateBlock;
use core::alloc::Layout;
use core::convert::Infallible;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::NonNull;

pub struct Shared<T: ?Sized> {
    refcount: RefCount,
    ptr: Option<NonNull<T>>,
    // Shared owns a T for drop-check purposes.
    _owns: PhantomData<T>,
}

// The count is atomic, so handles may move and be shared across threads as
// long as the value itself may be (it is dropped by whichever thread holds
// the last handle, and read through `&T` from any).
unsafe impl<T: ?Sized + Send + Sync> Send for Shared<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for Shared<T> {}

/// Widening conversion from a concrete pointee to one of its views,
/// typically a trait object it implements.
///
/// Implement with the [`widen!`](crate::widen) macro.
pub trait Widen<U: ?Sized> {
    fn widen(&self) -> &U;
}

impl<T: ?Sized> Widen<T> for T {
    #[inline]
    fn widen(&self) -> &T {
        self
    }
}

/// Declare that a type widens to a trait object it implements.
///
/// ```
/// use shared_ptr::{widen, Shared};
///
/// trait Shape {
///     fn sides(&self) -> u32;
/// }
/// struct Square;
/// impl Shape for Square {
///     fn sides(&self) -> u32 {
///         4
///     }
/// }
/// widen!(Square => dyn Shape);
///
/// let s: Shared<dyn Shape> = Shared::new(Square).widen();
/// assert_eq!(s.sides(), 4);
/// ```
#[macro_export]
macro_rules! widen {
    ($from:ty => dyn $($bound:tt)+) => {
        impl $crate::Widen<dyn $($bound)+> for $from {
            #[inline]
            fn widen(&self) -> &(dyn $($bound)+ + 'static) {
                self
            }
        }
    };
}

impl<T: ?Sized> Shared<T> {
    /// An empty pointer; owns nothing and allocates nothing.
    pub const fn empty() -> Self {
        Self {
            refcount: RefCount::empty(),
            ptr: None,
            _owns: PhantomData,
        }
    }

    /// Adopt a boxed value (separate layout).
    pub fn from_box(value: Box<T>) -> Self {
        let raw = Box::into_raw(value);
        // SAFETY: Box allocates through the global allocator with
        // Layout::for_value, which is what `Global` releases with.
        unsafe { Self::from_raw_in(raw, Global) }
    }

    /// Adopt a pointer obtained from `Box::into_raw`. Null yields an empty
    /// pointer without allocating a control block.
    ///
    /// # Safety
    /// `ptr` must be null or come from `Box::into_raw`, and must not be
    /// freed by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self::from_raw_in(ptr, Global)
    }

    /// Adopt a value allocated from `alloc` (separate layout).
    ///
    /// Aborts through `handle_alloc_error` if the control block cannot be
    /// allocated; the adopted value is released first.
    ///
    /// # Safety
    /// See [`Shared::try_from_raw_in`].
    pub unsafe fn from_raw_in<A>(ptr: *mut T, alloc: A) -> Self
    where
        A: Allocator + Send + Sync + 'static,
    {
        match Self::try_from_raw_in(ptr, alloc) {
            Ok(s) => s,
            Err(AllocError) => {
                std::alloc::handle_alloc_error(Layout::new::<SeparateBlock<T, A>>())
            }
        }
    }

    /// Adopt a value allocated from `alloc` (separate layout). Null yields
    /// an empty pointer without allocating a control block.
    ///
    /// On allocation failure the value has already been dropped and its
    /// memory returned to the allocator.
    ///
    /// # Safety
    /// `ptr` must be null, or point to a live, initialized `T` allocated by
    /// `alloc` with `Layout::for_value` of that `T`, owned by nobody else.
    pub unsafe fn try_from_raw_in<A>(ptr: *mut T, alloc: A) -> Result<Self, AllocError>
    where
        A: Allocator + Send + Sync + 'static,
    {
        let Some(value) = NonNull::new(ptr) else {
            return Ok(Self::empty());
        };
        let refcount = RefCount::adopt(value, alloc)?;
        Ok(Self::from_parts(refcount, value))
    }

    #[inline]
    fn from_parts(refcount: RefCount, ptr: NonNull<T>) -> Self {
        debug_assert_eq!(refcount.get_ptr(), Some(ptr.cast::<u8>()));
        Self {
            refcount,
            ptr: Some(ptr),
            _owns: PhantomData,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.refcount.is_empty()
    }

    /// The value, or `None` if empty.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: the refcount keeps the value alive while `self` is borrowed.
        self.ptr.map(|p| unsafe { &*p.as_ptr() })
    }

    /// Mutable access when this is the only handle to the block and it
    /// points at the block's value itself.
    ///
    /// A widened view may point elsewhere (a field, or memory the value
    /// merely borrows), so those handles only ever give shared access.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        let p = self.ptr?;
        if self.refcount.use_count() != 1 || self.refcount.get_ptr() != Some(p.cast::<u8>()) {
            return None;
        }
        // SAFETY: sole owner of the block's value, and `&mut self` excludes
        // other borrows.
        Some(unsafe { &mut *p.as_ptr() })
    }

    /// Raw address of the value, or `None` if empty.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Number of handles sharing this control block; 0 when empty.
    #[inline]
    pub fn strong_count(&self) -> usize {
        self.refcount.use_count()
    }

    /// True if both designate the same control block (or both are empty).
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.refcount == other.refcount
    }

    /// Exchange contents with `other`. Never fails.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        self.refcount.swap(&mut other.refcount);
        core::mem::swap(&mut self.ptr, &mut other.ptr);
    }

    /// Copy-and-swap assignment: share `other`'s block, release ours.
    pub fn assign(&mut self, other: &Self) {
        let mut tmp = other.clone();
        self.swap(&mut tmp);
    }

    /// Release this handle's ownership, leaving it empty.
    pub fn reset(&mut self) {
        let mut tmp = Self::empty();
        self.swap(&mut tmp);
    }

    /// Convert into a pointer to a wider view of the same value, sharing
    /// the control block.
    pub fn widen<U: ?Sized>(self) -> Shared<U>
    where
        T: Widen<U> + Send + Sync + 'static,
    {
        self.widen_with(<T as Widen<U>>::widen)
    }

    /// Converting copy: a new handle to a wider view of the same value,
    /// leaving `self` untouched.
    pub fn widened<U: ?Sized>(&self) -> Shared<U>
    where
        T: Widen<U> + Send + Sync + 'static,
    {
        self.clone().widen()
    }

    /// Like [`Shared::widen`], with the conversion given inline. The
    /// result may also point into the value (a field), since the control
    /// block keeps the whole value alive.
    pub fn widen_with<U: ?Sized, F>(mut self, f: F) -> Shared<U>
    where
        T: Send + Sync + 'static,
        F: for<'a> FnOnce(&'a T) -> &'a U,
    {
        // SAFETY: the refcount keeps the value alive during the call.
        let ptr = self.ptr.map(|p| NonNull::from(f(unsafe { &*p.as_ptr() })));
        let refcount = core::mem::take(&mut self.refcount);
        Shared {
            refcount,
            ptr,
            _owns: PhantomData,
        }
    }

    #[cfg(feature = "bench_internal")]
    pub fn handle(&self) -> &RefCount {
        &self.refcount
    }
}

impl<T> Shared<T> {
    /// Construct `value` in a fresh in-place block from the global
    /// allocator. Aborts through `handle_alloc_error` on allocation failure.
    pub fn new(value: T) -> Self {
        Self::new_in(value, Global)
    }

    /// Allocate an in-place block from the global allocator, then run
    /// `init` to build the value into it.
    pub fn new_with<F>(init: F) -> Self
    where
        F: FnOnce() -> T,
    {
        match Self::new_with_in(Global, init) {
            Ok(s) => s,
            Err(AllocError) => {
                std::alloc::handle_alloc_error(Layout::new::<InPlaceBlock<T, Global>>())
            }
        }
    }

    /// Construct `value` in a fresh in-place block from `alloc`. Aborts
    /// through `handle_alloc_error` on allocation failure.
    pub fn new_in<A>(value: T, alloc: A) -> Self
    where
        A: Allocator + Send + Sync + 'static,
    {
        match Self::try_new_in(value, alloc) {
            Ok(s) => s,
            Err(AllocError) => {
                std::alloc::handle_alloc_error(Layout::new::<InPlaceBlock<T, A>>())
            }
        }
    }

    /// Construct `value` in a fresh in-place block from `alloc`.
    pub fn try_new_in<A>(value: T, alloc: A) -> Result<Self, AllocError>
    where
        A: Allocator + Send + Sync + 'static,
    {
        Self::new_with_in(alloc, || value)
    }

    /// Allocate an in-place block from `alloc`, then run `init` to build
    /// the value into it. If `init` panics the block is released and the
    /// panic continues.
    pub fn new_with_in<A, F>(alloc: A, init: F) -> Result<Self, AllocError>
    where
        A: Allocator + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        Self::try_new_with_in(alloc, || Ok::<T, Infallible>(init())).map_err(|e| match e {
            SharedError::Alloc(e) => e,
            SharedError::Construct(never) => match never {},
        })
    }

    /// Allocate an in-place block from `alloc`, then run the fallible
    /// constructor `init`. On `Err` the block is released exactly once and
    /// the constructor's error is returned.
    pub fn try_new_with_in<A, E, F>(alloc: A, init: F) -> Result<Self, SharedError<E>>
    where
        A: Allocator + Send + Sync + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let (refcount, value) = RefCount::try_new_in_place(alloc, init)?;
        Ok(Self::from_parts(refcount, value))
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(v) => v,
            None => panic!("dereferenced an empty Shared"),
        }
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            refcount: self.refcount.clone(),
            ptr: self.ptr,
            _owns: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<T: ?Sized> Default for Shared<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized> From<Box<T>> for Shared<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized> PartialEq for Shared<T> {
    /// Identity: equal iff both designate the same control block.
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: ?Sized> Eq for Shared<T> {}

impl<T: ?Sized> Hash for Shared<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.refcount.hash(state);
    }
}

impl<T: ?Sized> AsRef<T> for Shared<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f.debug_tuple("Shared").field(&v).finish(),
            None => f.write_str("Shared(<empty>)"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ptr {
            Some(p) => fmt::Pointer::fmt(&p, f),
            None => fmt::Pointer::fmt(&core::ptr::null::<u8>(), f),
        }
    }
}

/// Exchange the contents of two pointers.
#[inline]
pub fn swap<T: ?Sized>(a: &mut Shared<T>, b: &mut Shared<T>) {
    a.swap(b);
}
