//! shared-ptr: a thread-safe, reference-counted shared-ownership pointer
//! with pluggable allocators and an in-place control-block layout.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: many independent handles jointly own one heap value; the value
//!   is destroyed exactly once, by whichever thread drops the last handle.
//! - Layers (leaves first):
//!   - AllocGuard: scope-bound owner of one raw allocation; releases it on
//!     early exit (error or panic) unless disarmed.
//!   - AtomicCount: lock-free owner count; `dec` tells the caller whether it
//!     released the last owner.
//!   - Control blocks: a `BlockHeader` (count + static vtable) followed by
//!     layout-specific data. `SeparateBlock` adopts a value living in its own
//!     allocation; `InPlaceBlock` embeds the value in one combined allocation.
//!   - RefCount: the minimal owning handle to a control block. Clone takes a
//!     count, drop gives it back, equality is block identity.
//!   - Shared<T>: public API; a RefCount plus a cached pointer for direct
//!     dereference, with widening to trait objects.
//!
//! Constraints
//! - Thread-safe lifetime only: the count is atomic, the value is not
//!   synchronized. Mutation through shared handles needs interior
//!   mutability (`Mutex`, atomics) or `Shared::get_mut` when unique.
//! - `Shared<T>` carries no allocator parameter: the allocator is stored in
//!   the control block and reached through the vtable at teardown.
//! - Construction is allocate, then construct, then disarm. A failing or
//!   panicking constructor releases the memory exactly once.
//! - Adopting a null pointer allocates nothing and yields an empty pointer.
//!
//! Why this split?
//! - Localize unsafety: raw layout handling lives in the two block modules,
//!   counting in `counter`, and `Shared` only ever holds a valid pair.
//! - One teardown path: every block is destroyed through
//!   `control_block::decrement`, which only the last owner gets past.
//!
//! Overflow semantics
//! - Counts above `isize::MAX` abort the process, matching `Arc`.
//!
//! Notes and non-goals
//! - No weak handles.
//! - Widening is limited to views of the same value (`Widen`), typically a
//!   concrete type to a trait object it implements; there is no downcast.
//! - Dereferencing an empty `Shared` panics; use `Shared::get` to check.

pub mod allocator;
mod control_block;
mod counter;
pub mod error;
mod factory;
pub mod guard;
mod in_place_block;
mod ref_count;
mod separate_block;
mod shared;
mod shared_proptest;

// Public surface
pub use allocator::{Allocator, Global};
pub use counter::{AtomicCount, Count};
pub use error::{AllocError, SharedError};
pub use factory::{
    allocate_shared, allocate_shared_with, make_shared, make_shared_with, try_allocate_shared_with,
};
pub use guard::AllocGuard;
pub use shared::{swap, Shared, Widen};

#[cfg(feature = "bench_internal")]
pub use ref_count::RefCount;
