//! Free-function factories.
//!
//! These build the in-place layout: one allocation for the count, the
//! allocator and the value. Prefer them over adopting a `Box` whenever the
//! value does not exist yet.

use crate::allocator::Allocator;
use crate::error::{AllocError, SharedError};
use crate::shared::Shared;

/// Construct `value` in a fresh block from the global allocator.
pub fn make_shared<T>(value: T) -> Shared<T> {
    Shared::new(value)
}

/// Allocate from the global allocator first, then build the value with
/// `init`. Useful when construction should not start unless memory is
/// available.
pub fn make_shared_with<T, F>(init: F) -> Shared<T>
where
    F: FnOnce() -> T,
{
    Shared::new_with(init)
}

/// Construct `value` in a fresh block from `alloc`.
pub fn allocate_shared<T, A>(alloc: A, value: T) -> Result<Shared<T>, AllocError>
where
    A: Allocator + Send + Sync + 'static,
{
    Shared::try_new_in(value, alloc)
}

/// Allocate a block from `alloc`, then build the value with `init`. If
/// `init` panics, the block is released before the panic propagates.
pub fn allocate_shared_with<T, A, F>(alloc: A, init: F) -> Result<Shared<T>, AllocError>
where
    A: Allocator + Send + Sync + 'static,
    F: FnOnce() -> T,
{
    Shared::new_with_in(alloc, init)
}

/// Allocate a block from `alloc`, then run the fallible constructor `init`.
pub fn try_allocate_shared_with<T, A, E, F>(
    alloc: A,
    init: F,
) -> Result<Shared<T>, SharedError<E>>
where
    A: Allocator + Send + Sync + 'static,
    F: FnOnce() -> Result<T, E>,
{
    Shared::try_new_with_in(alloc, init)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Global;

    #[test]
    fn make_shared_builds_in_place() {
        let p = make_shared(String::from("Hello World!"));
        assert_eq!(*p, "Hello World!");
        assert_eq!(p.strong_count(), 1);
    }

    #[test]
    fn make_shared_with_runs_constructor_once() {
        let mut runs = 0;
        let p = make_shared_with(|| {
            runs += 1;
            vec![1, 2, 3]
        });
        assert_eq!(runs, 1);
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn try_allocate_reports_constructor_error() {
        let res: Result<Shared<u8>, _> = try_allocate_shared_with(Global, || Err("bad object"));
        assert_eq!(res.unwrap_err(), SharedError::Construct("bad object"));
    }

    #[test]
    fn allocate_shared_with_global() {
        let p = allocate_shared(Global, 10u64).unwrap();
        assert_eq!(*p, 10);
        let q = allocate_shared_with(Global, || 11u64).unwrap();
        assert_ne!(p, q);
    }
}
