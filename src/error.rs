//! Recoverable failures surfaced by the factories.

use thiserror::Error;

/// The allocator could not provide memory.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Error)]
#[error("memory allocation failed")]
pub struct AllocError;

/// Failure of a fallible in-place construction.
///
/// Either no memory was obtained, or memory was obtained and the value's
/// constructor reported an error. In the second case the memory has
/// already been returned to the allocator when the caller sees this.
#[derive(Debug, Eq, PartialEq, Error)]
pub enum SharedError<E> {
    #[error(transparent)]
    Alloc(#[from] AllocError),
    #[error("value construction failed: {0}")]
    Construct(E),
}

impl<E> SharedError<E> {
    /// The constructor's error, if that is what failed.
    pub fn into_construct(self) -> Option<E> {
        match self {
            SharedError::Construct(e) => Some(e),
            SharedError::Alloc(_) => None,
        }
    }
}
