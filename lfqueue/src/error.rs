use std::fmt;

/// Returned by an enqueue whose node could not be allocated.
///
/// The rejected item is handed back untouched and the queue is left as it
/// was.
#[derive(thiserror::Error)]
#[error("failed to allocate a queue node")]
pub struct AllocError<T>(pub T);

impl<T> AllocError<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for AllocError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AllocError").finish_non_exhaustive()
    }
}
