//! The never-yielding source.

use super::Source;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Returns a source that never yields, never ends, and never fails.
///
/// This is the degenerate never-ending sequence: the only way out of a loop
/// consuming it is external cancellation. Useful for tests that exercise the
/// cancellation path of a driver loop.
#[must_use]
pub fn pending<T, E>() -> Pending<T, E> {
    Pending {
        _marker: PhantomData,
    }
}

/// Source produced by [`pending`].
#[derive(Debug)]
pub struct Pending<T, E> {
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> Unpin for Pending<T, E> {}

impl<T, E> Source for Pending<T, E> {
    type Item = T;
    type Error = E;

    fn poll_next(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<T, E>>> {
        // Never wakes on its own; the consumer must race a cancellation.
        Poll::Pending
    }
}
