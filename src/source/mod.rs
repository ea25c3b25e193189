//! Async sources: never-ending (or finite) sequences of items.
//!
//! A [`Source`] is the async equivalent of a fallible [`Iterator`]: each poll
//! may suspend the caller until an item is available, and a source may run
//! forever. Stopping consumption of a never-ending source is the cancellation
//! token's job, not the source's.
//!
//! # Contract
//!
//! - A source is single-consumer and single-pass; restart is never required.
//! - `Poll::Ready(Some(Ok(item)))`: the next item, in order.
//! - `Poll::Ready(Some(Err(e)))`: the source failed; a well-behaved source
//!   yields `None` on any further poll.
//! - `Poll::Ready(None)`: end-of-source, a natural end distinct from both
//!   failure and cancellation.
//!
//! # Provided sources
//!
//! - [`iter`]: finite source over an iterator
//! - [`pending`]: the degenerate never-ending source that never yields
//! - [`queue`]: handle-fed source with waker-based wakeup, close, and fail

mod iter;
mod next;
mod pending;
mod queue;

pub use iter::{iter, Iter};
pub use next::Next;
pub use pending::{pending, Pending};
pub use queue::{queue, QueueHandle, QueueSource};

use std::pin::Pin;
use std::task::{Context, Poll};

/// An asynchronous sequence of items, each of which may be an error.
pub trait Source {
    /// The item type yielded by this source.
    type Item;
    /// The error type reported by this source.
    type Error;

    /// Attempts to pull the next item out of this source.
    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Item, Self::Error>>>;
}

impl<S: Source + Unpin + ?Sized> Source for &mut S {
    type Item = S::Item;
    type Error = S::Error;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Item, Self::Error>>> {
        Pin::new(&mut **self).poll_next(cx)
    }
}

impl<S: Source + Unpin + ?Sized> Source for Box<S> {
    type Item = S::Item;
    type Error = S::Error;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Item, Self::Error>>> {
        Pin::new(&mut **self).poll_next(cx)
    }
}

/// Extension trait providing convenience methods for sources.
///
/// Automatically implemented for all types that implement [`Source`].
pub trait SourceExt: Source {
    /// Returns a future resolving to the next item from the source.
    fn next(&mut self) -> Next<'_, Self>
    where
        Self: Unpin,
    {
        Next::new(self)
    }
}

impl<S: Source + ?Sized> SourceExt for S {}
