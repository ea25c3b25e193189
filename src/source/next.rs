//! Next combinator for sources.

use super::Source;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that resolves to the next item from a source.
///
/// Created by [`SourceExt::next`](super::SourceExt::next).
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Next<'a, S: ?Sized> {
    source: &'a mut S,
}

impl<'a, S: Source + Unpin + ?Sized> Next<'a, S> {
    pub(crate) fn new(source: &'a mut S) -> Self {
        Self { source }
    }
}

impl<S: ?Sized> Unpin for Next<'_, S> {}

impl<S: Source + Unpin + ?Sized> Future for Next<'_, S> {
    type Output = Option<Result<S::Item, S::Error>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut *self.source).poll_next(cx)
    }
}
