//! Source adapter for synchronous iterators.

use super::Source;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Converts an iterator into a finite source that never fails.
///
/// Every item is immediately ready; when the iterator is exhausted the
/// source reports end-of-source.
pub fn iter<I, E>(into_iter: I) -> Iter<I::IntoIter, E>
where
    I: IntoIterator,
{
    Iter {
        iter: into_iter.into_iter(),
        _error: PhantomData,
    }
}

/// Source produced by [`iter`].
#[derive(Debug)]
pub struct Iter<I, E> {
    iter: I,
    _error: PhantomData<E>,
}

impl<I, E> Unpin for Iter<I, E> {}

impl<I: Iterator, E> Source for Iter<I, E> {
    type Item = I::Item;
    type Error = E;

    fn poll_next(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Item, Self::Error>>> {
        Poll::Ready(self.iter.next().map(Ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::task::{Wake, Waker};

    struct NoopWaker;

    impl Wake for NoopWaker {
        fn wake(self: Arc<Self>) {}
    }

    fn noop_waker() -> Waker {
        Waker::from(Arc::new(NoopWaker))
    }

    #[test]
    fn yields_items_then_ends() {
        let mut source = iter::<_, ()>(vec![1, 2]);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        assert!(matches!(
            Pin::new(&mut source).poll_next(&mut cx),
            Poll::Ready(Some(Ok(1)))
        ));
        assert!(matches!(
            Pin::new(&mut source).poll_next(&mut cx),
            Poll::Ready(Some(Ok(2)))
        ));
        assert!(matches!(
            Pin::new(&mut source).poll_next(&mut cx),
            Poll::Ready(None)
        ));
    }
}
