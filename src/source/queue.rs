//! Handle-fed source backed by a shared queue.
//!
//! [`queue`] returns a `(QueueHandle, QueueSource)` pair. The handle side
//! pushes items, closes, or fails the source; the source side is polled by a
//! driver loop. Pushing while the consumer is suspended wakes it.
//!
//! This is the workhorse for hosts that bridge callback-style event feeds
//! (notifications, sockets, timers) into a scoped task, and for tests that
//! need precise control over when a source yields.

use super::Source;
use crate::tracing_compat::trace;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::task::{Context, Poll, Waker};

/// Creates a connected handle/source pair.
#[must_use]
pub fn queue<T, E>() -> (QueueHandle<T, E>, QueueSource<T, E>) {
    let shared = Arc::new(StdMutex::new(QueueState {
        items: VecDeque::new(),
        terminal: None,
        waker: None,
        detached: false,
    }));
    (
        QueueHandle {
            shared: Arc::clone(&shared),
        },
        QueueSource { shared },
    )
}

#[derive(Debug)]
enum Terminal<E> {
    Closed,
    Failed(Option<E>),
}

#[derive(Debug)]
struct QueueState<T, E> {
    items: VecDeque<T>,
    terminal: Option<Terminal<E>>,
    waker: Option<Waker>,
    detached: bool,
}

fn lock<T, E>(
    shared: &Arc<StdMutex<QueueState<T, E>>>,
) -> std::sync::MutexGuard<'_, QueueState<T, E>> {
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Producer half of a [`queue`] pair.
///
/// Cloneable; any clone may push, close, or fail. Items pushed after a close
/// or fail are dropped.
#[derive(Debug)]
pub struct QueueHandle<T, E> {
    shared: Arc<StdMutex<QueueState<T, E>>>,
}

impl<T, E> Clone for QueueHandle<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> QueueHandle<T, E> {
    /// Enqueues an item and wakes the consumer if it is suspended.
    pub fn push(&self, item: T) {
        let waker = {
            let mut state = lock(&self.shared);
            if state.terminal.is_some() {
                return;
            }
            state.items.push_back(item);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Marks the source as ended. Queued items are still delivered first.
    pub fn close(&self) {
        self.terminate(Terminal::Closed);
    }

    /// Fails the source. Queued items are still delivered first, then the
    /// error is reported once, after which the source yields end-of-source.
    pub fn fail(&self, error: E) {
        self.terminate(Terminal::Failed(Some(error)));
    }

    /// Returns true if the consumer half has been dropped.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        lock(&self.shared).detached
    }

    fn terminate(&self, terminal: Terminal<E>) {
        let waker = {
            let mut state = lock(&self.shared);
            if state.terminal.is_some() {
                return;
            }
            trace!("queue source terminated by handle");
            state.terminal = Some(terminal);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Consumer half of a [`queue`] pair.
#[derive(Debug)]
pub struct QueueSource<T, E> {
    shared: Arc<StdMutex<QueueState<T, E>>>,
}

impl<T, E> Unpin for QueueSource<T, E> {}

impl<T, E> Drop for QueueSource<T, E> {
    fn drop(&mut self) {
        lock(&self.shared).detached = true;
    }
}

impl<T, E> Source for QueueSource<T, E> {
    type Item = T;
    type Error = E;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<T, E>>> {
        let mut state = lock(&self.shared);

        if let Some(item) = state.items.pop_front() {
            return Poll::Ready(Some(Ok(item)));
        }

        match state.terminal.as_mut() {
            Some(Terminal::Closed) => Poll::Ready(None),
            Some(Terminal::Failed(error)) => match error.take() {
                Some(e) => Poll::Ready(Some(Err(e))),
                // Error already reported; behave like a fused ended source.
                None => Poll::Ready(None),
            },
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
