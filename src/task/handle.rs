//! Task status reporting: the handle half of a scoped task.

use crate::cancel::CancelToken;
use crate::types::{CancelReason, TaskOutcome};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Shared slot a driver writes its terminal outcome into.
#[derive(Debug)]
pub(crate) struct StatusSlot<E> {
    inner: StdMutex<SlotState<E>>,
}

#[derive(Debug)]
struct SlotState<E> {
    outcome: Option<TaskOutcome<E>>,
    joiners: Vec<Waker>,
}

impl<E> StatusSlot<E> {
    pub(crate) fn new() -> Self {
        Self {
            inner: StdMutex::new(SlotState {
                outcome: None,
                joiners: Vec::new(),
            }),
        }
    }

    /// Records the terminal outcome and wakes joiners. First write wins; a
    /// terminal task is never resumed or re-terminated.
    pub(crate) fn complete(&self, outcome: TaskOutcome<E>) {
        let joiners = {
            let mut state = lock(&self.inner);
            if state.outcome.is_some() {
                return;
            }
            state.outcome = Some(outcome);
            std::mem::take(&mut state.joiners)
        };
        for waker in joiners {
            waker.wake();
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        lock(&self.inner).outcome.is_some()
    }

    pub(crate) fn outcome(&self) -> Option<TaskOutcome<E>>
    where
        E: Clone,
    {
        lock(&self.inner).outcome.clone()
    }

    /// Registers a joiner waker, or returns the outcome if already terminal.
    fn register(&self, waker: &Waker) -> Option<TaskOutcome<E>>
    where
        E: Clone,
    {
        let mut state = lock(&self.inner);
        if let Some(outcome) = state.outcome.clone() {
            return Some(outcome);
        }
        if !state.joiners.iter().any(|w| w.will_wake(waker)) {
            state.joiners.push(waker.clone());
        }
        None
    }
}

fn lock<E>(mutex: &StdMutex<SlotState<E>>) -> std::sync::MutexGuard<'_, SlotState<E>> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// A handle to a running (or finished) scoped task.
///
/// The handle exposes the task's terminal state to whoever owns the scope
/// manager, and carries the task's cancellation token. Dropping the handle
/// does not cancel the task; cancellation is always an explicit request.
#[derive(Debug)]
pub struct TaskHandle<E> {
    token: CancelToken,
    status: Arc<StatusSlot<E>>,
}

impl<E> Clone for TaskHandle<E> {
    fn clone(&self) -> Self {
        Self {
            token: self.token.clone(),
            status: Arc::clone(&self.status),
        }
    }
}

impl<E> TaskHandle<E> {
    pub(crate) fn new(token: CancelToken, status: Arc<StatusSlot<E>>) -> Self {
        Self { token, status }
    }

    /// Returns the task's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.token
    }

    /// Requests cancellation of the task with the given reason.
    pub fn cancel(&self, reason: CancelReason) {
        self.token.request_cancel(reason);
    }

    /// Returns true once the task has reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Returns the terminal outcome, if the task has finished.
    #[must_use]
    pub fn outcome(&self) -> Option<TaskOutcome<E>>
    where
        E: Clone,
    {
        self.status.outcome()
    }

    /// Returns a future resolving to the task's terminal outcome.
    #[must_use]
    pub fn join(&self) -> Join<E> {
        Join {
            handle: self.clone(),
        }
    }
}

/// Future returned by [`TaskHandle::join`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Join<E> {
    handle: TaskHandle<E>,
}

impl<E> Unpin for Join<E> {}

impl<E: Clone> Future for Join<E> {
    type Output = TaskOutcome<E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.handle.status.register(cx.waker()) {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}
