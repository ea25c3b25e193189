//! Cancellation token with cancel-aware waiting.
//!
//! [`CancelToken`] is a shared, monotonic flag: once it transitions to the
//! cancelled state it never reverts. The scope manager holds one clone and
//! requests cancellation on key change or scope teardown; the driver loop
//! observes the same token between and during awaits.
//!
//! # Cancel Safety
//!
//! - `cancelled().await`: cancel-safe, the waiter is removed on drop
//! - `request_cancel`: idempotent; observers are woken exactly once per
//!   transition, later calls only strengthen the recorded reason

use crate::types::CancelReason;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// A shared cancellation flag with waker-based observation.
///
/// Cloning a token yields another handle to the same flag; there is no
/// parent/child hierarchy. The token is the only piece of scoped-task state
/// mutated from outside the task itself.
///
/// # Example
///
/// ```ignore
/// let token = CancelToken::new();
/// let observer = token.clone();
///
/// token.request_cancel(CancelReason::scope_closed());
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Monotonic cancelled flag. Readable without taking the lock.
    cancelled: AtomicBool,
    /// Reason and waiters, guarded together so a waiter never observes the
    /// flag set while the reason is still unset.
    state: StdMutex<TokenState>,
}

#[derive(Debug)]
struct TokenState {
    reason: Option<CancelReason>,
    waiters: WaiterSlab,
}

/// Slab-like storage for waiters that reuses freed slots so cancelled
/// observers do not leave the waiter list growing without bound.
#[derive(Debug)]
struct WaiterSlab {
    entries: Vec<Option<Waker>>,
    free_slots: Vec<usize>,
}

impl WaiterSlab {
    const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_slots: Vec::new(),
        }
    }

    fn insert(&mut self, waker: Waker) -> usize {
        if let Some(index) = self.free_slots.pop() {
            self.entries[index] = Some(waker);
            index
        } else {
            let index = self.entries.len();
            self.entries.push(Some(waker));
            index
        }
    }

    fn remove(&mut self, index: usize) {
        if index < self.entries.len() {
            self.entries[index] = None;
            self.free_slots.push(index);
        }

        // Shrink from the end: pop free entries at the tail.
        while self.entries.last().is_some_and(Option::is_none) {
            let tail_idx = self.entries.len() - 1;
            self.entries.pop();
            if let Some(pos) = self.free_slots.iter().position(|&i| i == tail_idx) {
                self.free_slots.swap_remove(pos);
            }
        }
    }

    fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    fn drain(&mut self) -> Vec<Waker> {
        let wakers = self.entries.iter_mut().filter_map(Option::take).collect();
        self.free_slots.clear();
        self.entries.clear();
        wakers
    }
}

impl CancelToken {
    /// Creates a new token in the active (not cancelled) state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                state: StdMutex::new(TokenState {
                    reason: None,
                    waiters: WaiterSlab::new(),
                }),
            }),
        }
    }

    /// Requests cancellation with the given reason.
    ///
    /// The first call transitions the token and wakes every registered
    /// observer; it returns `true`. Later calls never wake anyone again and
    /// only strengthen the recorded reason toward the more severe kind,
    /// returning `false`.
    pub fn request_cancel(&self, reason: CancelReason) -> bool {
        let wakers = {
            let mut state = lock(&self.inner.state);
            match state.reason.as_mut() {
                Some(existing) => {
                    existing.strengthen(&reason);
                    return false;
                }
                None => {
                    state.reason = Some(reason);
                    // Publish the flag while holding the lock so a concurrent
                    // `reason()` after `is_cancelled()` always sees it.
                    self.inner.cancelled.store(true, Ordering::SeqCst);
                    state.waiters.drain()
                }
            }
        };

        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the recorded cancellation reason, if cancelled.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        lock(&self.inner.state).reason.clone()
    }

    /// Returns a future that resolves once cancellation is requested.
    ///
    /// The future owns a token clone, so it is `'static` and can be raced
    /// against other suspension points inside a driver loop.
    #[must_use]
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            token: self.clone(),
            waiter: None,
            done: false,
        }
    }

    /// Returns the number of observers currently suspended on this token.
    ///
    /// Intended for leak diagnostics and tests.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        lock(&self.inner.state).waiters.active_count()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(mutex: &StdMutex<TokenState>) -> std::sync::MutexGuard<'_, TokenState> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Future returned by [`CancelToken::cancelled`].
///
/// Resolves to the recorded [`CancelReason`] once the token is cancelled.
#[derive(Debug)]
pub struct Cancelled {
    token: CancelToken,
    waiter: Option<usize>,
    done: bool,
}

impl Future for Cancelled {
    type Output = CancelReason;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<CancelReason> {
        let this = &mut *self;
        if this.done {
            // Polled after completion; stay pending like a fused future.
            return Poll::Pending;
        }

        let mut state = lock(&this.token.inner.state);
        if let Some(reason) = state.reason.clone() {
            if let Some(index) = this.waiter.take() {
                state.waiters.remove(index);
            }
            drop(state);
            this.done = true;
            return Poll::Ready(reason);
        }

        match this.waiter {
            Some(index) => {
                // Refresh the stored waker in place.
                state.waiters.entries[index] = Some(cx.waker().clone());
            }
            None => {
                let index = state.waiters.insert(cx.waker().clone());
                drop(state);
                this.waiter = Some(index);
            }
        }
        Poll::Pending
    }
}

impl Drop for Cancelled {
    fn drop(&mut self) {
        if let Some(index) = self.waiter.take() {
            let mut state = lock(&self.token.inner.state);
            state.waiters.remove(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use crate::types::{CancelKind, CancelReason};
    use std::sync::Arc;
    use std::task::Wake;

    struct NoopWaker;

    impl Wake for NoopWaker {
        fn wake(self: Arc<Self>) {}
    }

    fn noop_waker() -> Waker {
        Arc::new(NoopWaker).into()
    }

    fn poll_once<F>(fut: &mut F) -> Poll<F::Output>
    where
        F: Future + Unpin,
    {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        Pin::new(fut).poll(&mut cx)
    }

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn request_cancel_is_monotonic_and_idempotent() {
        init_test("request_cancel_is_monotonic_and_idempotent");
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let first = token.request_cancel(CancelReason::user("stop"));
        crate::assert_with_log!(first, "first transition", true, first);
        assert!(token.is_cancelled());

        let second = token.request_cancel(CancelReason::user("stop again"));
        crate::assert_with_log!(!second, "second is no-op", false, second);
        assert!(token.is_cancelled());
        crate::test_complete!("request_cancel_is_monotonic_and_idempotent");
    }

    #[test]
    fn later_requests_strengthen_reason() {
        init_test("later_requests_strengthen_reason");
        let token = CancelToken::new();
        token.request_cancel(CancelReason::user("first"));
        token.request_cancel(CancelReason::shutdown());

        let reason = token.reason().expect("reason recorded");
        crate::assert_with_log!(
            reason.kind == CancelKind::Shutdown,
            "reason strengthened",
            CancelKind::Shutdown,
            reason.kind
        );
        crate::test_complete!("later_requests_strengthen_reason");
    }

    #[test]
    fn cancelled_future_resolves_on_request() {
        init_test("cancelled_future_resolves_on_request");
        let token = CancelToken::new();
        let mut fut = token.cancelled();

        let pending = poll_once(&mut fut).is_pending();
        crate::assert_with_log!(pending, "pending before cancel", true, pending);
        assert_eq!(token.observer_count(), 1);

        token.request_cancel(CancelReason::key_changed());
        match poll_once(&mut fut) {
            Poll::Ready(reason) => assert_eq!(reason.kind, CancelKind::KeyChanged),
            Poll::Pending => panic!("expected Ready after cancel"),
        }
        assert_eq!(token.observer_count(), 0);
        crate::test_complete!("cancelled_future_resolves_on_request");
    }

    #[test]
    fn cancelled_future_ready_immediately_when_already_cancelled() {
        init_test("cancelled_future_ready_immediately_when_already_cancelled");
        let token = CancelToken::new();
        token.request_cancel(CancelReason::scope_closed());

        let mut fut = token.cancelled();
        let ready = poll_once(&mut fut).is_ready();
        crate::assert_with_log!(ready, "ready immediately", true, ready);
        crate::test_complete!("cancelled_future_ready_immediately_when_already_cancelled");
    }

    #[test]
    fn dropped_observer_is_removed() {
        init_test("dropped_observer_is_removed");
        let token = CancelToken::new();

        let mut fut1 = token.cancelled();
        let mut fut2 = token.cancelled();
        let mut fut3 = token.cancelled();
        assert!(poll_once(&mut fut1).is_pending());
        assert!(poll_once(&mut fut2).is_pending());
        assert!(poll_once(&mut fut3).is_pending());
        assert_eq!(token.observer_count(), 3);

        // Drop the middle observer; its slot must be reclaimed.
        drop(fut2);
        assert_eq!(token.observer_count(), 2);

        drop(fut1);
        drop(fut3);
        assert_eq!(token.observer_count(), 0);
        crate::test_complete!("dropped_observer_is_removed");
    }

    #[test]
    fn repeated_register_and_drop_does_not_grow() {
        init_test("repeated_register_and_drop_does_not_grow");
        let token = CancelToken::new();
        for _ in 0..100 {
            let mut fut = token.cancelled();
            assert!(poll_once(&mut fut).is_pending());
            drop(fut);
        }
        assert_eq!(token.observer_count(), 0);
        crate::test_complete!("repeated_register_and_drop_does_not_grow");
    }

    #[test]
    fn clones_share_the_flag() {
        init_test("clones_share_the_flag");
        let token = CancelToken::new();
        let observer = token.clone();
        token.request_cancel(CancelReason::default());
        assert!(observer.is_cancelled());
        crate::test_complete!("clones_share_the_flag");
    }
}
