//! The driver loop: pull items from a source, feed the consumer, stop on
//! cancellation.
//!
//! A [`Driver`] is a future that owns exactly one [`CancelToken`] observer
//! and runs the state machine
//!
//! ```text
//! Starting -> Running -> { Cancelled, Completed, Failed }
//! ```
//!
//! In `Running` it races "next item from the source" against "cancellation
//! signal". Each delivered item is handed to the consumer callback, and the
//! callback's own future is awaited to completion before the next pull:
//! items are processed strictly in source order, one at a time, with no
//! overlapping callback invocations.
//!
//! On any terminal transition the driver drops the source and, if the token
//! is not already cancelled, marks it cancelled so every observer sharing
//! the token sees a consistent terminal signal.

use super::handle::{StatusSlot, TaskHandle};
use crate::cancel::{CancelToken, Cancelled};
use crate::error::TaskError;
use crate::source::Source;
use crate::tracing_compat::{debug, trace, warn};
use crate::types::{CancelReason, TaskOutcome};
use std::future::{ready, Future, Ready};
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Boxed, type-erased driver future, as handed out by the scope manager.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Shorthand for the outcome type a driver resolves to.
pub type DriverOutcome<E> = TaskOutcome<TaskError<E>>;

/// Creates a driver with no setup step.
///
/// `consumer` is invoked once per item, in order; the future it returns is
/// awaited before the next item is pulled. Consumers that need to suspend
/// return a future (boxed if not `Unpin`); purely synchronous consumers
/// return `std::future::ready(Ok(()))`.
pub fn drive<S, C, Fut>(
    token: CancelToken,
    source: S,
    consumer: C,
) -> Driver<S, C, Fut, Ready<Result<(), S::Error>>>
where
    S: Source + Unpin,
    C: FnMut(S::Item) -> Fut,
    Fut: Future<Output = Result<(), S::Error>> + Unpin,
{
    drive_with_setup(token, ready(Ok(())), source, consumer)
}

/// Creates a driver with a one-time setup step.
///
/// Setup runs to completion before the loop starts. If it fails, the task
/// finishes as `Failed(TaskError::Setup)` and the loop never starts; if
/// cancellation is observed while setup is suspended, the task finishes as
/// `Cancelled`.
pub fn drive_with_setup<S, C, Fut, Setup>(
    token: CancelToken,
    setup: Setup,
    source: S,
    consumer: C,
) -> Driver<S, C, Fut, Setup>
where
    S: Source + Unpin,
    C: FnMut(S::Item) -> Fut,
    Fut: Future<Output = Result<(), S::Error>> + Unpin,
    Setup: Future<Output = Result<(), S::Error>> + Unpin,
{
    let cancel_wait = token.cancelled();
    Driver {
        token,
        cancel_wait,
        status: Arc::new(StatusSlot::new()),
        consumer,
        state: DriverState::Starting { setup, source },
    }
}

/// The scoped task's main body; see the module docs.
///
/// Resolves to the task's [`DriverOutcome`]. The same outcome is published
/// through [`TaskHandle`]s obtained from [`Driver::handle`], so the host may
/// discard the future's output.
#[must_use = "futures do nothing unless polled"]
pub struct Driver<S: Source, C, Fut, Setup> {
    token: CancelToken,
    cancel_wait: Cancelled,
    status: Arc<StatusSlot<TaskError<S::Error>>>,
    consumer: C,
    state: DriverState<S, Fut, Setup>,
}

// No field is structurally pinned; every inner future is polled through
// `Pin::new` under its own `Unpin` bound.
impl<S, C, Fut, Setup> Unpin for Driver<S, C, Fut, Setup>
where
    S: Source + Unpin,
    Fut: Unpin,
    Setup: Unpin,
{
}

enum DriverState<S, Fut, Setup> {
    /// One-time setup, before the loop.
    Starting { setup: Setup, source: S },
    /// Waiting for the next item.
    Pulling { source: S },
    /// Waiting for the consumer callback's future.
    Consuming { source: S, in_flight: Fut },
    /// Terminal; the source has been released.
    Done,
}

impl<S, C, Fut, Setup> Driver<S, C, Fut, Setup>
where
    S: Source + Unpin,
    S::Error: Clone,
    C: FnMut(S::Item) -> Fut,
    Fut: Future<Output = Result<(), S::Error>> + Unpin,
    Setup: Future<Output = Result<(), S::Error>> + Unpin,
{
    /// Returns a handle for observing and cancelling this task.
    #[must_use]
    pub fn handle(&self) -> TaskHandle<TaskError<S::Error>> {
        TaskHandle::new(self.token.clone(), Arc::clone(&self.status))
    }

    /// Splits this driver into a handle and a boxed, type-erased future.
    ///
    /// This is the shape scope managers hand back to the host for spawning.
    #[must_use]
    pub fn into_task(self) -> (TaskHandle<TaskError<S::Error>>, TaskFuture)
    where
        S: Send + 'static,
        S::Item: Send,
        S::Error: Send + 'static,
        C: Send + 'static,
        Fut: Send + 'static,
        Setup: Send + 'static,
    {
        let handle = self.handle();
        let fut = Box::pin(async move {
            let _ = self.await;
        });
        (handle, fut)
    }

    /// Transitions to a terminal state: releases the source, marks the token
    /// and publishes the outcome.
    fn finish(&mut self, outcome: DriverOutcome<S::Error>) -> Poll<DriverOutcome<S::Error>> {
        // Dropping the state releases the source and any in-flight callback.
        self.state = DriverState::Done;
        if !self.token.is_cancelled() {
            self.token.request_cancel(CancelReason::finished());
        }
        match &outcome {
            TaskOutcome::Completed => debug!("driver completed: source ended"),
            TaskOutcome::Cancelled(reason) => debug!(%reason, "driver cancelled"),
            TaskOutcome::Failed(error) => warn!(stage = error.stage(), "driver failed"),
        }
        self.status.complete(outcome.clone());
        Poll::Ready(outcome)
    }

    /// Parks the loop at a suspension point, racing the cancellation signal.
    fn pend(&mut self, cx: &mut Context<'_>) -> Poll<DriverOutcome<S::Error>> {
        match Pin::new(&mut self.cancel_wait).poll(cx) {
            Poll::Ready(reason) => self.finish(TaskOutcome::Cancelled(reason)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S, C, Fut, Setup> Future for Driver<S, C, Fut, Setup>
where
    S: Source + Unpin,
    S::Error: Clone,
    C: FnMut(S::Item) -> Fut,
    Fut: Future<Output = Result<(), S::Error>> + Unpin,
    Setup: Future<Output = Result<(), S::Error>> + Unpin,
{
    type Output = DriverOutcome<S::Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        loop {
            if matches!(this.state, DriverState::Done) {
                // Polled after completion; stay pending like a fused future.
                return Poll::Pending;
            }

            // Between-awaits check: cancellation wins over ready work.
            if this.token.is_cancelled() {
                let reason = this.token.reason().unwrap_or_default();
                return this.finish(TaskOutcome::Cancelled(reason));
            }

            match mem::replace(&mut this.state, DriverState::Done) {
                DriverState::Starting { mut setup, source } => {
                    match Pin::new(&mut setup).poll(cx) {
                        Poll::Ready(Ok(())) => {
                            trace!("setup complete, entering driver loop");
                            this.state = DriverState::Pulling { source };
                        }
                        Poll::Ready(Err(e)) => {
                            return this.finish(TaskOutcome::Failed(TaskError::Setup(e)));
                        }
                        Poll::Pending => {
                            this.state = DriverState::Starting { setup, source };
                            return this.pend(cx);
                        }
                    }
                }
                DriverState::Consuming {
                    source,
                    mut in_flight,
                } => match Pin::new(&mut in_flight).poll(cx) {
                    Poll::Ready(Ok(())) => {
                        this.state = DriverState::Pulling { source };
                    }
                    Poll::Ready(Err(e)) => {
                        return this.finish(TaskOutcome::Failed(TaskError::Consumer(e)));
                    }
                    Poll::Pending => {
                        this.state = DriverState::Consuming { source, in_flight };
                        return this.pend(cx);
                    }
                },
                DriverState::Pulling { mut source } => {
                    match Pin::new(&mut source).poll_next(cx) {
                        Poll::Ready(Some(Ok(item))) => {
                            let in_flight = (this.consumer)(item);
                            this.state = DriverState::Consuming { source, in_flight };
                        }
                        Poll::Ready(Some(Err(e))) => {
                            return this.finish(TaskOutcome::Failed(TaskError::Source(e)));
                        }
                        Poll::Ready(None) => {
                            return this.finish(TaskOutcome::Completed);
                        }
                        Poll::Pending => {
                            this.state = DriverState::Pulling { source };
                            return this.pend(cx);
                        }
                    }
                }
                DriverState::Done => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{iter, pending, queue};
    use crate::test_utils::init_test_logging;
    use crate::types::CancelKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Wake, Waker};

    struct NoopWaker;

    impl Wake for NoopWaker {
        fn wake(self: Arc<Self>) {}
    }

    fn poll_driver<F: Future + Unpin>(fut: &mut F) -> Poll<F::Output> {
        let waker: Waker = Arc::new(NoopWaker).into();
        let mut cx = Context::from_waker(&waker);
        Pin::new(fut).poll(&mut cx)
    }

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    type SyncConsumer<E> = Ready<Result<(), E>>;

    fn sync_ok<E>() -> SyncConsumer<E> {
        ready(Ok(()))
    }

    #[test]
    fn finite_source_completes_in_order() {
        init_test("finite_source_completes_in_order");
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);

        let mut driver = drive(
            CancelToken::new(),
            iter::<_, &str>(vec!['a', 'b', 'c']),
            move |item| {
                seen2.lock().unwrap().push(item);
                sync_ok()
            },
        );

        match poll_driver(&mut driver) {
            Poll::Ready(outcome) => assert!(outcome.is_completed()),
            Poll::Pending => panic!("expected Ready"),
        }
        assert_eq!(*seen.lock().unwrap(), vec!['a', 'b', 'c']);
        crate::test_complete!("finite_source_completes_in_order");
    }

    #[test]
    fn source_error_fails_after_delivered_items() {
        init_test("source_error_fails_after_delivered_items");
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);

        let (handle, source) = queue::<i32, &str>();
        handle.push(1);
        handle.fail("socket reset");

        let mut driver = drive(CancelToken::new(), source, move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
            sync_ok()
        });

        match poll_driver(&mut driver) {
            Poll::Ready(TaskOutcome::Failed(TaskError::Source("socket reset"))) => {}
            other => panic!("expected source failure, got {other:?}"),
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
        crate::test_complete!("source_error_fails_after_delivered_items");
    }

    #[test]
    fn consumer_error_fails_task() {
        init_test("consumer_error_fails_task");
        let mut driver = drive(
            CancelToken::new(),
            iter::<_, &str>(vec![1, 2, 3]),
            |item| {
                if item == 2 {
                    ready(Err("persist failed"))
                } else {
                    sync_ok()
                }
            },
        );

        match poll_driver(&mut driver) {
            Poll::Ready(TaskOutcome::Failed(TaskError::Consumer("persist failed"))) => {}
            other => panic!("expected consumer failure, got {other:?}"),
        }
        crate::test_complete!("consumer_error_fails_task");
    }

    #[test]
    fn setup_failure_never_starts_loop() {
        init_test("setup_failure_never_starts_loop");
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);

        let mut driver = drive_with_setup(
            CancelToken::new(),
            ready(Err("no permission")),
            iter::<_, &str>(vec![1, 2]),
            move |_| {
                count2.fetch_add(1, Ordering::SeqCst);
                sync_ok()
            },
        );

        match poll_driver(&mut driver) {
            Poll::Ready(TaskOutcome::Failed(TaskError::Setup("no permission"))) => {}
            other => panic!("expected setup failure, got {other:?}"),
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        crate::test_complete!("setup_failure_never_starts_loop");
    }

    #[test]
    fn cancellation_while_suspended_on_source() {
        init_test("cancellation_while_suspended_on_source");
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);

        let token = CancelToken::new();
        let mut driver = drive(token.clone(), pending::<i32, &str>(), move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
            sync_ok()
        });

        assert!(poll_driver(&mut driver).is_pending());

        token.request_cancel(CancelReason::scope_closed());
        match poll_driver(&mut driver) {
            Poll::Ready(TaskOutcome::Cancelled(reason)) => {
                assert_eq!(reason.kind, CancelKind::ScopeClosed);
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        crate::test_complete!("cancellation_while_suspended_on_source");
    }

    #[test]
    fn terminal_task_marks_its_token() {
        init_test("terminal_task_marks_its_token");
        let token = CancelToken::new();
        let mut driver = drive(token.clone(), iter::<_, &str>(Vec::<i32>::new()), |_| {
            sync_ok()
        });

        assert!(poll_driver(&mut driver).is_ready());
        assert!(token.is_cancelled());
        assert_eq!(
            token.reason().map(|r| r.kind),
            Some(CancelKind::Finished)
        );
        crate::test_complete!("terminal_task_marks_its_token");
    }

    #[test]
    fn handle_observes_outcome() {
        init_test("handle_observes_outcome");
        let mut driver = drive(
            CancelToken::new(),
            iter::<_, &str>(vec![1]),
            |_| sync_ok(),
        );
        let handle = driver.handle();
        assert!(!handle.is_finished());

        assert!(poll_driver(&mut driver).is_ready());
        assert!(handle.is_finished());
        assert!(matches!(handle.outcome(), Some(TaskOutcome::Completed)));
        crate::test_complete!("handle_observes_outcome");
    }

    #[test]
    fn driver_is_fused_after_terminal() {
        init_test("driver_is_fused_after_terminal");
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let mut driver = drive(CancelToken::new(), iter::<_, &str>(vec![1]), move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
            sync_ok()
        });

        assert!(poll_driver(&mut driver).is_ready());
        // No further callback invocation after the terminal state.
        assert!(poll_driver(&mut driver).is_pending());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        crate::test_complete!("driver_is_fused_after_terminal");
    }
}
