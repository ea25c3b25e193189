//! Deterministic, single-threaded execution for tests and examples.
//!
//! The lab is not a runtime: it is the minimal machinery needed to exercise
//! scoped tasks without one. [`block_on`] parks the calling thread until a
//! single future resolves. [`LabExecutor`] holds a set of spawned tasks and
//! polls them cooperatively with [`run_until_stalled`](LabExecutor::run_until_stalled),
//! so a test can interleave host actions (push an item, rebind a scope) with
//! task progress at exact points.
//!
//! Polling order is spawn order and wakes are observed as boolean flags, so
//! a given interleaving replays identically across runs.

use crate::tracing_compat::trace;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

/// Runs a future to completion on the current thread.
///
/// Suspensions park the thread; wakes from other threads unpark it. Intended
/// for tests and small demo binaries, not production hosting.
pub fn block_on<F: Future>(fut: F) -> F::Output {
    let mut fut = std::pin::pin!(fut);
    let parker = Arc::new(ThreadWaker {
        thread: thread::current(),
        unparked: AtomicBool::new(false),
    });
    let waker = Waker::from(Arc::clone(&parker));
    let mut cx = Context::from_waker(&waker);

    loop {
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => {
                // Consume a pending unpark before parking, so a wake that
                // raced the poll is not lost.
                while !parker.unparked.swap(false, Ordering::Acquire) {
                    thread::park();
                }
            }
        }
    }
}

struct ThreadWaker {
    thread: Thread,
    unparked: AtomicBool,
}

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.unparked.store(true, Ordering::Release);
        self.thread.unpark();
    }
}

/// Wake flag shared between a lab task and its waker.
struct WakeFlag(AtomicBool);

impl Wake for WakeFlag {
    fn wake(self: Arc<Self>) {
        self.0.store(true, Ordering::Release);
    }
}

struct LabTask {
    fut: Pin<Box<dyn Future<Output = ()> + Send>>,
    flag: Arc<WakeFlag>,
}

/// Cooperative executor for spawned `()`-output futures.
///
/// Tasks run only inside [`run_until_stalled`](Self::run_until_stalled);
/// between calls the world is frozen, which is exactly what lifecycle tests
/// want.
#[derive(Default)]
pub struct LabExecutor {
    tasks: Vec<LabTask>,
}

impl LabExecutor {
    /// Creates an executor with no tasks.
    #[must_use]
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Spawns a future. It is polled from the next `run_until_stalled` on.
    pub fn spawn(&mut self, fut: Pin<Box<dyn Future<Output = ()> + Send + 'static>>) {
        self.tasks.push(LabTask {
            fut,
            // Starts raised so the task gets its initial poll.
            flag: Arc::new(WakeFlag(AtomicBool::new(true))),
        });
    }

    /// Polls woken tasks until none makes progress, dropping finished ones.
    ///
    /// Returns the number of polls performed, which is occasionally useful
    /// as a progress assertion.
    pub fn run_until_stalled(&mut self) -> usize {
        let mut polls = 0;
        loop {
            let mut progressed = false;
            let mut index = 0;
            while index < self.tasks.len() {
                if !self.tasks[index].flag.0.swap(false, Ordering::Acquire) {
                    index += 1;
                    continue;
                }
                progressed = true;
                polls += 1;
                let waker = Waker::from(Arc::clone(&self.tasks[index].flag));
                let mut cx = Context::from_waker(&waker);
                match self.tasks[index].fut.as_mut().poll(&mut cx) {
                    Poll::Ready(()) => {
                        trace!("lab task finished");
                        self.tasks.remove(index);
                    }
                    Poll::Pending => index += 1,
                }
            }
            if !progressed {
                return polls;
            }
        }
    }

    /// Returns the number of live (unfinished) tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if every spawned task has finished.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::ready;
    use std::sync::Mutex;

    #[test]
    fn block_on_ready_future() {
        assert_eq!(block_on(ready(42)), 42);
    }

    #[test]
    fn block_on_cross_thread_wake() {
        let token = crate::cancel::CancelToken::new();
        let waiter = token.cancelled();

        let remote = token.clone();
        let handle = thread::spawn(move || {
            remote.request_cancel(crate::types::CancelReason::user("from afar"));
        });

        let reason = block_on(waiter);
        assert_eq!(reason.kind, crate::types::CancelKind::User);
        handle.join().expect("cancel thread panicked");
    }

    #[test]
    fn executor_runs_spawned_tasks_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut exec = LabExecutor::new();
        for label in ["first", "second"] {
            let log = Arc::clone(&log);
            exec.spawn(Box::pin(async move {
                log.lock().unwrap().push(label);
            }));
        }

        exec.run_until_stalled();
        assert!(exec.is_idle());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn executor_parks_unwoken_tasks() {
        let token = crate::cancel::CancelToken::new();
        let waiter = token.cancelled();
        let mut exec = LabExecutor::new();
        exec.spawn(Box::pin(async move {
            let _ = waiter.await;
        }));

        exec.run_until_stalled();
        assert_eq!(exec.task_count(), 1);

        // No wake, no poll.
        assert_eq!(exec.run_until_stalled(), 0);

        token.request_cancel(crate::types::CancelReason::shutdown());
        exec.run_until_stalled();
        assert!(exec.is_idle());
    }
}
