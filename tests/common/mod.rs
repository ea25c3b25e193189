//! Shared helpers for lifecycle and conformance tests.

#![allow(dead_code)]

use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

pub fn init_test(name: &str) {
    streamscope::test_utils::init_test_logging();
    streamscope::test_phase!(name);
}

/// Order-preserving item log shared between a consumer and the test body.
#[derive(Debug)]
pub struct Recorder<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Recorder<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, item: T) {
        self.items.lock().unwrap().push(item);
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.lock().unwrap().clone()
    }
}

/// Counted permits for pausing a consumer at a chosen item.
///
/// `acquire_then` suspends until a permit is available, then runs the
/// recording action. This lets a test hold a driver inside a consumer
/// callback and cancel it there.
#[derive(Debug)]
pub struct Permits {
    shared: Arc<Mutex<PermitState>>,
}

#[derive(Debug)]
struct PermitState {
    available: usize,
    waker: Option<Waker>,
}

impl Clone for Permits {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Permits {
    pub fn new(available: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(PermitState {
                available,
                waker: None,
            })),
        }
    }

    pub fn add(&self, n: usize) {
        let waker = {
            let mut state = self.lock();
            state.available += n;
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Future that takes a permit, then records `item`.
    pub fn acquire_then<T, E>(&self, recorder: Recorder<T>, item: T) -> AcquireThen<T, E> {
        AcquireThen {
            permits: self.clone(),
            recorder,
            item: Some(item),
            _error: PhantomData,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PermitState> {
        self.shared.lock().unwrap()
    }
}

pub struct AcquireThen<T, E> {
    permits: Permits,
    recorder: Recorder<T>,
    item: Option<T>,
    _error: PhantomData<fn() -> E>,
}

impl<T, E> Unpin for AcquireThen<T, E> {}

impl<T: Unpin, E> std::future::Future for AcquireThen<T, E> {
    type Output = Result<(), E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        {
            let mut state = self.permits.lock();
            if state.available == 0 {
                state.waker = Some(cx.waker().clone());
                return Poll::Pending;
            }
            state.available -= 1;
        }
        let item = self.item.take().expect("polled after completion");
        self.recorder.push(item);
        Poll::Ready(Ok(()))
    }
}
