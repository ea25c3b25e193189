//! Scope-bound, cancel-correct stream consumption.
//!
//! streamscope keeps a never-ending async stream tied to the lifetime of the
//! thing that cares about it. A *scoped task* pulls items from a [`Source`]
//! and hands each one to a consumer callback; a [`CancelToken`] makes
//! stopping the loop an expected, first-class outcome rather than an error;
//! a [`ScopeManager`] guarantees at most one live task per scope and tears
//! the old task down when the scope's key changes or the scope ends.
//!
//! The core loop is the [`Driver`]: a hand-rolled future that races the next
//! item against cancellation, awaits each consumer callback to completion
//! before the next pull, and resolves to a [`TaskOutcome`] of `Completed`,
//! `Failed`, or `Cancelled`. Items are processed strictly in order, one at a
//! time.
//!
//! # Example
//!
//! ```
//! use streamscope::{drive, CancelToken, ScopeManager, TaskError};
//! use std::future::ready;
//!
//! let mut scopes: ScopeManager<&str, u32, TaskError<&str>> = ScopeManager::new();
//! let mut executor = streamscope::lab::LabExecutor::new();
//!
//! // Bind the "detail-view" scope to feed 7; spawn the returned task.
//! if let Some(task) = scopes.bind("detail-view", Some(7), |feed| {
//!     let items = streamscope::source::iter::<_, &str>(vec![*feed, *feed + 1]);
//!     drive(CancelToken::new(), items, |item| {
//!         println!("item: {item}");
//!         ready(Ok(()))
//!     })
//!     .into_task()
//! }) {
//!     executor.spawn(task);
//! }
//!
//! executor.run_until_stalled();
//! assert!(scopes.handle(&"detail-view").unwrap().is_finished());
//!
//! // Scope goes away: any still-running task is cancelled, not leaked.
//! scopes.teardown(&"detail-view");
//! ```
//!
//! # Cancellation model
//!
//! Cancellation is cooperative and monotonic. Requesting it flips the shared
//! token exactly once; the driver observes the token between polls and races
//! [`CancelToken::cancelled`] at every suspension point, so a suspended loop
//! wakes and unwinds promptly. A consumer callback that is already running
//! is never interrupted mid-item. On any terminal state the driver marks its
//! own token cancelled, so every observer sees a consistent signal.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod cancel;
pub mod error;
pub mod lab;
pub mod scope;
pub mod source;
pub mod task;
#[cfg(feature = "test-util")]
pub mod test_utils;
pub mod tracing_compat;
pub mod types;

pub use cancel::{CancelToken, Cancelled};
pub use error::TaskError;
pub use scope::{ScopeManager, ScopeSlot};
pub use source::{Source, SourceExt};
pub use task::{drive, drive_with_setup, Driver, DriverOutcome, TaskFuture, TaskHandle};
pub use types::{join_outcomes, CancelKind, CancelReason, TaskOutcome};
