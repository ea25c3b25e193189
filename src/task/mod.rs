//! Scoped tasks: a driver loop plus the handle used to observe it.
//!
//! A scoped task is created with [`drive`] (or [`drive_with_setup`] when a
//! one-time init step must run first), split into a [`TaskHandle`] and a
//! spawnable future with [`Driver::into_task`], and registered in a scope via
//! [`ScopeManager`](crate::scope::ScopeManager). The handle side cancels and
//! joins; the future side owns the source and the consumer callback.

mod driver;
mod handle;

pub use driver::{drive, drive_with_setup, Driver, DriverOutcome, TaskFuture};
pub use handle::{Join, TaskHandle};
