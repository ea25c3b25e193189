//! Core types: cancellation reasons and terminal task outcomes.

pub mod cancel;
pub mod outcome;

pub use cancel::{CancelKind, CancelReason};
pub use outcome::{join_outcomes, TaskOutcome};
