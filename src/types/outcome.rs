//! Terminal outcome of a scoped task, with a severity lattice.
//!
//! A driver loop always ends in exactly one of three states:
//!
//! - `Completed`: the source reported end-of-source naturally
//! - `Failed(E)`: setup, the source, or the consumer reported an error
//! - `Cancelled(CancelReason)`: the token was signalled (expected teardown)
//!
//! These form a severity lattice: `Completed < Failed < Cancelled`. When
//! aggregating outcomes across tasks, the worst outcome wins. Note that
//! `Cancelled` being "worse" is a lattice ordering for aggregation only; it is
//! the designed exit path and is never reported as a failure.

use super::cancel::CancelReason;
use core::fmt;

/// The terminal state of a scoped task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<E> {
    /// The source reached end-of-source and every delivered item was consumed.
    Completed,
    /// An error surfaced from setup, the source, or the consumer callback.
    Failed(E),
    /// The task observed cancellation at a suspension point and unwound.
    Cancelled(CancelReason),
}

impl<E> TaskOutcome<E> {
    /// Returns the severity level of this outcome (0 = Completed, 2 = Cancelled).
    #[must_use]
    pub const fn severity(&self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::Failed(_) => 1,
            Self::Cancelled(_) => 2,
        }
    }

    /// Returns true if this outcome is `Completed`.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if this outcome is `Failed`.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns true if this outcome is `Cancelled`.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns the cancellation reason, if this outcome is `Cancelled`.
    #[must_use]
    pub const fn cancel_reason(&self) -> Option<&CancelReason> {
        match self {
            Self::Cancelled(reason) => Some(reason),
            _ => None,
        }
    }

    /// Maps the failure value using the provided function.
    pub fn map_failed<F, G: FnOnce(E) -> F>(self, g: G) -> TaskOutcome<F> {
        match self {
            Self::Completed => TaskOutcome::Completed,
            Self::Failed(e) => TaskOutcome::Failed(g(e)),
            Self::Cancelled(r) => TaskOutcome::Cancelled(r),
        }
    }

    /// Converts this outcome to a `Result`, with only `Failed` as the error.
    ///
    /// `Cancelled` maps to `Ok(())` and its reason is discarded; callers that
    /// need to distinguish completion from cancellation should match on the
    /// outcome directly.
    pub fn into_result(self) -> Result<(), E> {
        match self {
            Self::Failed(e) => Err(e),
            Self::Completed | Self::Cancelled(_) => Ok(()),
        }
    }

    /// Returns the failure value, if any.
    pub fn failure(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for TaskOutcome<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed(e) => write!(f, "failed: {e}"),
            Self::Cancelled(r) => write!(f, "cancelled: {r}"),
        }
    }
}

/// Compares two outcomes by severity and returns the worse one.
///
/// This implements the lattice join operation. When severities are equal, the
/// first argument wins.
pub fn join_outcomes<E>(a: TaskOutcome<E>, b: TaskOutcome<E>) -> TaskOutcome<E> {
    if a.severity() >= b.severity() {
        a
    } else {
        b
    }
}
