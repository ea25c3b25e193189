//! Error types for the driver loop.
//!
//! Errors are explicit and typed, and compose with the outcome lattice in
//! [`types::outcome`](crate::types::outcome). The taxonomy follows the three
//! places a scoped task can fail:
//!
//! - **Setup**: the one-time init step before the loop starts
//! - **Source**: the async source reported an error
//! - **Consumer**: the per-item callback reported an error
//!
//! Cancellation is deliberately absent here: it is the designed exit path,
//! carried as [`TaskOutcome::Cancelled`](crate::types::TaskOutcome) and never
//! surfaced as a failure. The driver performs no automatic retry; retry and
//! backoff belong to source or consumer implementations.

use thiserror::Error;

/// A driver-loop failure, attributed to its origin.
///
/// The single error type parameter `E` is shared by setup, source, and
/// consumer; hosts with distinct error types unify them before handing
/// futures to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError<E> {
    /// The one-time setup step failed; the loop never started.
    #[error("setup failed: {0}")]
    Setup(E),
    /// The async source reported an error.
    #[error("source failed: {0}")]
    Source(E),
    /// The consumer callback reported an error.
    #[error("consumer failed: {0}")]
    Consumer(E),
}

impl<E> TaskError<E> {
    /// Returns the underlying error, discarding the origin.
    pub fn into_inner(self) -> E {
        match self {
            Self::Setup(e) | Self::Source(e) | Self::Consumer(e) => e,
        }
    }

    /// Returns the failure origin as a short static label, for log fields.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::Source(_) => "source",
            Self::Consumer(_) => "consumer",
        }
    }

    /// Returns true if the failure happened during setup.
    #[must_use]
    pub const fn is_setup(&self) -> bool {
        matches!(self, Self::Setup(_))
    }

    /// Returns true if the failure came from the source.
    #[must_use]
    pub const fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }

    /// Returns true if the failure came from the consumer callback.
    #[must_use]
    pub const fn is_consumer(&self) -> bool {
        matches!(self, Self::Consumer(_))
    }
}
