//! Cancellation reason and kind types.
//!
//! Cancellation in streamscope is a first-class, expected outcome rather than
//! an error. This module defines the types that describe why a scoped task
//! was asked to stop.

use core::fmt;

/// The kind of cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CancelKind {
    /// The task reached a terminal state on its own; the token is marked
    /// cancelled during teardown so all observers see a consistent signal.
    Finished,
    /// Explicit cancellation requested by user code.
    User,
    /// The scope key changed and the task was superseded.
    KeyChanged,
    /// The enclosing scope was torn down.
    ScopeClosed,
    /// The scope manager is shutting down entirely.
    Shutdown,
}

impl CancelKind {
    /// Returns the severity of this cancellation kind.
    ///
    /// Higher severity cancellations take precedence when strengthening.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::Finished => 0,
            Self::User => 1,
            Self::KeyChanged => 2,
            Self::ScopeClosed => 3,
            Self::Shutdown => 4,
        }
    }
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished => write!(f, "finished"),
            Self::User => write!(f, "user"),
            Self::KeyChanged => write!(f, "key changed"),
            Self::ScopeClosed => write!(f, "scope closed"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// The reason for a cancellation, including kind and optional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelReason {
    /// The kind of cancellation.
    pub kind: CancelKind,
    /// Optional human-readable message (static for determinism).
    pub message: Option<&'static str>,
}

impl CancelReason {
    /// Creates a new cancellation reason with the given kind.
    #[must_use]
    pub const fn new(kind: CancelKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a user cancellation reason with a message.
    #[must_use]
    pub const fn user(message: &'static str) -> Self {
        Self {
            kind: CancelKind::User,
            message: Some(message),
        }
    }

    /// Creates a task-finished teardown reason.
    #[must_use]
    pub const fn finished() -> Self {
        Self::new(CancelKind::Finished)
    }

    /// Creates a key-changed cancellation reason.
    #[must_use]
    pub const fn key_changed() -> Self {
        Self::new(CancelKind::KeyChanged)
    }

    /// Creates a scope-closed cancellation reason.
    #[must_use]
    pub const fn scope_closed() -> Self {
        Self::new(CancelKind::ScopeClosed)
    }

    /// Creates a shutdown cancellation reason.
    #[must_use]
    pub const fn shutdown() -> Self {
        Self::new(CancelKind::Shutdown)
    }

    /// Strengthens this reason with another, keeping the more severe one.
    ///
    /// Returns `true` if the reason was changed.
    pub fn strengthen(&mut self, other: &Self) -> bool {
        if other.kind > self.kind {
            self.kind = other.kind;
            self.message = other.message;
            return true;
        }

        if other.kind < self.kind {
            return false;
        }

        match (self.message, other.message) {
            (None, Some(msg)) => {
                self.message = Some(msg);
                true
            }
            (Some(current), Some(candidate)) if candidate < current => {
                self.message = Some(candidate);
                true
            }
            _ => false,
        }
    }

    /// Returns true if this reason indicates manager shutdown.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self.kind, CancelKind::Shutdown)
    }

    /// Returns the kind of this cancellation reason.
    #[must_use]
    pub const fn kind(&self) -> CancelKind {
        self.kind
    }
}

impl Default for CancelReason {
    fn default() -> Self {
        Self::new(CancelKind::User)
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}
