//! Tracing compatibility layer for structured logging.
//!
//! Provides a unified logging interface that works whether or not the
//! `tracing-integration` feature is enabled:
//!
//! - **With the feature**: re-exports the `tracing` crate's macros.
//! - **Without it**: no-op macros that compile to nothing.
//!
//! # Usage
//!
//! ```rust,ignore
//! use streamscope::tracing_compat::{debug, trace};
//!
//! debug!(key = ?key, "scoped task bound");
//! trace!("cancellation requested");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! No-op implementations when tracing is disabled.

    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {{}};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {{}};
    }

    /// No-op info-level logging macro.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {{}};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {{}};
    }

    /// No-op error-level logging macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {{}};
    }

    pub use crate::{debug, error, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;

#[cfg(test)]
mod tests {
    #[allow(unused_imports)]
    use super::*;

    #[test]
    fn macros_compile_in_both_modes() {
        trace!("trace message");
        debug!(count = 42, "debug with field");
        info!("info message");
        warn!("warn message");
        error!("error message");
    }
}
