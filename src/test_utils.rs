//! Shared test scaffolding, behind the `test-util` feature.
//!
//! Tests log their phases through `tracing` so a failing run reads as a
//! narrative: phase markers, guarded assertions with expected/actual values,
//! then a completion marker. Run with
//! `RUST_LOG=trace cargo test -- --nocapture` to see it.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs the test logging subscriber once per process.
///
/// Respects `RUST_LOG`; defaults to `debug` for this crate. Safe to call
/// from every test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("streamscope=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}

/// Marks the beginning of a test or test phase.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::tracing_compat::info!(phase = $name, "=== phase ===");
    };
}

/// Marks a test section within a phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        $crate::tracing_compat::info!(section = $name, "--- section ---");
    };
}

/// Marks successful completion of a test.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::tracing_compat::info!(test = $name, "test complete");
    };
}

/// Asserts a condition, logging expected and actual values either way.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        if $cond {
            $crate::tracing_compat::debug!(
                check = $msg,
                expected = ?$expected,
                actual = ?$actual,
                "assertion ok"
            );
        } else {
            $crate::tracing_compat::error!(
                check = $msg,
                expected = ?$expected,
                actual = ?$actual,
                "assertion FAILED"
            );
            panic!("{}: expected {:?}, got {:?}", $msg, $expected, $actual);
        }
    };
}

/// Asserts that an outcome is `Completed`.
#[macro_export]
macro_rules! assert_outcome_completed {
    ($outcome:expr) => {{
        let outcome = &$outcome;
        $crate::assert_with_log!(
            outcome.is_completed(),
            "outcome is Completed",
            "Completed",
            outcome
        );
    }};
}

/// Asserts that an outcome is `Cancelled` with the given kind.
#[macro_export]
macro_rules! assert_outcome_cancelled {
    ($outcome:expr, $kind:expr) => {{
        let outcome = &$outcome;
        let kind = outcome.cancel_reason().map($crate::types::CancelReason::kind);
        $crate::assert_with_log!(
            kind == Some($kind),
            "outcome is Cancelled with expected kind",
            Some($kind),
            kind
        );
    }};
}

/// Asserts that an outcome is `Failed`.
#[macro_export]
macro_rules! assert_outcome_failed {
    ($outcome:expr) => {{
        let outcome = &$outcome;
        $crate::assert_with_log!(outcome.is_failed(), "outcome is Failed", "Failed", outcome);
    }};
}
