//! Programming-error checks.
//!
//! State and range violations (mapping a mapped transfer buffer, opening a
//! second pass, submitting twice, copying past the end of a buffer) are API
//! usage bugs rather than runtime conditions. They are checked with
//! [`gpu_assert!`], which logs the failure under the `ignis_graphics::assert`
//! target and panics.
//!
//! The checks are compiled in for debug builds and for builds with the
//! `strict-checks` feature. Otherwise they vanish and the backend's own
//! validation is the last line of defense.

use std::fmt;

/// Log target used for assertion failures.
pub(crate) const ASSERT_TARGET: &str = "ignis_graphics::assert";

/// Whether `gpu_assert!` checks are active in this build.
pub const CHECKS_ENABLED: bool = cfg!(any(debug_assertions, feature = "strict-checks"));

/// Assert a usage invariant of the GPU layer.
///
/// The condition is not evaluated at all when checks are disabled.
macro_rules! gpu_assert {
    ($cond:expr, $($arg:tt)+) => {
        if $crate::debug::CHECKS_ENABLED && !($cond) {
            $crate::debug::assertion_failed(format_args!($($arg)+));
        }
    };
}

#[cold]
#[track_caller]
pub(crate) fn assertion_failed(args: fmt::Arguments<'_>) -> ! {
    log::error!(target: ASSERT_TARGET, "Assertion failed: {}", args);
    panic!("assertion failed: {}", args);
}
