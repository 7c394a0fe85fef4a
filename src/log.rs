//! Logging macros.
//!
//! With the `tracing` feature these forward to the `tracing` crate, otherwise
//! they expand to nothing.

#![allow(unused_macros)]

cfg_if::cfg_if! {
    if #[cfg(feature = "tracing")] {
        macro_rules! trace_log {
            ($($arg:tt)*) => {
                tracing::trace!($($arg)*)
            };
        }

        macro_rules! debug_log {
            ($($arg:tt)*) => {
                tracing::debug!($($arg)*)
            };
        }
    } else {
        macro_rules! trace_log {
            ($($arg:tt)*) => {};
        }

        macro_rules! debug_log {
            ($($arg:tt)*) => {};
        }
    }
}
